//! External tool availability checks.

use std::path::Path;

use crate::config::ToolSet;

use super::types::CheckResult;

/// Check every tool the pipeline drives. Tools found on PATH instead of the
/// prebuilt bin dir still pass, with a warning: the host copy may differ
/// from the pinned one.
pub fn check_tools(tools: &ToolSet, prebuilt_bin: &Path) -> Vec<CheckResult> {
    tools
        .entries()
        .into_iter()
        .map(|(name, path)| {
            if !path.is_file() {
                CheckResult::fail(
                    name,
                    &format!(
                        "Not found at {} and not on PATH. Place it in prebuilts/bin.",
                        path.display()
                    ),
                )
            } else if path.starts_with(prebuilt_bin) {
                CheckResult::pass_with(name, &path.display().to_string())
            } else {
                CheckResult::warn(
                    name,
                    &format!("resolved from PATH: {}", path.display()),
                )
            }
        })
        .collect()
}
