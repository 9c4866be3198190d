//! Kernel module code-signing with the kernel's `sign-file`.

use anyhow::Result;
use std::path::Path;

use crate::common::files_with_extension;
use crate::config::{KeySet, ToolSet};
use crate::error::PipelineError;
use crate::process::{Cmd, ToolRunner};

/// Hash algorithm passed to sign-file; must match CONFIG_MODULE_SIG_HASH.
pub const MODULE_SIG_HASH: &str = "sha1";

/// Sign every `*.ko` directly inside `module_dir`. Returns how many were signed.
pub fn sign_modules(
    tools: &ToolSet,
    keys: &KeySet,
    runner: &dyn ToolRunner,
    module_dir: &Path,
) -> Result<usize> {
    for (what, path) in [
        ("sign-file", &tools.sign_file),
        ("module signing key", &keys.module_key),
        ("module signing certificate", &keys.module_cert),
    ] {
        if !path.is_file() {
            return Err(
                PipelineError::signing(format!("{} not found at {}", what, path.display())).into(),
            );
        }
    }

    let modules = files_with_extension(module_dir, "ko")?;
    for module in &modules {
        let cmd = Cmd::tool(&tools.sign_file)
            .arg(MODULE_SIG_HASH)
            .arg_path(&keys.module_key)
            .arg_path(&keys.module_cert)
            .arg_path(module);
        runner.run(cmd).map_err(|e| {
            PipelineError::signing(format!("failed to sign {}: {:#}", module.display(), e))
        })?;
    }

    tracing::info!("  Signed {} modules ({})", modules.len(), MODULE_SIG_HASH);
    Ok(modules.len())
}
