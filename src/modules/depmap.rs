//! `modules.dep` parsing and mount-prefix rewriting.
//!
//! depmod writes names relative to the staging tree. On the device the
//! modules live under a different absolute path (`/vendor_dlkm/lib/modules`
//! for a partition, `/lib/modules` for the ramdisk), so every name is
//! rewritten to `<mount-prefix>/lib/modules/<name>`.

use anyhow::Result;
use std::collections::HashSet;

use crate::error::PipelineError;

/// Module directory inside an image, relative to its mount point.
pub const MODULE_DIR: &str = "lib/modules";

/// One `name: dep dep ...` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepEntry {
    pub module: String,
    pub deps: Vec<String>,
}

/// Parsed dependency file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    entries: Vec<DepEntry>,
}

impl DependencyMap {
    /// Parse depmod output. Blank lines are ignored; a line without a colon
    /// means the file is not a dependency map.
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((module, deps)) = line.split_once(':') else {
                return Err(PipelineError::build(format!(
                    "modules.dep line {} has no ':' separator: '{}'",
                    lineno + 1,
                    line
                ))
                .into());
            };
            entries.push(DepEntry {
                module: module.trim().to_string(),
                deps: deps.split_whitespace().map(str::to_string).collect(),
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[DepEntry] {
        &self.entries
    }

    /// Every name, module and dependency alike, prefixed for the device.
    pub fn with_mount_prefix(&self, prefix: &str) -> Self {
        let map = |name: &str| device_path(prefix, name);
        Self {
            entries: self
                .entries
                .iter()
                .map(|e| DepEntry {
                    module: map(&e.module),
                    deps: e.deps.iter().map(|d| map(d)).collect(),
                })
                .collect(),
        }
    }

    /// Dependencies naming a module outside `staged`, as (module, dep) pairs.
    pub fn dangling(&self, staged: &HashSet<String>) -> Vec<(String, String)> {
        self.entries
            .iter()
            .flat_map(|e| {
                e.deps
                    .iter()
                    .filter(|d| !staged.contains(d.as_str()))
                    .map(move |d| (e.module.clone(), d.clone()))
            })
            .collect()
    }

    /// Serialize back to depmod's text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.module);
            out.push(':');
            for dep in &entry.deps {
                out.push(' ');
                out.push_str(dep);
            }
            out.push('\n');
        }
        out
    }
}

/// `<prefix>/lib/modules/<name>`.
pub fn device_path(prefix: &str, name: &str) -> String {
    format!("{}/{}/{}", prefix.trim_end_matches('/'), MODULE_DIR, name)
}
