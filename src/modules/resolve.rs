//! Locate compiled modules in the installed module tree by basename.
//!
//! Compiled trees nest modules under subsystem directories
//! (`kernel/drivers/...`), so lookup is by file name only. When the same
//! basename exists in several places the first one walkdir yields wins.
//! That order is filesystem-dependent, so every duplicate is reported and
//! strict mode refuses to pick.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::manifest::{ModuleManifest, MODULE_SUFFIX};
use crate::error::PipelineError;

/// A manifest entry bound to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub name: String,
    pub source: PathBuf,
}

/// Every module file under `tree`, keyed by basename, in walk order.
fn index_modules(tree: &Path) -> Result<HashMap<String, Vec<PathBuf>>> {
    let mut index: HashMap<String, Vec<PathBuf>> = HashMap::new();

    for entry in WalkDir::new(tree) {
        let entry = entry.with_context(|| format!("Failed to walk {}", tree.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(MODULE_SUFFIX) {
            index.entry(name).or_default().push(entry.into_path());
        }
    }

    Ok(index)
}

/// Bind every manifest entry to a file under `tree`.
///
/// Fails with a resolution error on the first entry that has no match, or,
/// when `strict` is set, on the first entry with more than one candidate.
pub fn resolve_modules(
    manifest: &ModuleManifest,
    tree: &Path,
    strict: bool,
) -> Result<Vec<ResolvedModule>> {
    if !tree.is_dir() {
        return Err(PipelineError::config(format!(
            "installed module tree not found at {}",
            tree.display()
        ))
        .into());
    }

    let index = index_modules(tree)?;
    let mut resolved = Vec::with_capacity(manifest.len());

    for name in manifest.entries() {
        let candidates = index.get(name).map(Vec::as_slice).unwrap_or_default();

        let Some(first) = candidates.first() else {
            return Err(PipelineError::resolution(
                name,
                format!("not found under {}", tree.display()),
            )
            .into());
        };

        if candidates.len() > 1 {
            let listing: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            if strict {
                return Err(PipelineError::resolution(
                    name,
                    format!("ambiguous, {} candidates: {}", candidates.len(), listing.join(", ")),
                )
                .into());
            }
            tracing::warn!(
                "{} has {} candidates, using {} (others: {})",
                name,
                candidates.len(),
                first.display(),
                listing[1..].join(", ")
            );
        }

        resolved.push(ResolvedModule {
            name: name.clone(),
            source: first.clone(),
        });
    }

    tracing::info!("Resolved {} modules under {}", resolved.len(), tree.display());
    Ok(resolved)
}
