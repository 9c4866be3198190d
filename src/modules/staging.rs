//! Staging tree construction.
//!
//! Builds the on-device module layout for one image in a scoped work
//! directory:
//!
//! ```text
//! <staging>/lib/modules/
//! ├── a.ko, b.ko ...          resolved modules, flat
//! ├── modules.dep             names rewritten to <mount-prefix>/lib/modules/...
//! ├── modules.alias ...       other depmod output
//! ├── modules.builtin[.modinfo]
//! ├── modules.load            manifest order
//! └── modules.order           manifest order
//! ```
//!
//! depmod needs a `lib/modules/<release>` directory to work on, so modules
//! are copied there first and flattened afterwards. The staging directory is
//! owned by the returned [`StagingTree`] and removed when it is dropped,
//! including when any step here fails.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::depmap::{DependencyMap, MODULE_DIR};
use super::manifest::{ModuleManifest, MODULE_SUFFIX};
use super::resolve::ResolvedModule;
use crate::common::{write_file_with_dirs, WorkDir};
use crate::config::Config;
use crate::error::PipelineError;
use crate::process::{Cmd, ToolRunner};

/// Built-in module metadata copied verbatim when present.
pub const BUILTIN_METADATA_FILES: &[&str] = &["modules.builtin", "modules.builtin.modinfo"];

/// Generated load-order files, both listing the manifest in order.
pub const LOAD_ORDER_FILES: &[&str] = &["modules.load", "modules.order"];

/// Prefix of every staging directory name inside the dist directory.
pub const STAGING_DIR_PREFIX: &str = ".staging-";

/// A finished staging tree, ready for packaging.
#[derive(Debug)]
pub struct StagingTree {
    dir: WorkDir,
    module_root: PathBuf,
    kernel_release: String,
    mount_prefix: String,
    modules: Vec<String>,
}

impl StagingTree {
    /// Image root (the directory that becomes `/` or the mount point).
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// `<root>/lib/modules`.
    pub fn module_root(&self) -> &Path {
        &self.module_root
    }

    pub fn kernel_release(&self) -> &str {
        &self.kernel_release
    }

    pub fn mount_prefix(&self) -> &str {
        &self.mount_prefix
    }

    /// Staged module file names, in manifest order.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }
}

/// The single kernel-release directory under the installed module tree.
pub fn find_kernel_release(installed_modules: &Path) -> Result<String> {
    let entries = fs::read_dir(installed_modules).map_err(|e| {
        PipelineError::build(format!(
            "cannot read installed module tree {}: {}",
            installed_modules.display(),
            e
        ))
    })?;

    let mut releases = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.path().is_dir() {
            releases.push(entry.file_name().to_string_lossy().to_string());
        }
    }

    match releases.len() {
        1 => Ok(releases.remove(0)),
        0 => Err(PipelineError::build(format!(
            "no kernel release directory in {}",
            installed_modules.display()
        ))
        .into()),
        _ => {
            releases.sort();
            Err(PipelineError::build(format!(
                "ambiguous kernel release in {}: {}",
                installed_modules.display(),
                releases.join(", ")
            ))
            .into())
        }
    }
}

/// Assemble a staging tree for `resolved` modules.
///
/// `label` names the work directory (`<dist>/.staging-<label>`) and
/// `mount_prefix` is where the image is mounted on the device.
pub fn build_staging_tree(
    config: &Config,
    runner: &dyn ToolRunner,
    label: &str,
    manifest: &ModuleManifest,
    resolved: &[ResolvedModule],
    mount_prefix: &str,
) -> Result<StagingTree> {
    tracing::info!("Staging {} ({} modules)", label, resolved.len());

    // 1. Fresh root with lib/modules/<release>
    let release = find_kernel_release(&config.installed_modules)?;
    tracing::info!("  Kernel release: {}", release);

    fs::create_dir_all(&config.dist_dir)
        .with_context(|| format!("Failed to create {}", config.dist_dir.display()))?;
    let dir = WorkDir::create(&config.dist_dir, &format!("{}{}", STAGING_DIR_PREFIX, label))?;
    let module_root = dir.path().join(MODULE_DIR);
    let versioned = module_root.join(&release);
    fs::create_dir_all(&versioned)
        .with_context(|| format!("Failed to create {}", versioned.display()))?;

    // 2. Copy modules
    for module in resolved {
        fs::copy(&module.source, versioned.join(&module.name)).map_err(|e| {
            PipelineError::build(format!(
                "failed to copy {} from {}: {}",
                module.name,
                module.source.display(),
                e
            ))
        })?;
    }
    tracing::info!("  Copied {} modules", resolved.len());

    // 3. Dependency metadata
    generate_dependencies(config, runner, dir.path(), &release)?;

    // 4. Flatten lib/modules/<release> into lib/modules
    flatten_release_dir(&versioned, &module_root)?;

    // 5. Rewrite modules.dep for the device path
    let staged: HashSet<String> = resolved.iter().map(|m| m.name.clone()).collect();
    rewrite_dependencies(&module_root, mount_prefix, &staged, config.validate_dep_closure)?;

    // 6. Built-in metadata (optional)
    copy_builtin_metadata(&config.installed_modules.join(&release), &module_root)?;

    // 7. Load order
    write_load_order(&module_root, manifest.entries())?;

    Ok(StagingTree {
        dir,
        module_root,
        kernel_release: release,
        mount_prefix: mount_prefix.to_string(),
        modules: manifest.entries().to_vec(),
    })
}

/// Run depmod against the staging root and require a modules.dep.
fn generate_dependencies(
    config: &Config,
    runner: &dyn ToolRunner,
    root: &Path,
    release: &str,
) -> Result<()> {
    let cmd = Cmd::tool(&config.tools.depmod)
        .args(["-a", "-b"])
        .arg_path(root)
        .arg(release)
        .error_msg("depmod failed");
    runner
        .run(cmd)
        .map_err(|e| PipelineError::build(format!("{:#}", e)))?;

    let dep_file = root.join(MODULE_DIR).join(release).join("modules.dep");
    if !dep_file.is_file() {
        return Err(PipelineError::build(format!(
            "depmod did not produce {}",
            dep_file.display()
        ))
        .into());
    }
    Ok(())
}

/// Move every entry of `versioned` into `module_root`, then drop `versioned`.
pub fn flatten_release_dir(versioned: &Path, module_root: &Path) -> Result<()> {
    let entries = fs::read_dir(versioned).map_err(|e| {
        PipelineError::build(format!("cannot read {}: {}", versioned.display(), e))
    })?;

    for entry in entries {
        let entry = entry?;
        let dest = module_root.join(entry.file_name());
        fs::rename(entry.path(), &dest).map_err(|e| {
            PipelineError::build(format!(
                "failed to move {} to {}: {}",
                entry.path().display(),
                dest.display(),
                e
            ))
        })?;
    }

    fs::remove_dir(versioned).map_err(|e| {
        PipelineError::build(format!("failed to remove {}: {}", versioned.display(), e))
    })?;
    Ok(())
}

/// Rewrite `<module_root>/modules.dep` in place.
pub fn rewrite_dependencies(
    module_root: &Path,
    mount_prefix: &str,
    staged: &HashSet<String>,
    validate_closure: bool,
) -> Result<()> {
    let dep_file = module_root.join("modules.dep");
    let content = fs::read_to_string(&dep_file)
        .with_context(|| format!("Failed to read {}", dep_file.display()))?;
    let map = DependencyMap::parse(&content)?;

    let dangling = map.dangling(staged);
    if !dangling.is_empty() {
        let listing: Vec<String> = dangling
            .iter()
            .map(|(module, dep)| format!("{} -> {}", module, dep))
            .collect();
        if validate_closure {
            return Err(PipelineError::build(format!(
                "modules.dep references unstaged modules: {}",
                listing.join(", ")
            ))
            .into());
        }
        tracing::warn!("modules.dep references unstaged modules: {}", listing.join(", "));
    }

    fs::write(&dep_file, map.with_mount_prefix(mount_prefix).render())
        .with_context(|| format!("Failed to write {}", dep_file.display()))?;
    tracing::info!("  Rewrote modules.dep for {}/{}", mount_prefix, MODULE_DIR);
    Ok(())
}

/// Copy built-in module metadata; absence only warns.
pub fn copy_builtin_metadata(release_dir: &Path, module_root: &Path) -> Result<()> {
    for name in BUILTIN_METADATA_FILES {
        let src = release_dir.join(name);
        if src.is_file() {
            fs::copy(&src, module_root.join(name))
                .with_context(|| format!("Failed to copy {}", src.display()))?;
        } else {
            tracing::warn!(
                "{} not found in {} (no built-in modules?)",
                name,
                release_dir.display()
            );
        }
    }
    Ok(())
}

/// Write `modules.load` and `modules.order`: module entries in manifest order.
pub fn write_load_order(module_root: &Path, entries: &[String]) -> Result<()> {
    let mut content = String::new();
    for entry in entries.iter().filter(|e| e.ends_with(MODULE_SUFFIX)) {
        content.push_str(entry);
        content.push('\n');
    }

    for name in LOAD_ORDER_FILES {
        write_file_with_dirs(module_root.join(name), &content)?;
    }
    Ok(())
}
