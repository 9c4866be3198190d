//! Turn a staging tree into a distributable artifact.
//!
//! Two modes, picked by [`ImageKind::mode`]:
//! - archive: `mkbootfs` cpio stream, compressed with `lz4 -l -12`
//! - filesystem: `mkfs.erofs` image with per-partition file contexts
//!
//! Artifacts are written to `<output>.tmp` and renamed into place, so the
//! final path either holds a complete file or does not exist.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::kind::{ImageKind, PackagingMode};
use crate::common::TempFile;
use crate::config::Config;
use crate::error::PipelineError;
use crate::modules::StagingTree;
use crate::process::{Cmd, ToolRunner};
use crate::sign::sign_modules;

/// lz4 arguments for ramdisk fragments (legacy frame format, max level).
pub const LZ4_ARGS: &[&str] = &["-l", "-12", "--favor-decSpeed"];

/// Compression codec for EROFS module partitions.
pub const EROFS_COMPRESSION: &str = "lz4hc";

/// Package `tree` as `kind` into the dist directory. Returns the artifact path.
pub fn package_image(
    config: &Config,
    runner: &dyn ToolRunner,
    kind: ImageKind,
    tree: &StagingTree,
) -> Result<PathBuf> {
    let output = config.dist_dir.join(kind.output_name());
    tracing::info!(
        "Packaging {} ({} modules) -> {}",
        kind,
        tree.modules().len(),
        output.display()
    );

    // Never leave a previous run's artifact looking like this run's output
    if output.exists() {
        fs::remove_file(&output)
            .with_context(|| format!("Failed to remove old {}", output.display()))?;
    }

    if kind.signs_modules() {
        sign_modules(&config.tools, &config.keys, runner, tree.module_root())?;
    }

    match kind.mode() {
        PackagingMode::Archive => package_archive(config, runner, tree.root(), &output)?,
        PackagingMode::Filesystem => package_filesystem(config, runner, kind, tree, &output)?,
    }

    let size = fs::metadata(&output)
        .with_context(|| format!("Failed to stat {}", output.display()))?
        .len();
    tracing::info!("  {} created: {} KB", kind.output_name(), size / 1024);
    Ok(output)
}

/// cpio the tree into a temporary archive, then compress it.
pub fn package_archive(
    config: &Config,
    runner: &dyn ToolRunner,
    root: &Path,
    output: &Path,
) -> Result<()> {
    let cpio = TempFile::new(with_suffix(output, ".cpio"))?;
    let compressed = TempFile::new(with_suffix(output, ".tmp"))?;

    let archive = Cmd::tool(&config.tools.mkbootfs)
        .arg_path(root)
        .stdout_to(cpio.path())
        .error_msg("mkbootfs failed");
    runner
        .run(archive)
        .map_err(|e| PipelineError::build(format!("{:#}", e)))?;

    let compress = Cmd::tool(&config.tools.lz4)
        .args(LZ4_ARGS)
        .arg_path(cpio.path())
        .arg_path(compressed.path())
        .error_msg("lz4 compression failed");
    runner
        .run(compress)
        .map_err(|e| PipelineError::build(format!("{:#}", e)))?;

    require_output(compressed.path(), "lz4")?;
    compressed.persist(output)
}

/// Build an EROFS image mounted where the tree was staged for.
pub fn package_filesystem(
    config: &Config,
    runner: &dyn ToolRunner,
    kind: ImageKind,
    tree: &StagingTree,
    output: &Path,
) -> Result<()> {
    let Some(contexts_name) = kind.file_contexts() else {
        return Err(PipelineError::config(format!(
            "{} is not a filesystem image kind",
            kind
        ))
        .into());
    };
    let contexts = config.file_contexts(contexts_name);
    if !contexts.is_file() {
        return Err(PipelineError::config(format!(
            "file contexts for {} not found at {}",
            kind,
            contexts.display()
        ))
        .into());
    }

    let image = TempFile::new(with_suffix(output, ".tmp"))?;
    let cmd = Cmd::tool(&config.tools.mkfs_erofs)
        .arg(format!("-z{}", EROFS_COMPRESSION))
        .arg(format!("--mount-point={}", tree.mount_prefix()))
        .arg(format!("--file-contexts={}", contexts.display()))
        .arg_path(image.path())
        .arg_path(tree.root())
        .error_msg(format!("mkfs.erofs failed for {}", kind));
    runner
        .run(cmd)
        .map_err(|e| PipelineError::build(format!("{:#}", e)))?;

    require_output(image.path(), "mkfs.erofs")?;
    image.persist(output)
}

fn require_output(path: &Path, tool: &str) -> Result<()> {
    let len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(PipelineError::build(format!(
            "{} produced no output at {}",
            tool,
            path.display()
        ))
        .into());
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix(Path::new("/dist/vendor_dlkm.img"), ".tmp"),
            PathBuf::from("/dist/vendor_dlkm.img.tmp")
        );
    }

    #[test]
    fn test_require_output_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.img");
        fs::write(&empty, b"").unwrap();

        assert!(require_output(&empty, "mkfs.erofs").is_err());
        assert!(require_output(&dir.path().join("missing"), "mkfs.erofs").is_err());
    }
}
