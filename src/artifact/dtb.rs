//! Device-tree images for vendor_boot and the dtbo partition.

use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::common::{files_with_extension, TempFile};
use crate::config::ToolSet;
use crate::error::PipelineError;
use crate::process::{Cmd, ToolRunner};

/// Page size used for dtbo.img entries.
pub const DTBO_PAGE_SIZE: u32 = 2048;

fn collect_blobs(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PipelineError::build(format!(
            "device-tree directory not found at {}",
            dir.display()
        ))
        .into());
    }
    let files = files_with_extension(dir, ext)?;
    if files.is_empty() {
        return Err(PipelineError::build(format!(
            "no *.{} files in {}",
            ext,
            dir.display()
        ))
        .into());
    }
    Ok(files)
}

/// Concatenate every `*.dtb` in `dtb_dir`, sorted by name, into `output`.
/// Returns the number of blobs written.
pub fn concat_dtbs(dtb_dir: &Path, output: &Path) -> Result<usize> {
    let blobs = collect_blobs(dtb_dir, "dtb")?;

    let mut tmp_name = output.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = TempFile::new(PathBuf::from(tmp_name))?;
    {
        let mut out = File::create(tmp.path())
            .with_context(|| format!("Failed to create {}", tmp.path().display()))?;
        for blob in &blobs {
            let mut input =
                File::open(blob).with_context(|| format!("Failed to open {}", blob.display()))?;
            io::copy(&mut input, &mut out)
                .with_context(|| format!("Failed to append {}", blob.display()))?;
        }
    }
    tmp.persist(output)?;

    tracing::info!("  dtb.img: {} blobs from {}", blobs.len(), dtb_dir.display());
    Ok(blobs.len())
}

/// Pack every `*.dtbo` in `dtbo_dir` into a dtbo partition image.
pub fn build_dtbo(
    tools: &ToolSet,
    runner: &dyn ToolRunner,
    dtbo_dir: &Path,
    output: &Path,
) -> Result<usize> {
    let overlays = collect_blobs(dtbo_dir, "dtbo")?;

    let mut cmd = Cmd::tool(&tools.mkdtimg)
        .arg("create")
        .arg_path(output)
        .arg(format!("--page_size={}", DTBO_PAGE_SIZE));
    for overlay in &overlays {
        cmd = cmd.arg_path(overlay);
    }
    runner
        .run(cmd.error_msg("mkdtimg failed"))
        .map_err(|e| PipelineError::build(format!("{:#}", e)))?;

    if !output.is_file() {
        return Err(PipelineError::build(format!(
            "mkdtimg did not produce {}",
            output.display()
        ))
        .into());
    }

    tracing::info!("  dtbo.img: {} overlays from {}", overlays.len(), dtbo_dir.display());
    Ok(overlays.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_concat_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let dts = dir.path().join("dts");
        fs::create_dir_all(&dts).unwrap();
        fs::write(dts.join("b.dtb"), b"BBB").unwrap();
        fs::write(dts.join("a.dtb"), b"AA").unwrap();
        fs::write(dts.join("notes.txt"), b"ignored").unwrap();

        let out = dir.path().join("dtb.img");
        assert_eq!(concat_dtbs(&dts, &out).unwrap(), 2);
        assert_eq!(fs::read(&out).unwrap(), b"AABBB");
        assert!(!dir.path().join("dtb.img.tmp").exists());
    }

    #[test]
    fn test_empty_dir_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = concat_dtbs(dir.path(), &dir.path().join("dtb.img")).unwrap_err();
        assert!(matches!(
            crate::error::classify(&err),
            Some(PipelineError::Build(_))
        ));
        assert!(!dir.path().join("dtb.img").exists());
    }
}
