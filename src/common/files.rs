//! Utilities for file operations with automatic parent directory creation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Write a file, creating parent directories as needed.
pub fn write_file_with_dirs<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, content: C) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_exists(path)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Copy a file, creating the destination's parent directories.
pub fn copy_file_with_dirs(src: &Path, dst: &Path) -> Result<u64> {
    ensure_parent_exists(dst)?;
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))
}

/// Ensure all parent directories of a file exist.
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Files directly inside `dir` with the given extension, sorted by name.
pub fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib/modules/modules.load");
        write_file_with_dirs(&path, "a.ko\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a.ko\n");
    }

    #[test]
    fn test_files_with_extension_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["s5e8845-b.dtb", "s5e8845-a.dtb", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let found = files_with_extension(dir.path(), "dtb").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["s5e8845-a.dtb", "s5e8845-b.dtb"]);
    }
}
