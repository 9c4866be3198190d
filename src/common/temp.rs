//! Scoped work directories and temporary files.
//!
//! Both guards remove what they own when dropped, so every exit path of a
//! build step (success, `?` early return, panic unwinding) cleans up.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Prepare a work directory, removing it if it exists and creating it fresh.
pub fn prepare_work_dir(parent_dir: &Path, name: &str) -> Result<PathBuf> {
    let work_dir = parent_dir.join(name);

    // Leftover from an interrupted run
    if work_dir.exists() {
        fs::remove_dir_all(&work_dir)
            .with_context(|| format!("Failed to remove stale {}", work_dir.display()))?;
    }

    fs::create_dir_all(&work_dir)
        .with_context(|| format!("Failed to create {}", work_dir.display()))?;

    Ok(work_dir)
}

/// Clean up a work directory after use. Idempotent.
pub fn cleanup_work_dir(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove work dir {}: {}", path.display(), e);
        }
    }
}

/// A fresh directory that is deleted when the guard goes out of scope.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    /// Create `<parent>/<name>`, replacing anything already there.
    pub fn create(parent_dir: &Path, name: &str) -> Result<Self> {
        let path = prepare_work_dir(parent_dir, name)?;
        tracing::debug!("Created work dir {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        cleanup_work_dir(&self.path);
    }
}

/// A file path that is removed on drop unless [`TempFile::persist`] moves it.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Claim `path`, removing any stale file already there.
    pub fn new(path: PathBuf) -> Result<Self> {
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stale {}", path.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically rename the temporary file to `dest`.
    pub fn persist(self, dest: &Path) -> Result<()> {
        fs::rename(&self.path, dest).with_context(|| {
            format!(
                "Failed to move {} to {}",
                self.path.display(),
                dest.display()
            )
        })?;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        // After persist() the path no longer exists
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_dir_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let work = WorkDir::create(parent.path(), "staging").unwrap();
            fs::write(work.path().join("a.ko"), b"x").unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_work_dir_removed_on_error_path() {
        let parent = tempfile::tempdir().unwrap();

        fn failing(parent: &Path) -> Result<()> {
            let work = WorkDir::create(parent, "staging")?;
            fs::create_dir_all(work.path().join("lib/modules"))?;
            anyhow::bail!("depmod failed")
        }

        assert!(failing(parent.path()).is_err());
        assert!(!parent.path().join("staging").exists());
    }

    #[test]
    fn test_work_dir_replaces_stale() {
        let parent = tempfile::tempdir().unwrap();
        let stale = parent.path().join("staging");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("old"), b"x").unwrap();

        let work = WorkDir::create(parent.path(), "staging").unwrap();
        assert!(!work.path().join("old").exists());
    }

    #[test]
    fn test_temp_file_removed_unless_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let tmp_path = dir.path().join("out.cpio");
        {
            let tmp = TempFile::new(tmp_path.clone()).unwrap();
            fs::write(tmp.path(), b"cpio").unwrap();
        }
        assert!(!tmp_path.exists());

        let tmp = TempFile::new(tmp_path.clone()).unwrap();
        fs::write(tmp.path(), b"cpio").unwrap();
        let dest = dir.path().join("final.cpio");
        tmp.persist(&dest).unwrap();
        assert!(dest.exists());
        assert!(!tmp_path.exists());
    }
}
