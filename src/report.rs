//! `artifacts.json`: what a run produced, with content hashes.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::common::write_file_with_dirs;
use crate::sign::{FooterClass, SignedPartition};

/// File name of the report inside the dist directory.
pub const REPORT_FILE: &str = "artifacts.json";

/// One produced file.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
    pub signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<FooterClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padded_size: Option<u64>,
}

impl ArtifactRecord {
    /// Record an unsigned artifact.
    pub fn unsigned(name: &str, path: &Path) -> Result<Self> {
        let (size, sha256) = hash_file(path)?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            size,
            sha256,
            signed: false,
            footer: None,
            padded_size: None,
        })
    }

    /// Record a signed copy. Hashed after the footer was appended.
    pub fn signed(name: &str, signed: &SignedPartition) -> Result<Self> {
        let (size, sha256) = hash_file(&signed.image)?;
        Ok(Self {
            name: name.to_string(),
            path: signed.image.clone(),
            size,
            sha256,
            signed: true,
            footer: Some(signed.footer),
            padded_size: Some(signed.padded_size),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactReport {
    pub kernel_release: Option<String>,
    pub artifacts: Vec<ArtifactRecord>,
}

impl ArtifactReport {
    pub fn push(&mut self, record: ArtifactRecord) {
        self.artifacts.push(record);
    }

    /// Write as pretty JSON to `<dist_dir>/artifacts.json`.
    pub fn write(&self, dist_dir: &Path) -> Result<PathBuf> {
        let path = dist_dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        write_file_with_dirs(&path, json + "\n")?;
        tracing::info!("Wrote {} ({} artifacts)", path.display(), self.artifacts.len());
        Ok(path)
    }
}

/// Size and streamed SHA-256 of a file.
pub fn hash_file(path: &Path) -> Result<(u64, String)> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to read {} for hashing", path.display()))?;
    Ok((size, format!("{:x}", hasher.finalize())))
}
