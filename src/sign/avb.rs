//! Verified-boot footers via avbtool.
//!
//! Signing is a post-process over a finished image: it needs only the file
//! on disk, never the staging state that produced it. A call either returns
//! a [`SignedPartition`] (signed) or an error (aborted).

use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::policy::{FooterClass, SigningPolicy, FOOTER_HEADROOM};
use crate::config::{KeySet, ToolSet};
use crate::error::PipelineError;
use crate::process::{Cmd, ToolRunner};

/// Signature algorithm for every footer.
pub const AVB_ALGORITHM: &str = "SHA256_RSA4096";

/// Outcome of a successful signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedPartition {
    pub partition: String,
    pub image: PathBuf,
    pub footer: FooterClass,
    /// Partition size derived from policy. Only passed to avbtool for hash
    /// footers; hashtree footers let avbtool size the image itself.
    pub padded_size: u64,
}

/// Build the avbtool invocation for one partition.
pub fn footer_command(
    tools: &ToolSet,
    keys: &KeySet,
    partition: &str,
    image: &Path,
    footer: FooterClass,
    padded_size: u64,
) -> Cmd {
    let mut cmd = Cmd::tool(&tools.avbtool)
        .arg(footer.avbtool_command())
        .arg("--image")
        .arg_path(image)
        .args(["--partition_name", partition]);

    if footer == FooterClass::Hash {
        cmd = cmd.arg("--partition_size").arg(padded_size.to_string());
    }

    cmd.args(["--algorithm", AVB_ALGORITHM])
        .arg("--key")
        .arg_path(&keys.avb_key)
        .error_msg(format!("avbtool {} failed for {}", footer.avbtool_command(), partition))
}

/// Append the policy-selected footer to `image` in place.
pub fn sign_partition(
    tools: &ToolSet,
    keys: &KeySet,
    runner: &dyn ToolRunner,
    policy: &SigningPolicy,
    partition: &str,
    image: &Path,
) -> Result<SignedPartition> {
    let raw_size = fs::metadata(image)
        .map_err(|e| {
            PipelineError::signing(format!("image {} unavailable: {}", image.display(), e))
        })?
        .len();
    if !tools.avbtool.is_file() {
        return Err(PipelineError::signing(format!(
            "avbtool not found at {}",
            tools.avbtool.display()
        ))
        .into());
    }
    if !keys.avb_key.is_file() {
        return Err(PipelineError::signing(format!(
            "signing key not found at {}",
            keys.avb_key.display()
        ))
        .into());
    }

    let footer = policy.footer_class(partition);
    let padded_size = policy.padded_size(partition, raw_size);

    if footer == FooterClass::Hash && raw_size + FOOTER_HEADROOM > padded_size {
        return Err(PipelineError::signing(format!(
            "{} image is {} bytes, too large for a {} byte partition",
            partition, raw_size, padded_size
        ))
        .into());
    }

    tracing::info!(
        "Signing {} ({} footer, {} bytes -> {})",
        partition,
        footer,
        raw_size,
        padded_size
    );

    let cmd = footer_command(tools, keys, partition, image, footer, padded_size);
    runner
        .run(cmd)
        .map_err(|e| PipelineError::signing(format!("{:#}", e)))?;

    Ok(SignedPartition {
        partition: partition.to_string(),
        image: image.to_path_buf(),
        footer,
        padded_size,
    })
}
