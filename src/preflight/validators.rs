//! Content validation for preflight inputs.
//!
//! These check that a file will work for its purpose, not just that it
//! exists. An empty key file or a truncated kernel passes `.exists()` and
//! then fails halfway through assemble.

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::modules::{find_kernel_release, parse_module_list, MODULE_SUFFIX};

/// Offset of the arm64 Image header magic.
const ARM64_MAGIC_OFFSET: usize = 0x38;
const ARM64_MAGIC: &[u8; 4] = b"ARM\x64";

/// Check the arm64 Image header. Returns the file size.
pub fn validate_kernel_image(path: &Path) -> Result<u64, String> {
    let mut header = [0u8; 64];
    let mut file = fs::File::open(path).map_err(|e| format!("Cannot open: {}", e))?;
    file.read_exact(&mut header)
        .map_err(|_| "Shorter than an arm64 Image header".to_string())?;

    if &header[ARM64_MAGIC_OFFSET..ARM64_MAGIC_OFFSET + 4] != ARM64_MAGIC {
        return Err("Missing arm64 Image magic - not an uncompressed arm64 kernel".to_string());
    }

    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| format!("Cannot stat: {}", e))
}

/// Check a PEM file holds the expected block type.
pub fn validate_pem(path: &Path, block: &str) -> Result<(), String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Cannot read: {}", e))?;
    let marker = format!("-----BEGIN {}", block);
    if !content.contains(&marker) && !content.contains(&format!("-----BEGIN RSA {}", block)) {
        return Err(format!("No '{}' block found", marker));
    }
    Ok(())
}

/// Check every entry in a module list names a module. Returns the entry
/// count, which may be zero: emptiness only matters for the combined manifest.
pub fn validate_module_list(path: &Path) -> Result<usize, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Cannot read: {}", e))?;
    let entries = parse_module_list(&content);
    if let Some(bad) = entries.iter().find(|e| !e.ends_with(MODULE_SUFFIX)) {
        return Err(format!("Entry '{}' is not a {} module", bad, MODULE_SUFFIX));
    }
    Ok(entries.len())
}

/// Check the installed tree has one release with modules in it.
/// Returns the release name and module count.
pub fn validate_module_tree(installed: &Path) -> Result<(String, usize), String> {
    let release = find_kernel_release(installed).map_err(|e| format!("{:#}", e))?;
    let count = walkdir::WalkDir::new(installed.join(&release))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(MODULE_SUFFIX))
        .count();
    if count == 0 {
        return Err(format!("No {} files under release {}", MODULE_SUFFIX, release));
    }
    Ok((release, count))
}
