//! Sign command - adds a verified-boot footer to an existing image.

use anyhow::Result;
use std::path::Path;

use bootforge::config::Config;
use bootforge::pipeline;
use bootforge::process::SystemRunner;

/// Execute the sign command. The image is modified in place.
pub fn cmd_sign(config: &Config, partition: &str, image: &Path) -> Result<()> {
    let signed = pipeline::sign_image(config, &SystemRunner, partition, image)?;
    println!(
        "Signed {} ({} footer, partition size {})",
        signed.image.display(),
        signed.footer,
        signed.padded_size
    );
    Ok(())
}
