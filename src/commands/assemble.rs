//! Assemble command - runs the full pipeline.

use anyhow::Result;

use bootforge::config::Config;
use bootforge::pipeline;
use bootforge::preflight;
use bootforge::process::SystemRunner;
use bootforge::timing::Timer;

/// Execute the assemble command.
pub fn cmd_assemble(config: &Config, skip_preflight: bool) -> Result<()> {
    if !skip_preflight {
        preflight::run_preflight_or_fail(config)?;
    }

    let timer = Timer::start("Assemble");
    let report = pipeline::assemble(config, &SystemRunner)?;
    timer.finish();

    println!("\n=== Assemble Complete ===");
    if let Some(release) = &report.kernel_release {
        println!("  Kernel release: {}", release);
    }
    for artifact in &report.artifacts {
        let tag = if artifact.signed { " [signed]" } else { "" };
        println!(
            "  {}: {} ({} KB){}",
            artifact.name,
            artifact.path.display(),
            artifact.size / 1024,
            tag
        );
    }
    Ok(())
}
