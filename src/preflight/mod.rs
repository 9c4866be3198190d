//! Preflight checks for bootforge.
//!
//! Validates every tool and input before starting an assemble.
//! Run with `bootforge preflight` to check everything is ready.

mod inputs;
mod tools;
mod types;
mod validators;

use anyhow::Result;

use crate::config::Config;
use crate::error::PipelineError;

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight(config: &Config) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    println!("Checking tools...");
    checks.extend(tools::check_tools(
        &config.tools,
        &config.prebuilts_dir.join("bin"),
    ));

    println!("Checking inputs...");
    checks.extend(inputs::check_inputs(config));

    println!();

    PreflightReport { checks }
}

/// Run preflight and fail if any check fails.
pub fn run_preflight_or_fail(config: &Config) -> Result<()> {
    let report = run_preflight(config);
    report.print();

    if !report.all_passed() {
        return Err(PipelineError::config(format!(
            "preflight failed: {} check(s) failed ({}). Fix them before assembling.",
            report.fail_count(),
            report.failures().join(", ")
        ))
        .into());
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
