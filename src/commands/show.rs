//! Show command - displays information.

use anyhow::{bail, Result};
use std::fs;

use bootforge::config::Config;
use bootforge::report::REPORT_FILE;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the last run's artifact report
    Artifacts,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Artifacts => {
            let report = config.dist_dir.join(REPORT_FILE);
            if !report.exists() {
                bail!("{} not found. Run 'bootforge assemble' first.", report.display());
            }
            print!("{}", fs::read_to_string(&report)?);
        }
    }
    Ok(())
}
