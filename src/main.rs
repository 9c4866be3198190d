//! Bootforge - vendor boot and module partition assembler.
//!
//! Turns a compiled kernel tree and a set of prebuilts into:
//! - boot.img / vendor_boot.img (kernel, dtb, ramdisk fragments)
//! - vendor_dlkm.img / system_dlkm.img (EROFS module partitions)
//! - dtbo.img
//! - AVB-signed copies of each partition under dist/signed/

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bootforge::config::Config;
use bootforge::logging;

#[derive(Parser)]
#[command(name = "bootforge")]
#[command(about = "Vendor boot and module partition assembler")]
#[command(
    after_help = concat!(
        "QUICK START:\n",
        "  bootforge preflight  Check tools and inputs\n",
        "  bootforge assemble   Build and sign everything\n",
        "  bootforge show config"
    )
)]
struct Cli {
    /// Directory holding .env; relative paths resolve against it
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every artifact and sign the partitions
    Assemble {
        /// Skip the strict preflight run before assembling
        #[arg(long)]
        skip_preflight: bool,
    },

    /// Add a verified-boot footer to an image in place
    Sign {
        /// Partition name (selects hash or hashtree footer)
        partition: String,
        /// Image file to sign
        image: PathBuf,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Run preflight checks (verify tools and inputs before assembling)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show the artifact report of the last assemble
    Artifacts,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.base_dir);

    match cli.command {
        Commands::Assemble { skip_preflight } => {
            logging::init(Some(&config.build_log))?;
            commands::cmd_assemble(&config, skip_preflight)?;
        }
        Commands::Sign { partition, image } => {
            logging::init(Some(&config.build_log))?;
            commands::cmd_sign(&config, &partition, &image)?;
        }
        Commands::Show { what } => {
            logging::init(None)?;
            let target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Artifacts => commands::show::ShowTarget::Artifacts,
            };
            commands::cmd_show(target, &config)?;
        }
        Commands::Preflight { strict } => {
            logging::init(None)?;
            commands::cmd_preflight(&config, strict)?;
        }
    }

    Ok(())
}
