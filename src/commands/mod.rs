//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `assemble` - Build and sign every artifact
//! - `sign` - Add a verified-boot footer to one image
//! - `show` - Display information
//! - `preflight` - Run preflight checks

pub mod assemble;
mod preflight;
pub mod show;
pub mod sign;

pub use assemble::cmd_assemble;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
pub use sign::cmd_sign;
