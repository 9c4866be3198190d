//! Bootforge library exports.
//!
//! The binary is a thin clap layer over these modules; integration tests
//! drive them directly with a fake [`process::ToolRunner`].

pub mod artifact;
pub mod common;
pub mod config;
pub mod error;
pub mod logging;
pub mod modules;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod report;
pub mod sign;
pub mod timing;
