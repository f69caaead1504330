//! cli
//!
//! Command-line interface layer for ghtree.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve configuration and build a [`crate::repo::Repository`]
//! - Delegate to command handlers and format their output
//!
//! # Architecture
//!
//! The CLI layer is thin. Every remote interaction goes through the
//! repository handle; handlers only translate arguments and print results.

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::Result;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    crate::telemetry::init(cli.debug);
    commands::dispatch(cli)
}
