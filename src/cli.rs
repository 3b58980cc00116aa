//! Command line front end for dlna-explorer
//!
//! This module wires the clap argument definitions to the commands driving
//! the control point and the playback sequencer.

mod args;
mod commands;

pub use args::{Browse, Cli, Delete, List, Play};
pub use commands::Commands;

use crate::error::Result;
use clap::Parser;

/// Run the CLI application
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.command.run(&cli).await
}
