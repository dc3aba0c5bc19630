//! # CNC Host Harness
//!
//! A thin synchronous driver for `cnc-core`: loads a machine config, streams
//! a G-code file, and cooperatively ticks the controller against a mock
//! executor until the job completes. Real hardware integration (a live
//! executor, a resumable line source, host command handling) is out of
//! scope here — this crate exists only so the workspace has a runnable,
//! testable edge over the pipeline.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod batch;
mod config;
mod executor;
mod streamer;

/// Command-line entry point for the CNC motion pipeline host harness.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream a G-code file through the pipeline against a mock executor.
    Run(batch::RunArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => batch::run(args),
    }
}
