//! Binary crate for the `listing` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration and the "location is off" prompt
//! - Human-friendly output formatting

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod console;

/// How long teardown waits for blocking work, such as an open prompt.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    init_tracing(cmd.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(cmd.run());
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    result
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
