//! # egw — egresswatch CLI
//!
//! Runs a command inside an isolated tracing sandbox and reports its
//! network egress behavior.

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
        )
        .init();

    let cli = Cli::parse();
    let exit_code = commands::execute(cli)?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
