//! CLI command definitions and dispatch.

pub mod parse;
pub mod watch;

use clap::{Parser, Subcommand};

/// egresswatch — network egress monitoring for sandboxed commands.
#[derive(Parser, Debug)]
#[command(name = "egw", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command in the tracing sandbox and report its egress.
    Watch(watch::WatchArgs),
    /// Re-parse an existing raw trace into the structured event artifact.
    Parse(parse::ParseArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// Returns the process exit code: for `watch` this is the traced
/// command's own exit code.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Watch(args) => watch::execute(args),
        Command::Parse(args) => parse::execute(args),
    }
}
