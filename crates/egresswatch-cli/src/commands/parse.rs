//! `egw parse` — re-parse a raw trace into the structured event artifact.

use std::path::PathBuf;

use clap::Args;

use egresswatch_common::constants::EVENTS_FILE_NAME;
use egresswatch_trace::{TraceReader, records};

use crate::output::{BOLD, RESET};

/// Arguments for the `parse` command.
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Path to the raw trace artifact.
    pub trace: PathBuf,

    /// Output path for the events artifact; defaults to `egress.jsonl`
    /// next to the trace.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Executes the `parse` command.
///
/// # Errors
///
/// Returns an error if the trace cannot be opened or the events artifact
/// cannot be written.
pub fn execute(args: ParseArgs) -> anyhow::Result<i32> {
    let out = args
        .out
        .unwrap_or_else(|| args.trace.with_file_name(EVENTS_FILE_NAME));

    let events: Vec<_> = TraceReader::open(&args.trace)
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .collect();
    let count = records::write_events(&out, &events).map_err(|e| anyhow::anyhow!("{e}"))?;

    eprintln!("  Parsed {BOLD}{count}{RESET} event(s) into {}", out.display());
    Ok(0)
}
