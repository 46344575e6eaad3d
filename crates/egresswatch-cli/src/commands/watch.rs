//! `egw watch` — run a command and monitor its network egress.

use std::path::PathBuf;

use clap::Args;

use egresswatch_analysis::FlagThresholds;
use egresswatch_common::config::EgressConfig;
use egresswatch_common::constants;
use egresswatch_pipeline::{Coordinator, RunResult};

use crate::output::{BOLD, DIM, GREEN, RESET, YELLOW, format_percent};

/// Arguments for the `watch` command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Output directory for run artifacts.
    #[arg(long, default_value = constants::DEFAULT_OUTPUT_DIR)]
    pub out: PathBuf,

    /// Container image to use (must have strace pre-installed).
    #[arg(long, default_value = constants::DEFAULT_IMAGE)]
    pub image: String,

    /// Container wait deadline in seconds; 0 disables the deadline.
    #[arg(long, default_value_t = constants::DEFAULT_WAIT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Command to run. Use `--` to separate it from options.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub cmd: Vec<String>,
}

/// Executes the `watch` command.
///
/// # Errors
///
/// Returns an error if the pipeline cannot persist its artifacts.
pub fn execute(args: WatchArgs) -> anyhow::Result<i32> {
    let work_dir = std::env::current_dir()?;

    let config = EgressConfig {
        image: args.image,
        output_dir: args.out,
        wait_timeout_secs: args.timeout,
    };
    let coordinator = Coordinator::new(config, FlagThresholds::default());
    let result = coordinator
        .execute(&args.cmd, &work_dir)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    print_report(&result, coordinator.config());
    Ok(i32::try_from(result.exit_code).unwrap_or(1))
}

fn print_report(result: &RunResult, config: &EgressConfig) {
    let output_dir = config.output_dir.display();

    eprintln!();
    if let Some(warning) = &result.warning {
        eprintln!("  {YELLOW}Warning:{RESET} {warning}");
        eprintln!();
    }
    eprintln!(
        "  {GREEN}{BOLD}✓{RESET} Command completed with exit code {}",
        result.exit_code
    );
    eprintln!("  {DIM}Run ID:{RESET} {}", result.run_id);
    eprintln!("  {DIM}Output directory:{RESET} {output_dir}");
    eprintln!();
    eprintln!(
        "  Network events captured: {BOLD}{}{RESET}",
        result.summary.total_events
    );
    if result.summary.total_events > 0 {
        eprintln!(
            "  Unique destinations: {} IPs, {} IP:port pairs",
            result.summary.unique_destination_ips, result.summary.unique_destination_pairs
        );
        eprintln!(
            "  Failure rate: {}",
            format_percent(result.summary.failure_rate)
        );
    }
    if !result.flags.is_empty() {
        eprintln!();
        for flag in &result.flags {
            eprintln!(
                "  {YELLOW}⚑ {}{RESET} [{}] {DIM}{}{RESET}",
                flag.name, flag.severity, flag.description
            );
        }
    }
    eprintln!();
    eprintln!("  {DIM}Files written under {output_dir}:{RESET}");
    eprintln!("    - {} ({} events)", constants::EVENTS_FILE_NAME, result.summary.total_events);
    eprintln!("    - {} (run metadata)", constants::METADATA_FILE_NAME);
    eprintln!("    - {} (raw trace)", constants::TRACE_FILE_NAME);
}
