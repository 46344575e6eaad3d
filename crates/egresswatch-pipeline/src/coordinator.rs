//! Stage sequencing for one pipeline run.
//!
//! `Idle → Running → Parsing → Aggregated → Done`, strictly forward. A
//! failure while Running degrades to an empty trace rather than aborting;
//! parsing cannot fail by contract; aggregation is a total function. The
//! whole trace is on disk before parsing begins — there is no streaming
//! across stage boundaries.

use std::fmt;
use std::path::Path;

use egresswatch_analysis::{FlagThresholds, aggregate};
use egresswatch_common::config::EgressConfig;
use egresswatch_common::constants::{EVENTS_FILE_NAME, METADATA_FILE_NAME};
use egresswatch_common::error::{EgressWatchError, Result};
use egresswatch_common::event::ConnectionEvent;
use egresswatch_common::types::RunId;
use egresswatch_sandbox::{SandboxEngine, TraceRequest};
use egresswatch_trace::{TraceReader, records};

use crate::result::RunResult;

/// Stages of one pipeline execution, strictly forward-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    /// Constructed, nothing launched yet.
    Idle,
    /// Sandbox active.
    Running,
    /// Trace artifact being parsed.
    Parsing,
    /// Summary and flags computed.
    Aggregated,
    /// Run result assembled and persisted.
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Parsing => write!(f, "parsing"),
            Self::Aggregated => write!(f, "aggregated"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Coordinates one run through the sandbox, parser, and aggregator.
pub struct Coordinator {
    config: EgressConfig,
    thresholds: FlagThresholds,
    engine: SandboxEngine,
}

impl Coordinator {
    /// Creates a coordinator with the auto-detected sandbox engine.
    #[must_use]
    pub fn new(config: EgressConfig, thresholds: FlagThresholds) -> Self {
        Self {
            config,
            thresholds,
            engine: SandboxEngine::new(),
        }
    }

    /// Creates a coordinator over an injected sandbox engine.
    #[must_use]
    pub fn with_engine(
        config: EgressConfig,
        thresholds: FlagThresholds,
        engine: SandboxEngine,
    ) -> Self {
        Self {
            config,
            thresholds,
            engine,
        }
    }

    /// The configuration this coordinator was constructed with.
    #[must_use]
    pub fn config(&self) -> &EgressConfig {
        &self.config
    }

    /// Runs the full pipeline for one command.
    ///
    /// Always yields a run result: sandbox failures and an unreadable
    /// trace degrade to warnings with an empty event list. The events and
    /// metadata artifacts are written under the configured output
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error only if a result artifact cannot be written.
    pub fn execute(&self, command: &[String], work_dir: &Path) -> Result<RunResult> {
        let run_id = RunId::generate();
        let mut stage = PipelineStage::Idle;
        tracing::info!(run_id = %run_id, cmd = ?command, "pipeline starting");

        let started_at = chrono::Utc::now().to_rfc3339();
        advance(&mut stage, PipelineStage::Running);
        let sandbox = self.engine.run(&TraceRequest {
            image: self.config.image.clone(),
            command: command.to_vec(),
            work_dir: work_dir.to_path_buf(),
            output_dir: self.config.output_dir.clone(),
            wait_timeout_secs: self.config.wait_timeout_secs,
        });
        let finished_at = chrono::Utc::now().to_rfc3339();
        if let Some(warning) = &sandbox.warning {
            tracing::warn!(run_id = %run_id, %warning, "sandbox degraded");
        }

        advance(&mut stage, PipelineStage::Parsing);
        let (mut events, parse_warning) = match TraceReader::open(&sandbox.trace_path) {
            Ok(reader) => (reader.collect::<Vec<_>>(), None),
            // The engine touches the trace into existence, so an open
            // failure means environment corruption; degrade like a
            // sandbox failure to keep the always-a-result guarantee.
            Err(error) => (Vec::new(), Some(error.to_string())),
        };
        self.stamp_events(&mut events, &run_id, command);
        let _ = records::write_events(
            &self.config.output_dir.join(EVENTS_FILE_NAME),
            &events,
        )?;

        advance(&mut stage, PipelineStage::Aggregated);
        let (summary, flags) = aggregate(&events, &self.thresholds);

        advance(&mut stage, PipelineStage::Done);
        let result = RunResult {
            run_id,
            started_at,
            finished_at,
            exit_code: sandbox.exit_code,
            mode: sandbox.mode,
            image: self.config.image.clone(),
            command: command.to_vec(),
            working_dir: work_dir.to_path_buf(),
            warning: merge_warnings(sandbox.warning, parse_warning),
            summary,
            flags,
            events,
        };
        self.write_metadata(&result)?;
        tracing::info!(
            run_id = %result.run_id,
            exit_code = result.exit_code,
            events = result.summary.total_events,
            flags = result.flags.len(),
            "pipeline complete"
        );
        Ok(result)
    }

    /// Stamps the coordinator-owned pass-through attributes onto events
    /// headed for the reporting collaborator.
    fn stamp_events(&self, events: &mut [ConnectionEvent], run_id: &RunId, command: &[String]) {
        let cmd = command.join(" ");
        for event in events {
            event.run_id = Some(run_id.to_string());
            event.cmd = Some(cmd.clone());
            event.container_image = Some(self.config.image.clone());
        }
    }

    fn write_metadata(&self, result: &RunResult) -> Result<()> {
        let path = self.config.output_dir.join(METADATA_FILE_NAME);
        let body = serde_json::to_string_pretty(result)?;
        std::fs::write(&path, body).map_err(|e| EgressWatchError::Io {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "run metadata written");
        Ok(())
    }
}

/// Joins the sandbox and parse warnings when both are present.
fn merge_warnings(sandbox: Option<String>, parse: Option<String>) -> Option<String> {
    match (sandbox, parse) {
        (Some(a), Some(b)) => Some(format!("{a}; {b}")),
        (a, b) => a.or(b),
    }
}

/// Moves the stage machine strictly forward.
fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    debug_assert!(next > *stage, "pipeline stage may never be revisited");
    tracing::debug!(from = %stage, to = %next, "stage transition");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_strictly_ordered() {
        let order = [
            PipelineStage::Idle,
            PipelineStage::Running,
            PipelineStage::Parsing,
            PipelineStage::Aggregated,
            PipelineStage::Done,
        ];
        for pair in order.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn advance_moves_forward() {
        let mut stage = PipelineStage::Idle;
        advance(&mut stage, PipelineStage::Running);
        advance(&mut stage, PipelineStage::Parsing);
        assert_eq!(stage, PipelineStage::Parsing);
    }
}
