//! The run result: the complete output of one pipeline execution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use egresswatch_analysis::{Flag, Summary};
use egresswatch_common::event::ConnectionEvent;
use egresswatch_common::types::RunId;

/// Everything one pipeline execution produced.
///
/// Constructed once per coordinator invocation, immutable thereafter, and
/// handed to the external reporting collaborator for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run identifier.
    pub run_id: RunId,
    /// RFC 3339 timestamp taken before the sandbox launch.
    pub started_at: String,
    /// RFC 3339 timestamp taken after the sandbox returned.
    pub finished_at: String,
    /// Exit code of the traced command (1 on a degraded run).
    pub exit_code: i64,
    /// Launch strategy the run executed under.
    pub mode: String,
    /// Container image the command ran under.
    pub image: String,
    /// The traced command as given.
    pub command: Vec<String>,
    /// Host working directory mounted into the sandbox.
    pub working_dir: PathBuf,
    /// Present when the sandbox degraded or the wait deadline expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Derived statistics over `events`.
    pub summary: Summary,
    /// Heuristic risk flags, computed over the full event list.
    pub flags: Vec<Flag>,
    /// Ordered connection events, in trace order.
    pub events: Vec<ConnectionEvent>,
}

impl RunResult {
    /// Bounds the stored event list for a storage collaborator.
    ///
    /// Summary and flags are computed over the full list before any
    /// truncation, so capping here never changes flag outcomes.
    #[must_use]
    pub fn capped(mut self, limit: usize) -> Self {
        self.events.truncate(limit);
        self
    }
}
