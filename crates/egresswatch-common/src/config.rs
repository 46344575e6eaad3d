//! Global configuration model for an egresswatch run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Immutable configuration handed to the pipeline at construction.
///
/// There is deliberately no ambient global state: everything a run needs
/// beyond its command line travels through this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressConfig {
    /// Container image the traced command runs under.
    pub image: String,
    /// Host directory the run writes its artifacts to. Exclusively owned
    /// by one pipeline run, never shared across concurrent invocations.
    pub output_dir: PathBuf,
    /// Container wait deadline in seconds; 0 blocks indefinitely.
    pub wait_timeout_secs: u64,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            image: crate::constants::DEFAULT_IMAGE.to_string(),
            output_dir: PathBuf::from(crate::constants::DEFAULT_OUTPUT_DIR),
            wait_timeout_secs: crate::constants::DEFAULT_WAIT_TIMEOUT_SECS,
        }
    }
}
