//! Launch strategy abstraction for the sandbox.
//!
//! Two functionally equivalent backends exist: a Docker Engine API client
//! and a `docker(1)` subprocess fallback. Callers select automatically by
//! capability probing at startup; behavior, mount layout, and security
//! flags are identical between the two, which the contract tests below
//! assert.

pub mod api;
pub mod cli;

use std::path::PathBuf;
use std::time::Duration;

use egresswatch_common::error::Result;

/// Everything a backend needs to launch one traced container.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Container image reference, already validated.
    pub image: String,
    /// Full container command, including the tracer wrapper.
    pub container_command: Vec<String>,
    /// Host directory mounted read-only at `/work`.
    pub work_dir: PathBuf,
    /// Host directory mounted writable at `/output`.
    pub output_dir: PathBuf,
    /// Wait deadline; `None` blocks until the container exits.
    pub wait_timeout: Option<Duration>,
}

/// Result of one container launch.
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    /// Exit code of the container's init process.
    pub exit_code: i64,
    /// Combined container log stream, retrieved before removal.
    pub log: String,
    /// Whether the wait deadline expired and the container was killed.
    /// Artifacts written to `/output` before the kill are still salvaged.
    pub timed_out: bool,
}

/// A container launch strategy.
///
/// Implementors launch detached, wait for the whole process tree, retrieve
/// the exit code and log, and remove the container only after inspection
/// (removing earlier makes status and log retrieval a race).
pub trait SandboxBackend: Send + Sync {
    /// Launches the traced container and waits for completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the launch is rejected or the runtime becomes
    /// unreachable. Callers downgrade this to a degraded run, never an
    /// abort.
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchOutcome>;

    /// Short strategy name recorded in run metadata.
    fn name(&self) -> &'static str;

    /// Whether this strategy is operational on the current host.
    fn is_available(&self) -> bool;
}

/// Probes available capabilities and returns the preferred backend.
///
/// The Engine API client wins when the daemon answers a ping; otherwise a
/// `docker` binary on `PATH` selects the subprocess fallback. `None` means
/// no strategy is available and the caller should degrade.
#[must_use]
pub fn detect_backend() -> Option<Box<dyn SandboxBackend>> {
    if let Some(backend) = api::ApiBackend::probe() {
        tracing::info!("using Docker Engine API launch strategy");
        return Some(Box::new(backend));
    }
    let cli = cli::CliBackend::new();
    if cli.is_available() {
        tracing::info!("using docker CLI launch strategy");
        return Some(Box::new(cli));
    }
    tracing::warn!("no container launch strategy available");
    None
}
