//! Launch strategy backed by the `docker(1)` command line.
//!
//! Fallback for hosts where the Engine API socket is not reachable but a
//! docker client binary is on `PATH`. Produces the same sandbox as the
//! API strategy; the shared profile in [`crate::hardening`] guarantees it.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use egresswatch_common::error::{EgressWatchError, Result};

use super::{LaunchOutcome, LaunchRequest, SandboxBackend};
use crate::hardening;

/// Poll interval while waiting on a container with a deadline.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Backend that shells out to the docker client binary.
pub struct CliBackend;

impl CliBackend {
    /// Creates a new CLI backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for CliBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxBackend for CliBackend {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
        let run = Command::new("docker")
            .args(docker_run_args(request))
            .output()
            .map_err(|e| EgressWatchError::Sandbox {
                message: format!("failed to invoke docker: {e}"),
            })?;
        if !run.status.success() {
            return Err(EgressWatchError::Sandbox {
                message: format!(
                    "failed to start container: {}",
                    String::from_utf8_lossy(&run.stderr).trim()
                ),
            });
        }
        let id = String::from_utf8_lossy(&run.stdout).trim().to_string();
        if id.is_empty() {
            return Err(EgressWatchError::Sandbox {
                message: "failed to get container id".into(),
            });
        }
        tracing::info!(container = %id, image = %request.image, "container created");

        let timed_out = wait_for_container(&id, request.wait_timeout)?;
        let exit_code = inspect_exit_code(&id);
        tracing::info!(container = %id, exit_code, "container exited");

        let log = container_log(&id);

        // Remove only after status and log retrieval.
        let _ = Command::new("docker").args(["rm", &id]).output();

        Ok(LaunchOutcome {
            exit_code,
            log,
            timed_out,
        })
    }

    fn name(&self) -> &'static str {
        "docker-cli"
    }

    fn is_available(&self) -> bool {
        which::which("docker").is_ok()
    }
}

/// Builds the full `docker run` argument vector from the hardened
/// profile.
///
/// Exposed so the backend contract tests can compare it against the
/// Engine API strategy without invoking docker.
#[must_use]
pub fn docker_run_args(request: &LaunchRequest) -> Vec<String> {
    let mut args: Vec<String> = vec!["run".into(), "-d".into(), "--read-only".into()];
    for (path, opts) in hardening::TMPFS_MOUNTS {
        args.push("--tmpfs".into());
        args.push(format!("{path}:{opts}"));
    }
    args.push("--cap-drop".into());
    args.push(hardening::DROPPED_CAPABILITIES.into());
    args.push("--cap-add".into());
    args.push(hardening::RETAINED_CAPABILITY.into());
    for opt in hardening::SECURITY_OPTS {
        args.push("--security-opt".into());
        args.push((*opt).into());
    }
    for mount in hardening::bind_mounts(&request.work_dir, &request.output_dir) {
        args.push("--volume".into());
        args.push(mount);
    }
    args.push("--workdir".into());
    args.push(egresswatch_common::constants::CONTAINER_WORK_DIR.into());
    args.push(request.image.clone());
    args.extend(request.container_command.iter().cloned());
    args
}

/// Blocks until the container exits, enforcing the optional deadline.
///
/// On expiry the container is force-killed and `Ok(true)` is returned so
/// the caller can salvage whatever artifacts were already written.
fn wait_for_container(id: &str, deadline: Option<Duration>) -> Result<bool> {
    let mut child = Command::new("docker")
        .args(["wait", id])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| EgressWatchError::Sandbox {
            message: format!("failed to wait for container: {e}"),
        })?;

    let Some(limit) = deadline else {
        let _ = child.wait().map_err(|e| EgressWatchError::Sandbox {
            message: format!("container wait failed: {e}"),
        })?;
        return Ok(false);
    };

    let end = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return Ok(false),
            Ok(None) => {
                if Instant::now() >= end {
                    tracing::warn!(container = %id, ?limit, "wait deadline expired, killing container");
                    let _ = Command::new("docker").args(["kill", id]).output();
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(true);
                }
                std::thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(e) => {
                return Err(EgressWatchError::Sandbox {
                    message: format!("container wait failed: {e}"),
                });
            }
        }
    }
}

/// Reads the container's exit code; a failed inspection reads as 1.
fn inspect_exit_code(id: &str) -> i64 {
    let inspect = Command::new("docker")
        .args(["inspect", "--format", "{{.State.ExitCode}}", id])
        .output();
    match inspect {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .unwrap_or(1),
        _ => 1,
    }
}

/// Retrieves the container's combined log stream.
fn container_log(id: &str) -> String {
    match Command::new("docker").args(["logs", id]).output() {
        Ok(output) => {
            let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
            log.push_str(&String::from_utf8_lossy(&output.stderr));
            log
        }
        Err(_) => String::new(),
    }
}
