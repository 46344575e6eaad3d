//! The sandbox execution engine.
//!
//! Composes the traced command, dispatches it to the selected launch
//! strategy, and normalizes every failure into a degraded-but-complete
//! result: callers always get an exit code and a trace artifact on disk,
//! never a pipeline abort.

use std::path::{Path, PathBuf};
use std::time::Duration;

use egresswatch_common::constants::{CONTAINER_LOG_FILE_NAME, TRACE_FILE_NAME};
use egresswatch_common::error::{EgressWatchError, Result};

use crate::backend::{LaunchRequest, SandboxBackend, detect_backend};
use crate::command::traced_shell_command;
use crate::hardening;

/// One sandboxed trace request.
#[derive(Debug, Clone)]
pub struct TraceRequest {
    /// Container image the command runs under.
    pub image: String,
    /// Target command as an argument vector.
    pub command: Vec<String>,
    /// Host directory mounted read-only as the command's working
    /// directory.
    pub work_dir: PathBuf,
    /// Run-scoped host directory receiving all artifacts.
    pub output_dir: PathBuf,
    /// Container wait deadline in seconds; 0 blocks indefinitely.
    pub wait_timeout_secs: u64,
}

/// Outcome of one sandboxed execution.
///
/// Produced even on total launch failure, in which case `exit_code` is 1,
/// the trace artifact is empty, and `warning` says why.
#[derive(Debug, Clone)]
pub struct SandboxRun {
    /// Exit code of the traced command (or 1 on a degraded run).
    pub exit_code: i64,
    /// Launch strategy name, for run metadata.
    pub mode: String,
    /// Raw trace artifact; guaranteed to exist after `run` returns
    /// whenever the output directory itself could be created.
    pub trace_path: PathBuf,
    /// Present when the run was degraded or the wait deadline expired.
    pub warning: Option<String>,
}

/// Engine that executes commands inside the tracing sandbox.
pub struct SandboxEngine {
    backend: Option<Box<dyn SandboxBackend>>,
}

impl SandboxEngine {
    /// Creates an engine with the auto-detected launch strategy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: detect_backend(),
        }
    }

    /// Creates an engine over an injected launch strategy.
    #[must_use]
    pub fn with_backend(backend: Box<dyn SandboxBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Whether any launch strategy is operational.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_available())
    }

    /// Name of the selected launch strategy, for run metadata.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        self.backend.as_ref().map_or("docker", |b| b.name())
    }

    /// Runs a command inside the sandbox with the tracer attached.
    ///
    /// Never fails: launch problems are downgraded to a warning plus a
    /// degraded result, and the trace artifact is touched into existence
    /// so downstream stages never special-case a missing file.
    #[must_use]
    pub fn run(&self, request: &TraceRequest) -> SandboxRun {
        let trace_path = request.output_dir.join(TRACE_FILE_NAME);
        let mode = self.mode().to_string();

        let outcome = self.try_run(request);
        ensure_trace_artifact(&trace_path);

        match outcome {
            Ok((exit_code, warning)) => SandboxRun {
                exit_code,
                mode,
                trace_path,
                warning,
            },
            Err(error) => {
                tracing::warn!(%error, "sandbox launch degraded");
                SandboxRun {
                    exit_code: 1,
                    mode,
                    trace_path,
                    warning: Some(error.to_string()),
                }
            }
        }
    }

    fn try_run(&self, request: &TraceRequest) -> Result<(i64, Option<String>)> {
        std::fs::create_dir_all(&request.output_dir).map_err(|e| EgressWatchError::Io {
            path: request.output_dir.clone(),
            source: e,
        })?;
        hardening::validate_image_name(&request.image)?;

        let work_dir = std::fs::canonicalize(&request.work_dir).map_err(|e| {
            EgressWatchError::Io {
                path: request.work_dir.clone(),
                source: e,
            }
        })?;
        let output_dir = std::fs::canonicalize(&request.output_dir).map_err(|e| {
            EgressWatchError::Io {
                path: request.output_dir.clone(),
                source: e,
            }
        })?;

        let backend = self.backend.as_ref().ok_or_else(|| EgressWatchError::Sandbox {
            message: "no container launch strategy available (is Docker installed?)".into(),
        })?;

        let launch = LaunchRequest {
            image: request.image.clone(),
            container_command: traced_shell_command(&request.command),
            work_dir,
            output_dir,
            wait_timeout: (request.wait_timeout_secs > 0)
                .then(|| Duration::from_secs(request.wait_timeout_secs)),
        };
        tracing::info!(
            image = %launch.image,
            strategy = backend.name(),
            cmd = ?request.command,
            "launching traced container"
        );
        let outcome = backend.launch(&launch)?;

        if !outcome.log.is_empty() {
            let log_path = request.output_dir.join(CONTAINER_LOG_FILE_NAME);
            if let Err(error) = std::fs::write(&log_path, &outcome.log) {
                tracing::warn!(path = %log_path.display(), %error, "failed to write container log");
            }
        }

        let warning = outcome.timed_out.then(|| {
            format!(
                "container exceeded the {}s wait deadline and was killed; partial artifacts salvaged",
                request.wait_timeout_secs
            )
        });
        Ok((outcome.exit_code, warning))
    }
}

impl Default for SandboxEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Touches the trace artifact into existence if the run produced none.
fn ensure_trace_artifact(path: &Path) {
    if path.exists() {
        return;
    }
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(_) => {}
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "failed to touch trace artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::backend::LaunchOutcome;

    use super::*;

    /// Scripted backend for exercising the engine without a runtime.
    struct ScriptedBackend {
        exit_code: i64,
        timed_out: bool,
        fail: bool,
        seen: Mutex<Vec<LaunchRequest>>,
    }

    impl ScriptedBackend {
        fn ok(exit_code: i64) -> Self {
            Self {
                exit_code,
                timed_out: false,
                fail: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok(0)
            }
        }
    }

    impl SandboxBackend for ScriptedBackend {
        fn launch(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
            self.seen.lock().expect("lock").push(request.clone());
            if self.fail {
                return Err(EgressWatchError::Sandbox {
                    message: "runtime unreachable".into(),
                });
            }
            Ok(LaunchOutcome {
                exit_code: self.exit_code,
                log: String::new(),
                timed_out: self.timed_out,
            })
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn request(work: &Path, out: &Path) -> TraceRequest {
        TraceRequest {
            image: "egresswatch/base:latest".into(),
            command: vec!["curl".into(), "https://example.com".into()],
            work_dir: work.to_path_buf(),
            output_dir: out.to_path_buf(),
            wait_timeout_secs: 300,
        }
    }

    #[test]
    fn successful_run_reports_exit_code_and_touches_trace() {
        let work = tempfile::tempdir().expect("work");
        let out = tempfile::tempdir().expect("out");
        let engine = SandboxEngine::with_backend(Box::new(ScriptedBackend::ok(0)));

        let run = engine.run(&request(work.path(), out.path()));
        assert_eq!(run.exit_code, 0);
        assert_eq!(run.mode, "scripted");
        assert!(run.warning.is_none());
        assert!(run.trace_path.exists());
    }

    #[test]
    fn backend_failure_degrades_instead_of_aborting() {
        let work = tempfile::tempdir().expect("work");
        let out = tempfile::tempdir().expect("out");
        let engine = SandboxEngine::with_backend(Box::new(ScriptedBackend::failing()));

        let run = engine.run(&request(work.path(), out.path()));
        assert_eq!(run.exit_code, 1);
        let warning = run.warning.expect("warning");
        assert!(warning.contains("runtime unreachable"));
        assert!(run.trace_path.exists());
        assert_eq!(
            std::fs::read(&run.trace_path).expect("read trace").len(),
            0,
            "degraded run must leave an empty trace"
        );
    }

    #[test]
    fn missing_backend_degrades_with_warning() {
        let work = tempfile::tempdir().expect("work");
        let out = tempfile::tempdir().expect("out");
        let engine = SandboxEngine { backend: None };
        assert_eq!(engine.mode(), "docker");

        let run = engine.run(&request(work.path(), out.path()));
        assert_eq!(run.exit_code, 1);
        assert!(run.warning.expect("warning").contains("no container launch strategy"));
        assert!(run.trace_path.exists());
    }

    #[test]
    fn invalid_image_reference_degrades_before_launch() {
        let work = tempfile::tempdir().expect("work");
        let out = tempfile::tempdir().expect("out");
        let backend = Box::new(ScriptedBackend::ok(0));
        let engine = SandboxEngine::with_backend(backend);

        let mut req = request(work.path(), out.path());
        req.image = "ubuntu; rm -rf /".into();
        let run = engine.run(&req);
        assert_eq!(run.exit_code, 1);
        assert!(run.warning.is_some());
    }

    #[test]
    fn deadline_expiry_surfaces_as_warning_with_real_exit_code() {
        let work = tempfile::tempdir().expect("work");
        let out = tempfile::tempdir().expect("out");
        let engine = SandboxEngine::with_backend(Box::new(ScriptedBackend {
            exit_code: 137,
            timed_out: true,
            fail: false,
            seen: Mutex::new(Vec::new()),
        }));

        let run = engine.run(&request(work.path(), out.path()));
        assert_eq!(run.exit_code, 137);
        assert!(run.warning.expect("warning").contains("wait deadline"));
    }

    #[test]
    fn launch_request_carries_traced_command_and_deadline() {
        let work = tempfile::tempdir().expect("work");
        let out = tempfile::tempdir().expect("out");
        let backend = ScriptedBackend::ok(0);
        let seen = std::sync::Arc::new(backend);
        // Run through a second handle so the recorded requests stay
        // inspectable after the engine takes ownership.
        struct Shared(std::sync::Arc<ScriptedBackend>);
        impl SandboxBackend for Shared {
            fn launch(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
                self.0.launch(request)
            }
            fn name(&self) -> &'static str {
                self.0.name()
            }
            fn is_available(&self) -> bool {
                true
            }
        }
        let engine = SandboxEngine::with_backend(Box::new(Shared(seen.clone())));

        let _ = engine.run(&request(work.path(), out.path()));
        let recorded = seen.seen.lock().expect("lock");
        assert_eq!(recorded.len(), 1);
        let launch = &recorded[0];
        assert_eq!(launch.container_command[0], "sh");
        assert!(launch.container_command[2].contains("strace -f -ttt"));
        assert_eq!(launch.wait_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn zero_timeout_means_unbounded_wait() {
        let work = tempfile::tempdir().expect("work");
        let out = tempfile::tempdir().expect("out");
        let backend = std::sync::Arc::new(ScriptedBackend::ok(0));
        struct Shared(std::sync::Arc<ScriptedBackend>);
        impl SandboxBackend for Shared {
            fn launch(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
                self.0.launch(request)
            }
            fn name(&self) -> &'static str {
                self.0.name()
            }
            fn is_available(&self) -> bool {
                true
            }
        }
        let engine = SandboxEngine::with_backend(Box::new(Shared(backend.clone())));

        let mut req = request(work.path(), out.path());
        req.wait_timeout_secs = 0;
        let _ = engine.run(&req);
        assert_eq!(backend.seen.lock().expect("lock")[0].wait_timeout, None);
    }
}
