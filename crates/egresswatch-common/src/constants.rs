//! System-wide constants and fixed container paths.

/// Application name used in CLI output and artifact files.
pub const APP_NAME: &str = "egresswatch";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "egw";

/// Default container image; must have `strace` pre-installed.
pub const DEFAULT_IMAGE: &str = "egresswatch/base:latest";

/// Default output directory, relative to the invocation directory.
pub const DEFAULT_OUTPUT_DIR: &str = "egresswatch-output";

/// Default container wait deadline in seconds; 0 disables the deadline.
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;

/// Mount point of the traced command's working directory (read-only).
pub const CONTAINER_WORK_DIR: &str = "/work";

/// Mount point of the host-owned writable output directory.
pub const CONTAINER_OUTPUT_DIR: &str = "/output";

/// Raw trace path inside the container.
pub const CONTAINER_TRACE_PATH: &str = "/output/egress.strace";

/// Captured stdout of the traced command inside the container.
pub const CONTAINER_STDOUT_PATH: &str = "/output/cmd_stdout";

/// Captured stderr of the traced command inside the container.
pub const CONTAINER_STDERR_PATH: &str = "/output/cmd_stderr";

/// Raw trace artifact file name on the host.
pub const TRACE_FILE_NAME: &str = "egress.strace";

/// Structured events artifact file name on the host.
pub const EVENTS_FILE_NAME: &str = "egress.jsonl";

/// Run metadata artifact file name on the host.
pub const METADATA_FILE_NAME: &str = "run.json";

/// Container log artifact file name on the host.
pub const CONTAINER_LOG_FILE_NAME: &str = "container.log";

/// Per-argument string truncation length passed to the tracer. Generous
/// enough that IPv4 literals are never cut mid-address.
pub const STRACE_STRING_LIMIT: usize = 256;
