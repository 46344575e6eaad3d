//! Composition of the traced container command.
//!
//! The target command is quoted into an inner shell invocation whose
//! stdout/stderr land under `/output`, then wrapped with the tracer:
//! follow forks, timestamp every line, network syscalls only, generous
//! string truncation so address literals survive intact, output to the
//! fixed trace path. A trailing `sync` flushes the bind mount before the
//! container exits.

use egresswatch_common::constants::{
    CONTAINER_STDERR_PATH, CONTAINER_STDOUT_PATH, CONTAINER_TRACE_PATH, STRACE_STRING_LIMIT,
};

/// Quotes one argument for POSIX `sh`.
///
/// Safe characters pass through untouched; everything else is wrapped in
/// single quotes with embedded single quotes escaped.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    const fn is_safe(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
    }
    if !arg.is_empty() && arg.chars().all(is_safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Quotes and joins a full argument vector for POSIX `sh`.
#[must_use]
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the container command that runs `command` under the tracer.
///
/// Returns an argument vector of the form `["sh", "-c", ...]`, suitable
/// for either launch strategy.
#[must_use]
pub fn traced_shell_command(command: &[String]) -> Vec<String> {
    let inner = format!(
        "{} > {CONTAINER_STDOUT_PATH} 2> {CONTAINER_STDERR_PATH}",
        shell_join(command)
    );
    let script = format!(
        "strace -f -ttt -e trace=network -s {STRACE_STRING_LIMIT} -o {CONTAINER_TRACE_PATH} -- sh -c {} && sync",
        shell_quote(&inner)
    );
    vec!["sh".to_string(), "-c".to_string(), script]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_arguments_pass_through_unquoted() {
        assert_eq!(shell_quote("curl"), "curl");
        assert_eq!(shell_quote("https://example.com/path"), "https://example.com/path");
        assert_eq!(shell_quote("-sSf"), "-sSf");
    }

    #[test]
    fn unsafe_arguments_are_single_quoted() {
        assert_eq!(shell_quote("hello world"), "'hello world'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a;b"), "'a;b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn join_preserves_argument_order() {
        let args = vec!["echo".to_string(), "two words".to_string()];
        assert_eq!(shell_join(&args), "echo 'two words'");
    }

    #[test]
    fn traced_command_is_a_shell_invocation() {
        let cmd = traced_shell_command(&["curl".to_string(), "https://example.com".to_string()]);
        assert_eq!(cmd.len(), 3);
        assert_eq!(cmd[0], "sh");
        assert_eq!(cmd[1], "-c");
    }

    #[test]
    fn tracer_follows_forks_and_restricts_to_network_syscalls() {
        let cmd = traced_shell_command(&["true".to_string()]);
        let script = &cmd[2];
        assert!(script.starts_with("strace -f -ttt -e trace=network"));
        assert!(script.contains("-s 256"));
        assert!(script.contains("-o /output/egress.strace"));
        assert!(script.ends_with("&& sync"));
    }

    #[test]
    fn command_output_is_redirected_under_output() {
        let cmd = traced_shell_command(&["env".to_string()]);
        let script = &cmd[2];
        assert!(script.contains("/output/cmd_stdout"));
        assert!(script.contains("/output/cmd_stderr"));
    }

    #[test]
    fn hostile_arguments_stay_inside_the_inner_quoting() {
        let cmd = traced_shell_command(&["echo".to_string(), "; rm -rf /".to_string()]);
        let script = &cmd[2];
        // The hostile argument must appear only in quoted form.
        assert!(!script.contains(" ; rm"));
        assert!(script.contains(r"'; rm -rf /'"));
    }
}
