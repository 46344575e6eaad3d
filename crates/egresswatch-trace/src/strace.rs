//! Line matching for `strace -f -ttt -e trace=network` output.
//!
//! A line is a candidate only if it contains both a `connect(` marker and
//! an `AF_INET` family marker; candidates are matched against a single
//! compiled pattern extracting pid, timestamp, destination port and
//! address, numeric return code, and an optional trailing symbolic errno.
//! Everything else is skipped silently. The regex is an implementation
//! detail kept behind [`parse_line`] and [`TraceReader`] so it can be
//! replaced by a tokenizer without breaking consumers.

use std::io::{BufRead, BufReader, Read};
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use egresswatch_common::error::{EgressWatchError, Result};
use egresswatch_common::event::{
    AddressFamily, ConnectResult, ConnectionEvent, EventKind, Protocol,
};

/// Upper bound on a single trace line. Lines beyond this are split and the
/// fragments fail structural matching, which is the skip path anyway.
const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Errno token of a non-blocking connect that is still underway. The
/// kernel has accepted the attempt, so it counts as `ok`.
const IN_PROGRESS_ERRNO: &str = "EINPROGRESS";

#[allow(clippy::expect_used)]
fn connect_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(\d+)\s+([\d.]+)\s+connect\([^,]+,\s*\{[^}]*sa_family=AF_INET[^}]*sin_port=htons\((\d+)\)[^}]*sin_addr=inet_addr\("([^"]+)"\)[^}]*\}[^)]*\)\s*=\s*(-?\d+)(?:\s+(\w+))?"#,
        )
        .expect("connect pattern is valid")
    })
}

/// Parses a single trace line into a connection event.
///
/// Returns `None` for every line that is not a fully matching IPv4
/// `connect` record: other syscalls, IPv6 attempts, unfinished/resumed
/// fragments, truncated lines, and records whose address or port do not
/// parse. Skipping is silent; no line can make this fail.
#[must_use]
pub fn parse_line(line: &str) -> Option<ConnectionEvent> {
    // Cheap rejects before the full structural match.
    if !line.contains("connect(") || !line.contains("AF_INET") {
        return None;
    }
    if line.contains("AF_INET6") {
        // Deliberately out of scope, not a parse failure.
        return None;
    }

    let caps = connect_pattern().captures(line)?;

    let pid: u32 = caps.get(1)?.as_str().parse().ok()?;
    let ts: f64 = caps.get(2)?.as_str().parse().ok()?;
    // A port outside u16 range fails the parse and drops the line.
    let dst_port: u16 = caps.get(3)?.as_str().parse().ok()?;
    let dst_ip = caps.get(4)?.as_str();
    if dst_ip.parse::<Ipv4Addr>().is_err() {
        return None;
    }
    let code: i64 = caps.get(5)?.as_str().parse().ok()?;
    let errno = caps.get(6).map(|m| m.as_str().to_string());

    let (result, errno) = match (code, errno) {
        (0, _) => (ConnectResult::Ok, None),
        (_, Some(name)) if name == IN_PROGRESS_ERRNO => (ConnectResult::Ok, None),
        (_, errno) => (ConnectResult::Error, errno),
    };

    // Socket type context only appears when the tracer decorates fds
    // (`-yy`) or dumps the socket struct; default to tcp when absent.
    let proto = if line.contains("SOCK_DGRAM") || line.contains("<UDP:") {
        Protocol::Udp
    } else {
        Protocol::Tcp
    };

    Some(ConnectionEvent {
        ts,
        pid,
        event: EventKind::Connect,
        family: AddressFamily::Inet,
        proto,
        dst_ip: dst_ip.to_string(),
        dst_port,
        result,
        errno,
        resolved_domain: None,
        cmd: None,
        container_image: None,
        run_id: None,
    })
}

/// Lazy, ordered reader over a raw trace artifact.
///
/// Yields events in input line order with no reordering or buffering
/// beyond the current line. Re-reading the file is a matter of calling
/// [`TraceReader::open`] again. Bytes that are not valid UTF-8 are decoded
/// permissively; a truncated final line ends the stream without error.
pub struct TraceReader {
    reader: BufReader<std::fs::File>,
}

impl TraceReader {
    /// Opens a trace artifact for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "opening trace artifact");
        let file = std::fs::File::open(path).map_err(|e| EgressWatchError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }

    /// Reads the next raw line, decoded permissively.
    ///
    /// Returns `None` at end of input or on a read error: a trace cut off
    /// mid-record is treated as end-of-stream, never as a failure.
    fn next_line(&mut self) -> Option<String> {
        let mut buf = Vec::new();
        let mut limited = (&mut self.reader).take(MAX_LINE_BYTES);
        match limited.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(String::from_utf8_lossy(&buf).into_owned()),
        }
    }
}

impl Iterator for TraceReader {
    type Item = ConnectionEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.next_line()?;
            if let Some(event) = parse_line(&line) {
                return Some(event);
            }
        }
    }
}
