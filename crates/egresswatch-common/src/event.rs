//! The structured connection event model.
//!
//! One [`ConnectionEvent`] is emitted per observed outbound connection
//! attempt. Field names are fixed by the persisted artifact contract: the
//! events file carries one JSON record per line, in event order, using
//! exactly these names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of syscall an event was derived from.
///
/// Only `connect` is produced today; the enumeration is open so future
/// syscalls (`sendto`, ...) can be added without breaking consumers.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// An outbound `connect(2)` attempt.
    Connect,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
        }
    }
}

/// Address family of an observed destination.
///
/// Only IPv4 is represented; IPv6 attempts are dropped at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// IPv4.
    Inet,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inet => write!(f, "inet"),
        }
    }
}

/// Transport protocol of an observed destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Stream socket.
    Tcp,
    /// Datagram socket.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Outcome of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectResult {
    /// The syscall returned success, or the in-progress code of a
    /// non-blocking connect.
    Ok,
    /// Every other return.
    Error,
}

impl fmt::Display for ConnectResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One observed outbound connection attempt.
///
/// Immutable once constructed. Timestamps are seconds since epoch as
/// reported by the tracer, monotonic within a single trace file but not
/// across concurrently traced processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    /// Seconds since epoch, fractional.
    pub ts: f64,
    /// OS process id of the tracing subject at the time of the call.
    pub pid: u32,
    /// Syscall kind this event was derived from.
    pub event: EventKind,
    /// Address family of the destination.
    pub family: AddressFamily,
    /// Transport protocol, `tcp` when the trace line is ambiguous.
    pub proto: Protocol,
    /// Destination IPv4 address as a dotted-quad literal.
    pub dst_ip: String,
    /// Destination port.
    pub dst_port: u16,
    /// Outcome of the attempt.
    pub result: ConnectResult,
    /// Symbolic errno name, present only when `result` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errno: Option<String>,
    /// Domain associated with the destination, populated by a resolver
    /// collaborator, never by the parser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_domain: Option<String>,
    /// Command line that produced the event, stamped by the coordinator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    /// Container image the command ran under, stamped by the coordinator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
    /// Run the event belongs to, stamped by the coordinator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl ConnectionEvent {
    /// Returns whether the attempt failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.result != ConnectResult::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionEvent {
        ConnectionEvent {
            ts: 1_707_150_823.512,
            pid: 12345,
            event: EventKind::Connect,
            family: AddressFamily::Inet,
            proto: Protocol::Tcp,
            dst_ip: "151.101.1.69".into(),
            dst_port: 443,
            result: ConnectResult::Ok,
            errno: None,
            resolved_domain: None,
            cmd: None,
            container_image: None,
            run_id: None,
        }
    }

    #[test]
    fn serializes_with_contract_field_names() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(json["event"], "connect");
        assert_eq!(json["family"], "inet");
        assert_eq!(json["proto"], "tcp");
        assert_eq!(json["result"], "ok");
        assert_eq!(json["dst_ip"], "151.101.1.69");
        assert_eq!(json["dst_port"], 443);
    }

    #[test]
    fn absent_optional_fields_are_omitted() {
        let json = serde_json::to_string(&sample()).expect("serialize");
        assert!(!json.contains("errno"));
        assert!(!json.contains("resolved_domain"));
        assert!(!json.contains("run_id"));
    }

    #[test]
    fn deserializes_records_without_optional_fields() {
        let raw = r#"{"ts":1.5,"pid":7,"event":"connect","family":"inet","proto":"udp","dst_ip":"8.8.8.8","dst_port":53,"result":"error","errno":"ECONNREFUSED"}"#;
        let event: ConnectionEvent = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(event.proto, Protocol::Udp);
        assert_eq!(event.errno.as_deref(), Some("ECONNREFUSED"));
        assert!(event.is_failure());
    }
}
