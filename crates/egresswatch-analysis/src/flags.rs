//! Heuristic risk flags derived from summary statistics.
//!
//! Every flag is evaluated independently against caller-supplied
//! thresholds; all applicable flags are returned. Thresholds are
//! parameters, not constants baked into the algorithm, so a policy layer
//! or test suite can vary them without touching aggregation logic.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use egresswatch_common::event::ConnectionEvent;

use crate::summary::Summary;

/// Severity of a heuristic flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Low,
    /// Worth an analyst's attention.
    Medium,
    /// Strong indicator.
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One heuristic risk indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// Stable flag name.
    pub name: String,
    /// Human-readable explanation with the observed value and threshold.
    pub description: String,
    /// Severity of the indicator.
    pub severity: Severity,
}

/// Thresholds the flag heuristics are evaluated against.
///
/// Lowering any threshold (or shrinking the port allow-set) can only add
/// flags for a fixed event list, never remove them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagThresholds {
    /// Unique (ip, port) pairs above which a run is flagged.
    pub unique_destination_limit: usize,
    /// Failure rate above which a run is flagged.
    pub failure_rate_limit: f64,
    /// Ports considered ordinary; any destination port outside this set
    /// raises the unusual-ports flag.
    pub usual_ports: BTreeSet<u16>,
}

impl Default for FlagThresholds {
    fn default() -> Self {
        Self {
            unique_destination_limit: 50,
            failure_rate_limit: 0.10,
            usual_ports: BTreeSet::from([80, 443, 53, 22]),
        }
    }
}

/// Evaluates all flag heuristics against one event sequence.
#[must_use]
pub fn evaluate_flags(
    events: &[ConnectionEvent],
    summary: &Summary,
    thresholds: &FlagThresholds,
) -> Vec<Flag> {
    let mut flags = Vec::new();

    if summary.unique_destination_pairs > thresholds.unique_destination_limit {
        flags.push(Flag {
            name: "High unique destinations".into(),
            description: format!(
                "Found {} unique destination IP:port pairs (threshold: {})",
                summary.unique_destination_pairs, thresholds.unique_destination_limit
            ),
            severity: Severity::Medium,
        });
    }

    if summary.failure_rate > thresholds.failure_rate_limit {
        flags.push(Flag {
            name: "Elevated failure rate".into(),
            description: format!(
                "Failure rate is {:.1}% (threshold: {:.1}%)",
                summary.failure_rate * 100.0,
                thresholds.failure_rate_limit * 100.0
            ),
            severity: Severity::Medium,
        });
    }

    let unusual: BTreeSet<u16> = events
        .iter()
        .map(|e| e.dst_port)
        .filter(|port| !thresholds.usual_ports.contains(port))
        .collect();
    if !unusual.is_empty() {
        let ports: Vec<String> = unusual.iter().map(ToString::to_string).collect();
        flags.push(Flag {
            name: "Unusual ports".into(),
            description: format!(
                "Found connections to unusual ports: [{}]",
                ports.join(", ")
            ),
            severity: Severity::Medium,
        });
    }

    tracing::debug!(count = flags.len(), "flag evaluation complete");
    flags
}

#[cfg(test)]
mod tests {
    use egresswatch_common::event::{
        AddressFamily, ConnectResult, ConnectionEvent, EventKind, Protocol,
    };

    use crate::aggregate;

    use super::*;

    fn event(ip: &str, port: u16, result: ConnectResult) -> ConnectionEvent {
        ConnectionEvent {
            ts: 0.0,
            pid: 1,
            event: EventKind::Connect,
            family: AddressFamily::Inet,
            proto: Protocol::Tcp,
            dst_ip: ip.into(),
            dst_port: port,
            result,
            errno: None,
            resolved_domain: None,
            cmd: None,
            container_image: None,
            run_id: None,
        }
    }

    /// 51 distinct pairs on an ordinary port, no failures.
    fn fifty_one_pairs() -> Vec<ConnectionEvent> {
        (0..51u16)
            .map(|i| event(&format!("10.0.{}.{}", i / 250, i % 250), 443, ConnectResult::Ok))
            .collect()
    }

    #[test]
    fn fifty_one_pairs_raises_only_high_unique_destinations() {
        let (_, flags) = aggregate(&fifty_one_pairs(), &FlagThresholds::default());
        let names: Vec<_> = flags.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["High unique destinations"]);
        assert_eq!(flags[0].severity, Severity::Medium);
    }

    #[test]
    fn six_failures_out_of_fifty_one_adds_elevated_failure_rate() {
        let mut events = fifty_one_pairs();
        for e in events.iter_mut().take(6) {
            e.result = ConnectResult::Error;
        }
        let (summary, flags) = aggregate(&events, &FlagThresholds::default());
        assert!((summary.failure_rate - 6.0 / 51.0).abs() < 1e-9);
        let names: Vec<_> = flags.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"High unique destinations"));
        assert!(names.contains(&"Elevated failure rate"));
    }

    #[test]
    fn unusual_port_raises_flag_with_port_list() {
        let events = vec![
            event("1.1.1.1", 443, ConnectResult::Ok),
            event("1.1.1.1", 4444, ConnectResult::Ok),
            event("2.2.2.2", 31337, ConnectResult::Ok),
        ];
        let (summary, flags) = aggregate(&events, &FlagThresholds::default());
        assert_eq!(summary.total_events, 3);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].name, "Unusual ports");
        assert!(flags[0].description.contains("4444"));
        assert!(flags[0].description.contains("31337"));
        assert!(!flags[0].description.contains("443,"));
    }

    #[test]
    fn quiet_run_raises_no_flags() {
        let events = vec![
            event("1.1.1.1", 443, ConnectResult::Ok),
            event("8.8.8.8", 53, ConnectResult::Ok),
        ];
        let (_, flags) = aggregate(&events, &FlagThresholds::default());
        assert!(flags.is_empty());
    }

    #[test]
    fn empty_event_list_is_total_and_unflagged() {
        let (summary, flags) = aggregate(&[], &FlagThresholds::default());
        assert_eq!(summary.total_events, 0);
        assert!(flags.is_empty());
    }

    #[test]
    fn lowering_thresholds_only_adds_flags() {
        let events = vec![
            event("1.1.1.1", 443, ConnectResult::Ok),
            event("2.2.2.2", 80, ConnectResult::Error),
            event("3.3.3.3", 53, ConnectResult::Ok),
        ];
        let loose = FlagThresholds::default();
        let strict = FlagThresholds {
            unique_destination_limit: 1,
            failure_rate_limit: 0.05,
            usual_ports: BTreeSet::from([443]),
        };
        let (_, loose_flags) = aggregate(&events, &loose);
        let (_, strict_flags) = aggregate(&events, &strict);
        for flag in &loose_flags {
            assert!(
                strict_flags.iter().any(|f| f.name == flag.name),
                "tightening thresholds dropped flag {}",
                flag.name
            );
        }
        assert!(strict_flags.len() >= loose_flags.len());
        assert_eq!(strict_flags.len(), 3);
    }

    #[test]
    fn repeated_evaluation_is_deterministic() {
        let events = fifty_one_pairs();
        let thresholds = FlagThresholds::default();
        let first = aggregate(&events, &thresholds);
        let second = aggregate(&events, &thresholds);
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }
}
