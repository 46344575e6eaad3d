//! Summary statistics derived from an event sequence.
//!
//! Recomputable from the event list at any time; there is no independent
//! mutation path.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use egresswatch_common::event::{ConnectionEvent, Protocol};

/// Maximum number of ranked destinations retained in a summary.
pub const TOP_DESTINATIONS_LIMIT: usize = 50;

/// One ranked destination in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopDestination {
    /// Destination IPv4 address.
    pub dst_ip: String,
    /// Destination port.
    pub dst_port: u16,
    /// Most frequent protocol among events for this pair; ties resolve to
    /// the protocol encountered first.
    pub proto: Protocol,
    /// Number of events observed for this pair.
    pub count: usize,
    /// Domain carried by any event for this pair, if one was enriched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Derived statistics over one event sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of events in the sequence.
    pub total_events: usize,
    /// Distinct destination IPs.
    pub unique_destination_ips: usize,
    /// Distinct destination ports.
    pub unique_destination_ports: usize,
    /// Distinct (ip, port) pairs.
    pub unique_destination_pairs: usize,
    /// Events whose result was not `ok`.
    pub failures: usize,
    /// `failures / total_events`, 0.0 for the empty sequence.
    pub failure_rate: f64,
    /// Ranked destinations, count-descending, first-seen tie-break,
    /// truncated to [`TOP_DESTINATIONS_LIMIT`].
    pub top_destinations: Vec<TopDestination>,
}

#[derive(Default)]
struct DestinationStats {
    count: usize,
    tcp: usize,
    udp: usize,
    first_proto: Option<Protocol>,
    domain: Option<String>,
}

impl DestinationStats {
    fn record(&mut self, event: &ConnectionEvent) {
        self.count += 1;
        match event.proto {
            Protocol::Tcp => self.tcp += 1,
            Protocol::Udp => self.udp += 1,
        }
        if self.first_proto.is_none() {
            self.first_proto = Some(event.proto);
        }
        if self.domain.is_none() {
            self.domain.clone_from(&event.resolved_domain);
        }
    }

    fn dominant_proto(&self) -> Protocol {
        if self.tcp > self.udp {
            Protocol::Tcp
        } else if self.udp > self.tcp {
            Protocol::Udp
        } else {
            self.first_proto.unwrap_or(Protocol::Tcp)
        }
    }
}

/// Computes the summary for one event sequence in a single pass.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn compute_summary(events: &[ConnectionEvent]) -> Summary {
    let mut ips = HashSet::new();
    let mut ports = HashSet::new();
    let mut failures = 0usize;
    let mut stats: HashMap<(String, u16), DestinationStats> = HashMap::new();
    // First-seen order of pairs, for the deterministic tie-break.
    let mut order: Vec<(String, u16)> = Vec::new();

    for event in events {
        let _ = ips.insert(event.dst_ip.clone());
        let _ = ports.insert(event.dst_port);
        if event.is_failure() {
            failures += 1;
        }
        let key = (event.dst_ip.clone(), event.dst_port);
        let entry = stats.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            DestinationStats::default()
        });
        entry.record(event);
    }

    let mut top: Vec<TopDestination> = order
        .iter()
        .map(|key| {
            let stat = &stats[key];
            TopDestination {
                dst_ip: key.0.clone(),
                dst_port: key.1,
                proto: stat.dominant_proto(),
                count: stat.count,
                domain: stat.domain.clone(),
            }
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts.
    top.sort_by(|a, b| b.count.cmp(&a.count));
    top.truncate(TOP_DESTINATIONS_LIMIT);

    let total = events.len();
    Summary {
        total_events: total,
        unique_destination_ips: ips.len(),
        unique_destination_ports: ports.len(),
        unique_destination_pairs: stats.len(),
        failures,
        failure_rate: if total == 0 {
            0.0
        } else {
            failures as f64 / total as f64
        },
        top_destinations: top,
    }
}

#[cfg(test)]
mod tests {
    use egresswatch_common::event::{
        AddressFamily, ConnectResult, EventKind,
    };

    use super::*;

    fn event(ip: &str, port: u16, proto: Protocol, result: ConnectResult) -> ConnectionEvent {
        ConnectionEvent {
            ts: 0.0,
            pid: 1,
            event: EventKind::Connect,
            family: AddressFamily::Inet,
            proto,
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

    fn ok(ip: &str, port: u16) -> ConnectionEvent {
        event(ip, port, Protocol::Tcp, ConnectResult::Ok)
    }

    #[test]
    fn empty_sequence_has_zero_rate() {
        let summary = compute_summary(&[]);
        assert_eq!(summary.total_events, 0);
        assert_eq!(summary.failures, 0);
        assert!(summary.failure_rate.abs() < f64::EPSILON);
        assert!(summary.top_destinations.is_empty());
    }

    #[test]
    fn failures_count_non_ok_results() {
        let events = vec![
            ok("1.1.1.1", 443),
            event("1.1.1.1", 443, Protocol::Tcp, ConnectResult::Error),
            event("2.2.2.2", 80, Protocol::Tcp, ConnectResult::Error),
        ];
        let summary = compute_summary(&events);
        assert_eq!(
            summary.failures,
            events.iter().filter(|e| e.is_failure()).count()
        );
        assert!((summary.failure_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn unique_counts_cover_ips_ports_and_pairs() {
        let events = vec![
            ok("1.1.1.1", 443),
            ok("1.1.1.1", 80),
            ok("2.2.2.2", 443),
            ok("1.1.1.1", 443),
        ];
        let summary = compute_summary(&events);
        assert_eq!(summary.unique_destination_ips, 2);
        assert_eq!(summary.unique_destination_ports, 2);
        assert_eq!(summary.unique_destination_pairs, 3);
    }

    #[test]
    fn top_destinations_ranked_by_count_then_first_seen() {
        let mut events = vec![ok("9.9.9.9", 53)];
        events.extend(std::iter::repeat_with(|| ok("1.1.1.1", 443)).take(3));
        events.push(ok("2.2.2.2", 80));
        let summary = compute_summary(&events);
        let pairs: Vec<_> = summary
            .top_destinations
            .iter()
            .map(|d| (d.dst_ip.as_str(), d.count))
            .collect();
        // 1.1.1.1 dominates; the singletons keep first-seen order.
        assert_eq!(
            pairs,
            vec![("1.1.1.1", 3), ("9.9.9.9", 1), ("2.2.2.2", 1)]
        );
    }

    #[test]
    fn top_destinations_truncated_to_limit() {
        let events: Vec<_> = (0..60u16)
            .map(|i| ok(&format!("10.0.0.{}", i % 250), 1000 + i))
            .collect();
        let summary = compute_summary(&events);
        assert_eq!(summary.top_destinations.len(), TOP_DESTINATIONS_LIMIT);
        // Strictly non-increasing counts.
        for pair in summary.top_destinations.windows(2) {
            assert!(pair[0].count >= pair[1].count);
        }
    }

    #[test]
    fn dominant_protocol_is_most_frequent() {
        let events = vec![
            event("8.8.8.8", 53, Protocol::Udp, ConnectResult::Ok),
            event("8.8.8.8", 53, Protocol::Udp, ConnectResult::Ok),
            event("8.8.8.8", 53, Protocol::Tcp, ConnectResult::Ok),
        ];
        let summary = compute_summary(&events);
        assert_eq!(summary.top_destinations[0].proto, Protocol::Udp);
    }

    #[test]
    fn dominant_protocol_tie_resolves_to_first_seen() {
        let events = vec![
            event("8.8.8.8", 53, Protocol::Udp, ConnectResult::Ok),
            event("8.8.8.8", 53, Protocol::Tcp, ConnectResult::Ok),
        ];
        let summary = compute_summary(&events);
        assert_eq!(summary.top_destinations[0].proto, Protocol::Udp);
    }

    #[test]
    fn domain_passes_through_from_any_event_of_the_pair() {
        let mut enriched = ok("151.101.1.69", 443);
        enriched.resolved_domain = Some("fastly.example".into());
        let events = vec![ok("151.101.1.69", 443), enriched];
        let summary = compute_summary(&events);
        assert_eq!(
            summary.top_destinations[0].domain.as_deref(),
            Some("fastly.example")
        );
    }
}
