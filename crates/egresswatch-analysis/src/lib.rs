//! Aggregation and flagging for the egresswatch pipeline.
//!
//! A pure function of the event sequence plus thresholds: deterministic,
//! side-effect-free, and safe to call repeatedly — for example to
//! recompute flags against a stored event list without re-running the
//! sandbox.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod flags;
pub mod summary;

pub use flags::{Flag, FlagThresholds, Severity, evaluate_flags};
pub use summary::{Summary, TopDestination, compute_summary};

use egresswatch_common::event::ConnectionEvent;

/// Computes summary statistics and heuristic risk flags in one call.
///
/// Total over any event list, including the empty one.
#[must_use]
pub fn aggregate(
    events: &[ConnectionEvent],
    thresholds: &FlagThresholds,
) -> (Summary, Vec<Flag>) {
    let summary = compute_summary(events);
    let flags = evaluate_flags(events, &summary, thresholds);
    (summary, flags)
}
