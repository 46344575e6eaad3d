//! Trace parsing for the egresswatch pipeline.
//!
//! Converts the raw, line-oriented diagnostic output of the syscall tracer
//! into an ordered sequence of typed connection events, and owns the
//! newline-delimited structured event artifact that downstream tooling
//! consumes.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod records;
pub mod strace;

pub use strace::{TraceReader, parse_line};
