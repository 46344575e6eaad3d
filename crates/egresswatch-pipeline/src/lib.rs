//! Pipeline coordination for egresswatch.
//!
//! Sequences the three stages — sandboxed execution, trace parsing,
//! aggregation — and assembles the immutable run result handed to the
//! reporting collaborator. The coordinator always completes and always
//! produces a run result, even on total sandbox failure.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod coordinator;
pub mod result;

pub use coordinator::{Coordinator, PipelineStage};
pub use result::RunResult;
