//! Data models for layout test runs
//!
//! This module contains all data structures shared between the shard builder,
//! the worker pool, the result summary and the report builder.

mod expectation;
mod outcome;
mod test_unit;

pub use expectation::{BuildType, Expectation, ExpectedResult, Modifier, Platform, Timeline};
pub use outcome::{FailureArtifact, Outcome, OutcomeKind};
pub use test_unit::{Shard, TestUnit};
