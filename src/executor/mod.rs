//! Test execution engine
//!
//! Shards a pass, runs it on a pool of workers, and coordinates the first
//! pass, the retry pass and classification.

mod command;
mod error;
mod parallel;
mod runner;
mod shard;
mod worker;

use futures::future::BoxFuture;

use crate::models::{FailureArtifact, OutcomeKind, TestUnit};

pub use command::CommandExecutor;
pub use runner::{PreparedRun, RunOptions, RunReport, TestRunner};

use error::ExecutorError;

/// What the execution collaborator reports for one test
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutput {
    pub kind: OutcomeKind,
    pub artifacts: Vec<FailureArtifact>,
}

impl RunOutput {
    pub fn new(kind: OutcomeKind) -> Self {
        Self {
            kind,
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: FailureArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

/// Runs a single test. Implementations enforce the test's timeout and
/// return `Err` only when the harness itself fails.
pub trait TestExecutor: Send + Sync {
    fn run<'a>(&'a self, test: &'a TestUnit) -> BoxFuture<'a, Result<RunOutput, ExecutorError>>;
}
