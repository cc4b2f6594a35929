use std::io;
use thiserror::Error;

use crate::results::ResultsError;

/// The harness itself failed to run a test. Never a test failure.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("no test command configured")]
    NoCommand,

    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error while running {test}: {source}")]
    Io {
        test: String,
        #[source]
        source: io::Error,
    },
}

/// Fatal conditions that abort a run without a report
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{worker} failed: {message}")]
    WorkerFailed { worker: String, message: String },

    #[error("run interrupted")]
    Interrupted,

    #[error("{count} test(s) never reported an outcome (first: {first})")]
    MissingOutcomes { count: usize, first: String },

    #[error(transparent)]
    Results(#[from] ResultsError),
}

impl RunError {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, RunError::Interrupted)
    }
}
