//! Result aggregation, classification, timing and persistence

mod report;
mod storage;
mod summary;
mod timing;

pub use report::{Classification, UnexpectedResults, UnexpectedTest};
pub use storage::{ResultsDirectory, RunInfo, StoredRun};
pub use summary::{ResultSummary, ResultsError};
pub use timing::{ShardTiming, TestTiming, TimingReport, WorkerStats};
