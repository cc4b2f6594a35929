//! Parallel pass execution
//!
//! Runs one pass over a shard sequence with a fixed-size worker pool. The
//! draining loop here is the only place a pass summary is mutated.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::error::RunError;
use super::worker::Worker;
use super::TestExecutor;
use crate::expectations::TestExpectations;
use crate::models::{Outcome, Shard};
use crate::results::{ResultSummary, WorkerStats};

/// Outcome of one completed pass
#[derive(Debug)]
pub struct PassResult {
    pub summary: ResultSummary,
    pub workers: Vec<WorkerStats>,
    pub elapsed: Duration,
}

/// Worker pool for a single pass
pub struct ParallelExecutor {
    num_workers: usize,
    executor: Arc<dyn TestExecutor>,
    cancel: CancellationToken,
    progress_interval: Duration,
    log_unexpected: bool,
}

impl ParallelExecutor {
    pub fn new(num_workers: usize, executor: Arc<dyn TestExecutor>, cancel: CancellationToken) -> Self {
        Self {
            num_workers: num_workers.max(1),
            executor,
            cancel,
            progress_interval: Duration::from_millis(100),
            log_unexpected: false,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_log_unexpected(mut self, enabled: bool) -> Self {
        self.log_unexpected = enabled;
        self
    }

    /// Run `shards` to completion, recording every outcome into `summary`.
    ///
    /// Fails if a worker fails or panics, if the run is cancelled, or if any
    /// test in the summary never reports.
    pub async fn run_pass(
        &self,
        name: &str,
        shards: Vec<Shard>,
        mut summary: ResultSummary,
        expectations: &TestExpectations,
    ) -> Result<PassResult, RunError> {
        let started = Instant::now();
        let num_workers = self.num_workers.min(shards.len());
        info!(
            "Starting {} pass: {} tests in {} shards on {} workers",
            name,
            summary.remaining(),
            shards.len(),
            num_workers
        );

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for shard in shards {
            // The receiver is alive until the workers are done.
            let _ = queue_tx.send(shard);
        }
        drop(queue_tx);
        let queue = Arc::new(Mutex::new(queue_rx));

        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Outcome>();
        let worker_cancel = self.cancel.child_token();
        let mut workers = JoinSet::new();
        for id in 0..num_workers {
            let worker = Worker {
                id,
                queue: queue.clone(),
                outcomes: outcome_tx.clone(),
                executor: self.executor.clone(),
                cancel: worker_cancel.clone(),
            };
            workers.spawn(worker.run());
        }
        drop(outcome_tx);

        let mut ticker = tokio::time::interval(self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = Vec::with_capacity(num_workers);
        let mut outcomes_open = true;
        let mut last_progress = None;

        while outcomes_open || !workers.is_empty() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Interrupted; waiting for workers to stop");
                    worker_cancel.cancel();
                    while workers.join_next().await.is_some() {}
                    return Err(RunError::Interrupted);
                }
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    match flatten_join(joined) {
                        Ok(worker_stats) => {
                            debug!("{} finished {} tests", worker_stats.name, worker_stats.num_tests);
                            stats.push(worker_stats);
                        }
                        Err(err) => {
                            error!("Aborting {} pass: {}", name, err);
                            abort(&mut workers, &worker_cancel).await;
                            return Err(err);
                        }
                    }
                }
                outcome = outcome_rx.recv(), if outcomes_open => match outcome {
                    Some(outcome) => {
                        if let Err(err) = self.record(&mut summary, expectations, outcome) {
                            abort(&mut workers, &worker_cancel).await;
                            return Err(err);
                        }
                    }
                    None => outcomes_open = false,
                },
                _ = ticker.tick() => {
                    let progress = (summary.expected(), summary.unexpected(), summary.remaining());
                    if last_progress != Some(progress) {
                        info!(
                            "Testing: {} ran as expected, {} didn't, {} left",
                            progress.0, progress.1, progress.2
                        );
                        last_progress = Some(progress);
                    }
                }
            }
        }

        if !summary.is_complete() {
            let missing = summary.missing();
            return Err(RunError::MissingOutcomes {
                count: missing.len(),
                first: missing.into_iter().next().unwrap_or_default(),
            });
        }

        let elapsed = started.elapsed();
        info!("Finished {} pass in {:.1}s", name, elapsed.as_secs_f64());
        stats.sort_by_key(|s| s.name.clone());
        Ok(PassResult {
            summary,
            workers: stats,
            elapsed,
        })
    }

    fn record(
        &self,
        summary: &mut ResultSummary,
        expectations: &TestExpectations,
        outcome: Outcome,
    ) -> Result<(), RunError> {
        let expected = expectations.matches(&outcome.test, outcome.kind);
        if !expected {
            if self.log_unexpected {
                info!(
                    "Unexpected result: {} (expected {})",
                    outcome,
                    expectations.expectations_string(&outcome.test)
                );
            } else {
                debug!("Unexpected result: {}", outcome);
            }
        }
        summary.add(&outcome.test, outcome.artifacts, outcome.kind, expected)?;
        Ok(())
    }
}

fn flatten_join(joined: Result<Result<WorkerStats, RunError>, JoinError>) -> Result<WorkerStats, RunError> {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(RunError::WorkerFailed {
            worker: "a worker".to_string(),
            message: "panicked".to_string(),
        }),
        Err(err) => Err(RunError::WorkerFailed {
            worker: "a worker".to_string(),
            message: err.to_string(),
        }),
    }
}

async fn abort(workers: &mut JoinSet<Result<WorkerStats, RunError>>, cancel: &CancellationToken) {
    cancel.cancel();
    workers.shutdown().await;
}
