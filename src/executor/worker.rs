//! Execution worker
//!
//! Pulls shards from the shared queue, runs each test through the executor,
//! and publishes outcomes. Workers never touch the result summary.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::RunError;
use super::TestExecutor;
use crate::models::{Outcome, Shard};
use crate::results::{ShardTiming, TestTiming, WorkerStats};

/// Shared FIFO of shards; closed once it has been filled
pub type WorkQueue = Arc<Mutex<mpsc::UnboundedReceiver<Shard>>>;

pub struct Worker {
    pub id: usize,
    pub queue: WorkQueue,
    pub outcomes: mpsc::UnboundedSender<Outcome>,
    pub executor: Arc<dyn TestExecutor>,
    pub cancel: CancellationToken,
}

impl Worker {
    pub fn name(&self) -> String {
        format!("worker-{}", self.id)
    }

    async fn next_shard(&self) -> Option<Shard> {
        self.queue.lock().await.recv().await
    }

    /// Drain the queue. An executor error ends the worker with `WorkerFailed`.
    pub async fn run(self) -> Result<WorkerStats, RunError> {
        let name = self.name();
        let mut stats = WorkerStats::new(&name);
        let started = Instant::now();

        'shards: loop {
            let shard = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                shard = self.next_shard() => match shard {
                    Some(shard) => shard,
                    None => break,
                },
            };

            debug!(worker = %name, shard = %shard, "starting shard");
            let shard_started = Instant::now();

            for test in &shard.tests {
                let test_started = Instant::now();
                let output = tokio::select! {
                    biased;
                    // The in-flight test is abandoned and its result discarded.
                    _ = self.cancel.cancelled() => break 'shards,
                    result = self.executor.run(test) => result.map_err(|err| RunError::WorkerFailed {
                        worker: name.clone(),
                        message: format!("{}: {err}", test.path),
                    })?,
                };
                let duration = test_started.elapsed();

                stats.num_tests += 1;
                stats.tests.push(TestTiming {
                    test: test.path.clone(),
                    duration,
                    worker: self.id,
                    slow: test.is_slow(),
                });

                let outcome = Outcome {
                    test: test.path.clone(),
                    kind: output.kind,
                    artifacts: output.artifacts,
                    duration,
                    worker: self.id,
                };
                if self.outcomes.send(outcome).is_err() {
                    // Nobody is draining any more; the pass has been abandoned.
                    break 'shards;
                }
            }

            stats.shards.push(ShardTiming {
                label: shard.label.clone(),
                num_tests: shard.len(),
                duration: shard_started.elapsed(),
            });
        }

        stats.total_time = started.elapsed();
        debug!(worker = %name, tests = stats.num_tests, "worker finished");
        Ok(stats)
    }
}
