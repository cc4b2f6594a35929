//! Run coordinator
//!
//! Prepares the run list, runs the first pass, retries unexpected failures
//! exactly once, and classifies the results.

use anyhow::Result;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::RunError;
use super::parallel::ParallelExecutor;
use super::shard::{build_shards, ShardOptions};
use super::TestExecutor;
use crate::config::RunnerConfig;
use crate::discovery::{read_fingerprint, ChunkSelection, ChunkSpec};
use crate::expectations::TestExpectations;
use crate::models::{Modifier, OutcomeKind, TestUnit};
use crate::results::{ResultSummary, TimingReport, UnexpectedResults, WorkerStats};

/// Options that shape the run list
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Run tests marked SKIP
    pub force: bool,
    pub randomize_order: bool,
    pub chunk: Option<ChunkSpec>,
    /// Log each unexpected result as it arrives
    pub log_unexpected: bool,
}

/// The run list and the skipped tests recorded alongside it
#[derive(Clone, Debug)]
pub struct PreparedRun {
    pub tests: Vec<TestUnit>,
    /// Recorded as SKIP without running
    pub skipped: Vec<String>,
    /// Number of tests discovered
    pub found: usize,
    pub chunk: Option<ChunkSelection>,
}

impl PreparedRun {
    pub fn test_paths(&self) -> Vec<String> {
        self.tests.iter().map(|t| t.path.clone()).collect()
    }

    /// Every test the first-pass summary accounts for
    pub fn summary_scope(&self) -> impl Iterator<Item = String> + '_ {
        self.tests
            .iter()
            .map(|t| t.path.clone())
            .chain(self.skipped.iter().cloned())
    }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunReport {
    pub first: ResultSummary,
    pub retry: Option<ResultSummary>,
    pub unexpected: UnexpectedResults,
    pub timing: TimingReport,
    pub retry_workers: Vec<WorkerStats>,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunState {
    Idle,
    Sharding,
    Executing,
    RetryDeciding,
    RetryExecuting,
    Finalizing,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn enter(state: &mut RunState, next: RunState) {
    debug!("Run state {} -> {}", state, next);
    *state = next;
}

/// Coordinates a full run
pub struct TestRunner {
    config: RunnerConfig,
    expectations: Arc<TestExpectations>,
    executor: Arc<dyn TestExecutor>,
    cancel: CancellationToken,
    options: RunOptions,
}

impl TestRunner {
    pub fn new(
        config: RunnerConfig,
        expectations: Arc<TestExpectations>,
        executor: Arc<dyn TestExecutor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            expectations,
            executor,
            cancel,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn expectations(&self) -> &TestExpectations {
        &self.expectations
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Turn the discovered tests into the run list.
    ///
    /// Tests marked SKIP are dropped unless forced or alone, and kept as
    /// stubs so the statistics still count them.
    pub fn prepare(&self, test_files: Vec<String>) -> Result<PreparedRun> {
        let found = test_files.len();
        let mut files: BTreeSet<String> = test_files.into_iter().collect();

        let skipped = if files.len() == 1 || self.options.force {
            BTreeSet::new()
        } else {
            self.expectations.tests_with_modifier(&files, Modifier::Skip)
        };
        files.retain(|f| !skipped.contains(f));

        let mut list: Vec<String> = files.into_iter().collect();
        if self.options.randomize_order {
            list.shuffle(&mut rand::rng());
        }

        let (list, skipped, chunk) = match &self.options.chunk {
            Some(spec) => {
                let selection = spec.select(&list)?;
                info!("{}", selection);
                // Keep the same share of skipped tests as of runnable ones.
                let num_stubs = if list.is_empty() {
                    0
                } else {
                    selection.tests.len() * skipped.len() / list.len()
                };
                let stubs = skipped.into_iter().take(num_stubs).collect();
                (selection.tests.clone(), stubs, Some(selection))
            }
            None => (list, skipped.into_iter().collect(), None),
        };

        let tests = list
            .iter()
            .map(|path| self.test_unit(path))
            .collect::<Result<Vec<_>>>()?;

        Ok(PreparedRun {
            tests,
            skipped,
            found,
            chunk,
        })
    }

    fn test_unit(&self, path: &str) -> Result<TestUnit> {
        let expectation = self.expectations.expected(path);
        let timeout = if expectation.has_modifier(Modifier::Slow) {
            self.config.slow_test_timeout()
        } else {
            self.config.test_timeout()
        };

        let unit = TestUnit::new(path, timeout).with_modifiers(expectation.modifiers.iter().copied());
        Ok(match read_fingerprint(&self.config.suite_root, path)? {
            Some(fingerprint) => unit.with_fingerprint(fingerprint),
            None => unit,
        })
    }

    /// Run the first pass, the retry pass when needed, and classify.
    pub async fn run(&self, prepared: &PreparedRun) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let mut state = RunState::Idle;
        let shard_options = ShardOptions::from_config(&self.config);
        let pool = ParallelExecutor::new(self.config.workers(), self.executor.clone(), self.cancel.clone())
            .with_progress_interval(self.config.progress_interval())
            .with_log_unexpected(self.options.log_unexpected);

        enter(&mut state, RunState::Sharding);
        let mut first = ResultSummary::new(&self.expectations, prepared.summary_scope());
        for test in &prepared.skipped {
            let expected = self.expectations.matches(test, OutcomeKind::Skip);
            first.add(test, Vec::new(), OutcomeKind::Skip, expected)?;
        }
        let shards = build_shards(prepared.tests.clone(), &shard_options);

        enter(&mut state, RunState::Executing);
        let first_pass = pool
            .run_pass("first", shards, first, &self.expectations)
            .await?;

        enter(&mut state, RunState::RetryDeciding);
        let candidates = first_pass.summary.get_failures(false);
        let retry_pass = if candidates.is_empty() {
            None
        } else {
            enter(&mut state, RunState::RetryExecuting);
            info!("Retrying {} unexpected failure(s)", candidates.len());

            let mut units: Vec<TestUnit> = prepared
                .tests
                .iter()
                .filter(|t| candidates.contains_key(&t.path))
                .cloned()
                .collect();
            units.sort_by(|a, b| a.path.cmp(&b.path));

            let summary = ResultSummary::new(&self.expectations, candidates.into_keys());
            let shards = build_shards(units, &shard_options);
            Some(
                pool.run_pass("retry", shards, summary, &self.expectations)
                    .await?,
            )
        };

        enter(&mut state, RunState::Finalizing);
        let unexpected = UnexpectedResults::summarize(
            &first_pass.summary,
            retry_pass.as_ref().map(|pass| &pass.summary),
            &self.expectations,
        )?;
        let timing = TimingReport::build(
            first_pass.elapsed,
            &first_pass.workers,
            &first_pass.summary,
            self.config.num_slow_tests_to_log,
        );

        enter(&mut state, RunState::Done);
        let (retry, retry_workers) = match retry_pass {
            Some(pass) => (Some(pass.summary), pass.workers),
            None => (None, Vec::new()),
        };
        Ok(RunReport {
            first: first_pass.summary,
            retry,
            unexpected,
            timing,
            retry_workers,
            elapsed: started.elapsed(),
        })
    }
}
