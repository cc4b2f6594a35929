//! Timing statistics
//!
//! Per-test and per-shard timing collected by workers, and the derived
//! report: percentiles, slowest tests, slow directories and worker balance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::models::OutcomeKind;
use crate::results::summary::ResultSummary;

/// Shards that took longer than this are listed in the report
pub const SLOW_SHARD_THRESHOLD: Duration = Duration::from_secs(10);

/// Timing of a single test
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestTiming {
    pub test: String,
    pub duration: Duration,
    pub worker: usize,
    /// Whether the test is marked SLOW
    pub slow: bool,
}

/// Timing of a whole shard
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShardTiming {
    pub label: String,
    pub num_tests: usize,
    pub duration: Duration,
}

/// What a single worker did during a pass
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkerStats {
    pub name: String,
    pub num_tests: usize,
    pub total_time: Duration,
    pub shards: Vec<ShardTiming>,
    pub tests: Vec<TestTiming>,
}

impl WorkerStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Distribution statistics, in milliseconds
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub count: usize,
    pub median: f64,
    pub mean: f64,
    pub p90: f64,
    pub p99: f64,
    pub std_dev: f64,
}

impl TimingStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        Self {
            count,
            median,
            mean,
            p90: percentile(&sorted, 90.0),
            p99: percentile(&sorted, 99.0),
            std_dev: variance.sqrt(),
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "median={:.1}ms mean={:.1}ms p90={:.1}ms p99={:.1}ms std={:.1}ms",
            self.median, self.mean, self.p90, self.p99, self.std_dev
        )
    }
}

/// Interpolated percentile of a sorted slice
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let fraction = idx - lower as f64;

    sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
}

/// Derived timing report for one pass
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingReport {
    pub total_time: Duration,
    pub num_workers: usize,
    /// Sum of all worker busy time
    pub cumulative_time: Duration,
    /// Cumulative time spread evenly over the workers
    pub optimal_time: Duration,
    pub workers: Vec<WorkerStats>,
    pub per_test: TimingStats,
    /// Slowest tests that are neither SLOW nor timed out or crashed
    pub slowest_tests: Vec<TestTiming>,
    /// Tests marked SLOW, slowest first
    pub slow_tests: Vec<TestTiming>,
    /// Tests that timed out or crashed, slowest first
    pub timeout_or_crash: Vec<TestTiming>,
    /// Shards over the slow threshold, slowest first
    pub slow_shards: Vec<ShardTiming>,
}

impl TimingReport {
    pub fn build(
        total_time: Duration,
        workers: &[WorkerStats],
        summary: &ResultSummary,
        num_slowest: usize,
    ) -> Self {
        let mut tests: Vec<TestTiming> = workers.iter().flat_map(|w| w.tests.clone()).collect();
        tests.sort_by(|a, b| b.duration.cmp(&a.duration).then_with(|| a.test.cmp(&b.test)));

        let samples: Vec<f64> = tests
            .iter()
            .map(|t| t.duration.as_secs_f64() * 1000.0)
            .collect();

        let timed_out_or_crashed: BTreeSet<&String> = summary
            .tests_with_outcome(OutcomeKind::Timeout)
            .iter()
            .chain(summary.tests_with_outcome(OutcomeKind::Crash))
            .collect();

        let slowest_tests: Vec<TestTiming> = tests
            .iter()
            .filter(|t| !t.slow && !timed_out_or_crashed.contains(&t.test))
            .take(num_slowest)
            .cloned()
            .collect();
        let slow_tests = tests.iter().filter(|t| t.slow).cloned().collect();
        let timeout_or_crash = tests
            .iter()
            .filter(|t| timed_out_or_crashed.contains(&t.test))
            .cloned()
            .collect();

        let mut slow_shards: Vec<ShardTiming> = workers
            .iter()
            .flat_map(|w| w.shards.iter())
            .filter(|s| s.duration > SLOW_SHARD_THRESHOLD)
            .cloned()
            .collect();
        slow_shards.sort_by(|a, b| b.duration.cmp(&a.duration));

        let cumulative_time: Duration = workers.iter().map(|w| w.total_time).sum();
        let optimal_time = if workers.is_empty() {
            Duration::ZERO
        } else {
            cumulative_time / workers.len() as u32
        };

        Self {
            total_time,
            num_workers: workers.len(),
            cumulative_time,
            optimal_time,
            workers: workers.to_vec(),
            per_test: TimingStats::from_samples(&samples),
            slowest_tests,
            slow_tests,
            timeout_or_crash,
            slow_shards,
        }
    }
}
