//! Results directory
//!
//! Writes the machine-readable outputs of a run: the unexpected-results
//! summary, a full per-test record, and the list of tests that ran.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::expectations::TestExpectations;
use crate::results::report::UnexpectedResults;
use crate::results::summary::ResultSummary;
use crate::results::timing::TimingReport;

pub const UNEXPECTED_RESULTS_FILE: &str = "unexpected_results.json";
pub const FULL_RESULTS_FILE: &str = "results.json";
pub const TESTS_RUN_FILE: &str = "tests_run.txt";

/// Stored record of a single test
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredTestResult {
    pub test: String,
    pub actual: String,
    pub expected: String,
    pub expected_ok: bool,
    /// Time spent in the first pass, if a worker timed it
    pub time_ms: Option<u64>,
    /// Outcome of the retry pass, if the test was retried
    pub retry: Option<String>,
    pub artifacts: Vec<String>,
}

/// Full record of a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub platform: String,
    pub build_type: String,
    pub num_workers: usize,
    pub total: usize,
    pub expected: usize,
    pub unexpected: usize,
    pub duration_ms: u64,
    pub results: Vec<StoredTestResult>,
    pub timing: Option<TimingReport>,
    pub environment: EnvironmentInfo,
}

/// Environment information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Identity of a run, captured before it starts
#[derive(Clone, Debug)]
pub struct RunInfo {
    pub started_at: DateTime<Utc>,
    pub platform: String,
    pub build_type: String,
    pub num_workers: usize,
}

impl StoredRun {
    pub fn build(
        info: &RunInfo,
        duration: Duration,
        first: &ResultSummary,
        retry: Option<&ResultSummary>,
        expectations: &TestExpectations,
        timing: Option<TimingReport>,
    ) -> Self {
        let test_times: HashMap<&str, u64> = timing
            .iter()
            .flat_map(|report| report.workers.iter())
            .flat_map(|worker| worker.tests.iter())
            .map(|t| (t.test.as_str(), t.duration.as_millis() as u64))
            .collect();

        let results = first
            .results()
            .iter()
            .map(|(test, kind)| StoredTestResult {
                test: test.clone(),
                actual: kind.tag().to_string(),
                expected: expectations.expectations_string(test),
                expected_ok: !first.unexpected_results().contains_key(test),
                time_ms: test_times.get(test.as_str()).copied(),
                retry: retry
                    .and_then(|r| r.result(test))
                    .map(|k| k.tag().to_string()),
                artifacts: first
                    .failures()
                    .get(test)
                    .map(|list| list.iter().map(|a| a.to_string()).collect())
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            id: generate_run_id(&info.started_at),
            started_at: info.started_at,
            completed_at: Utc::now(),
            platform: info.platform.clone(),
            build_type: info.build_type.clone(),
            num_workers: info.num_workers,
            total: first.total(),
            expected: first.expected(),
            unexpected: first.unexpected(),
            duration_ms: duration.as_millis() as u64,
            results,
            timing,
            environment: EnvironmentInfo::default(),
        }
    }
}

fn generate_run_id(started_at: &DateTime<Utc>) -> String {
    let timestamp = started_at.format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Results directory manager
pub struct ResultsDirectory {
    base_dir: PathBuf,
}

impl ResultsDirectory {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.base_dir
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create results directory {}",
                self.base_dir.display()
            )
        })
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.base_dir.join(name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn write_unexpected_results(&self, report: &UnexpectedResults) -> Result<PathBuf> {
        let path = self.write_json(UNEXPECTED_RESULTS_FILE, report)?;
        info!("Saved unexpected results to {}", path.display());
        Ok(path)
    }

    pub fn load_unexpected_results(&self) -> Result<UnexpectedResults> {
        let path = self.base_dir.join(UNEXPECTED_RESULTS_FILE);
        let file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn write_full_results(&self, run: &StoredRun) -> Result<PathBuf> {
        self.write_json(FULL_RESULTS_FILE, run)
    }

    pub fn load_full_results(&self) -> Result<StoredRun> {
        let path = self.base_dir.join(FULL_RESULTS_FILE);
        let file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Write the tests about to run, one per line
    pub fn write_tests_run(&self, tests: &[String]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.base_dir.join(TESTS_RUN_FILE);
        let mut content = tests.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildType, FailureArtifact, OutcomeKind, Platform};
    use tempfile::TempDir;

    fn sample() -> (TestExpectations, ResultSummary, ResultSummary) {
        let exp = TestExpectations::parse(
            "BUG1 : a/known.html = TEXT\n",
            Platform::Linux,
            BuildType::Release,
        )
        .unwrap();
        let tests = ["a/known.html", "a/new.html", "a/ok.html"];
        let mut first = ResultSummary::new(&exp, tests.iter().map(|t| t.to_string()));
        first.add("a/known.html", vec![], OutcomeKind::Text, true).unwrap();
        first
            .add(
                "a/new.html",
                vec![FailureArtifact::new("image-diff").with_path("a/new-diff.png")],
                OutcomeKind::Image,
                false,
            )
            .unwrap();
        first.add("a/ok.html", vec![], OutcomeKind::Pass, true).unwrap();

        let mut retry = ResultSummary::new(&exp, ["a/new.html".to_string()]);
        retry.add("a/new.html", vec![], OutcomeKind::Image, false).unwrap();
        (exp, first, retry)
    }

    #[test]
    fn test_unexpected_results_round_trip() {
        let dir = TempDir::new().unwrap();
        let results = ResultsDirectory::new(dir.path().join("out"));
        let (exp, first, retry) = sample();

        let report = UnexpectedResults::summarize(&first, Some(&retry), &exp).unwrap();
        let path = results.write_unexpected_results(&report).unwrap();
        assert!(path.ends_with(UNEXPECTED_RESULTS_FILE));

        let loaded = results.load_unexpected_results().unwrap();
        assert_eq!(loaded.num_regressions, 1);
        assert_eq!(loaded.tests["a/new.html"].actual, "IMAGE");
    }

    #[test]
    fn test_full_results() {
        let dir = TempDir::new().unwrap();
        let results = ResultsDirectory::new(dir.path());
        let (exp, first, retry) = sample();
        let info = RunInfo {
            started_at: Utc::now(),
            platform: "linux".to_string(),
            build_type: "release".to_string(),
            num_workers: 2,
        };

        let run = StoredRun::build(&info, Duration::from_secs(3), &first, Some(&retry), &exp, None);
        results.write_full_results(&run).unwrap();

        let loaded = results.load_full_results().unwrap();
        assert_eq!(loaded.total, 3);
        assert_eq!(loaded.unexpected, 1);
        assert_eq!(loaded.duration_ms, 3000);
        let new = loaded.results.iter().find(|r| r.test == "a/new.html").unwrap();
        assert!(!new.expected_ok);
        assert_eq!(new.time_ms, None);
        assert_eq!(new.retry.as_deref(), Some("IMAGE"));
        assert_eq!(new.artifacts.len(), 1);
        let known = loaded.results.iter().find(|r| r.test == "a/known.html").unwrap();
        assert!(known.expected_ok);
        assert_eq!(known.expected, "TEXT");
    }

    #[test]
    fn test_tests_run_file() {
        let dir = TempDir::new().unwrap();
        let results = ResultsDirectory::new(dir.path());
        let tests = vec!["a/1.html".to_string(), "b/2.html".to_string()];

        let path = results.write_tests_run(&tests).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "a/1.html\nb/2.html\n");
    }
}
