//! Subprocess test executor
//!
//! Runs one external command per test. The command receives the test path as
//! its last argument and reports back on stdout:
//!
//! ```text
//! ARTIFACT: text-diff out/fast/dom/a-diff.txt
//! RESULT: TEXT
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::ExecutorError;
use super::{RunOutput, TestExecutor};
use crate::models::{FailureArtifact, OutcomeKind, TestUnit};

pub const TIMEOUT_ENV: &str = "LAYOUT_RUNNER_TIMEOUT_MS";
pub const EXPECTED_HASH_ENV: &str = "LAYOUT_RUNNER_EXPECTED_HASH";

const RESULT_PREFIX: &str = "RESULT:";
const ARTIFACT_PREFIX: &str = "ARTIFACT:";

/// Executor that spawns a fresh process per test
#[derive(Clone, Debug)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    suite_root: PathBuf,
}

impl CommandExecutor {
    /// Build from a full command line; the first element is the program
    pub fn new(command_line: Vec<String>, suite_root: impl Into<PathBuf>) -> Result<Self, ExecutorError> {
        let mut parts = command_line.into_iter();
        let program = parts.next().ok_or(ExecutorError::NoCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
            suite_root: suite_root.into(),
        })
    }

    async fn run_test(&self, test: &TestUnit) -> Result<RunOutput, ExecutorError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(self.suite_root.join(&test.path))
            .env(TIMEOUT_ENV, test.timeout.as_millis().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(hash) = &test.fingerprint {
            cmd.env(EXPECTED_HASH_ENV, hash);
        }

        let child = cmd.spawn().map_err(|source| ExecutorError::Spawn {
            command: self.program.clone(),
            source,
        })?;

        // Dropping the child on timeout kills it.
        let output = match tokio::time::timeout(test.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ExecutorError::Io {
                test: test.path.clone(),
                source,
            })?,
            Err(_) => {
                debug!(test = %test.path, timeout_ms = test.timeout.as_millis() as u64, "test timed out; killed");
                return Ok(RunOutput::new(OutcomeKind::Timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let result = parse_output(output.status.code(), &stdout);
        if result.kind == OutcomeKind::Crash {
            debug!(
                test = %test.path,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "test crashed"
            );
        }
        Ok(result)
    }
}

impl TestExecutor for CommandExecutor {
    fn run<'a>(&'a self, test: &'a TestUnit) -> BoxFuture<'a, Result<RunOutput, ExecutorError>> {
        self.run_test(test).boxed()
    }
}

/// Interpret a finished test process. `exit_code` is `None` when the process
/// was killed by a signal.
pub fn parse_output(exit_code: Option<i32>, stdout: &str) -> RunOutput {
    let mut result_tag = None;
    let mut artifacts = Vec::new();

    for line in stdout.lines() {
        if let Some(tag) = line.strip_prefix(RESULT_PREFIX) {
            result_tag = Some(tag.trim());
        } else if let Some(payload) = line.strip_prefix(ARTIFACT_PREFIX) {
            if let Some(artifact) = FailureArtifact::parse(payload.trim()) {
                artifacts.push(artifact);
            }
        }
    }

    let kind = match (exit_code, result_tag) {
        (None, _) => OutcomeKind::Crash,
        (Some(_), Some(tag)) => OutcomeKind::from_tag(tag).unwrap_or_else(|| {
            warn!(tag, "unknown result tag; treating as crash");
            OutcomeKind::Crash
        }),
        (Some(0), None) => OutcomeKind::Pass,
        (Some(_), None) => OutcomeKind::Crash,
    };

    RunOutput { kind, artifacts }
}
