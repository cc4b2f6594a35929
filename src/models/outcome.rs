//! Per-test outcome models
//!
//! Defines outcome kinds, failure artifacts and the outcome record that
//! workers publish onto the outcome channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of running one test once
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutcomeKind {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "TEXT")]
    Text,
    #[serde(rename = "IMAGE")]
    Image,
    #[serde(rename = "IMAGE+TEXT")]
    ImageAndText,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "CRASH")]
    Crash,
    #[serde(rename = "SKIP")]
    Skip,
}

impl OutcomeKind {
    /// Report tag for this outcome
    pub fn tag(&self) -> &'static str {
        match self {
            OutcomeKind::Pass => "PASS",
            OutcomeKind::Text => "TEXT",
            OutcomeKind::Image => "IMAGE",
            OutcomeKind::ImageAndText => "IMAGE+TEXT",
            OutcomeKind::Timeout => "TIMEOUT",
            OutcomeKind::Crash => "CRASH",
            OutcomeKind::Skip => "SKIP",
        }
    }

    /// Parse from a report tag (case-insensitive)
    pub fn from_tag(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PASS" => Some(OutcomeKind::Pass),
            "TEXT" => Some(OutcomeKind::Text),
            "IMAGE" => Some(OutcomeKind::Image),
            "IMAGE+TEXT" => Some(OutcomeKind::ImageAndText),
            "TIMEOUT" => Some(OutcomeKind::Timeout),
            "CRASH" => Some(OutcomeKind::Crash),
            "SKIP" => Some(OutcomeKind::Skip),
            _ => None,
        }
    }

    /// All outcome kinds, in report order
    pub fn all() -> [OutcomeKind; 7] {
        [
            OutcomeKind::Pass,
            OutcomeKind::Text,
            OutcomeKind::Image,
            OutcomeKind::ImageAndText,
            OutcomeKind::Timeout,
            OutcomeKind::Crash,
            OutcomeKind::Skip,
        ]
    }

    /// Whether the test produced output that differed from its baseline
    pub fn is_content_mismatch(&self) -> bool {
        matches!(
            self,
            OutcomeKind::Text | OutcomeKind::Image | OutcomeKind::ImageAndText
        )
    }

    /// Human description, singular or plural
    pub fn description(&self, plural: bool) -> &'static str {
        match (self, plural) {
            (OutcomeKind::Pass, false) => "pass",
            (OutcomeKind::Pass, true) => "passes",
            (OutcomeKind::Text, _) => "text diff mismatch",
            (OutcomeKind::Image, _) => "image mismatch",
            (OutcomeKind::ImageAndText, _) => "image and text mismatch",
            (OutcomeKind::Timeout, false) => "test timed out",
            (OutcomeKind::Timeout, true) => "tests timed out",
            (OutcomeKind::Crash, false) => "test shell crash",
            (OutcomeKind::Crash, true) => "test shell crashes",
            (OutcomeKind::Skip, _) => "skipped",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A diff or dump left behind by a failing test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureArtifact {
    pub name: String,
    pub path: Option<PathBuf>,
}

impl FailureArtifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Parse the payload of an `ARTIFACT:` protocol line (`name [path]`)
    pub fn parse(payload: &str) -> Option<Self> {
        let mut parts = payload.trim().splitn(2, char::is_whitespace);
        let name = parts.next().filter(|n| !n.is_empty())?;
        let artifact = Self::new(name);
        match parts.next().map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => Some(artifact.with_path(path)),
            None => Some(artifact),
        }
    }
}

impl fmt::Display for FailureArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} ({})", self.name, path.display()),
            None => f.write_str(&self.name),
        }
    }
}

/// One result produced by a worker for one test in one pass
#[derive(Clone, Debug)]
pub struct Outcome {
    pub test: String,
    pub kind: OutcomeKind,
    pub artifacts: Vec<FailureArtifact>,
    pub duration: Duration,
    pub worker: usize,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms, worker {}]",
            self.kind,
            self.test,
            self.duration.as_millis(),
            self.worker
        )
    }
}
