//! Expectation models
//!
//! Defines what a test is expected to do, which release timeline it belongs
//! to, and the modifiers that change how it is scheduled.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::OutcomeKind;

/// Outcome accepted by an expectation entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpectedResult {
    Pass,
    /// Any content mismatch
    Fail,
    Text,
    Image,
    #[serde(rename = "IMAGE+TEXT")]
    ImageAndText,
    Timeout,
    Crash,
}

impl ExpectedResult {
    pub fn tag(&self) -> &'static str {
        match self {
            ExpectedResult::Pass => "PASS",
            ExpectedResult::Fail => "FAIL",
            ExpectedResult::Text => "TEXT",
            ExpectedResult::Image => "IMAGE",
            ExpectedResult::ImageAndText => "IMAGE+TEXT",
            ExpectedResult::Timeout => "TIMEOUT",
            ExpectedResult::Crash => "CRASH",
        }
    }

    pub fn from_tag(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PASS" => Some(ExpectedResult::Pass),
            "FAIL" => Some(ExpectedResult::Fail),
            "TEXT" => Some(ExpectedResult::Text),
            "IMAGE" => Some(ExpectedResult::Image),
            "IMAGE+TEXT" => Some(ExpectedResult::ImageAndText),
            "TIMEOUT" => Some(ExpectedResult::Timeout),
            "CRASH" => Some(ExpectedResult::Crash),
            _ => None,
        }
    }

    /// Whether an actual outcome satisfies this expected result
    pub fn accepts(&self, kind: OutcomeKind) -> bool {
        match self {
            ExpectedResult::Pass => kind == OutcomeKind::Pass,
            ExpectedResult::Fail => kind.is_content_mismatch(),
            ExpectedResult::Text => kind == OutcomeKind::Text,
            ExpectedResult::Image => kind == OutcomeKind::Image,
            ExpectedResult::ImageAndText => kind == OutcomeKind::ImageAndText,
            ExpectedResult::Timeout => kind == OutcomeKind::Timeout,
            ExpectedResult::Crash => kind == OutcomeKind::Crash,
        }
    }
}

impl fmt::Display for ExpectedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// When a non-passing test is scheduled to be fixed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeline {
    #[default]
    Now,
    Defer,
    Wontfix,
}

impl Timeline {
    pub fn all() -> [Timeline; 3] {
        [Timeline::Now, Timeline::Defer, Timeline::Wontfix]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Timeline::Now => "now",
            Timeline::Defer => "defer",
            Timeline::Wontfix => "wontfix",
        }
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host platform an expectation line can be restricted to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Win,
    Mac,
    Linux,
}

impl Platform {
    pub fn all() -> [Platform; 3] {
        [Platform::Win, Platform::Mac, Platform::Linux]
    }

    /// Platform this binary was built for
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Win
        } else if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Linux
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "win" | "windows" => Some(Platform::Win),
            "mac" | "macos" | "darwin" => Some(Platform::Mac),
            "linux" => Some(Platform::Linux),
            _ => None,
        }
    }

    fn modifier(&self) -> Modifier {
        match self {
            Platform::Win => Modifier::Win,
            Platform::Mac => Modifier::Mac,
            Platform::Linux => Modifier::Linux,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Win => write!(f, "win"),
            Platform::Mac => write!(f, "mac"),
            Platform::Linux => write!(f, "linux"),
        }
    }
}

/// Build configuration of the binary under test
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Debug,
    #[default]
    Release,
}

impl BuildType {
    fn modifier(&self) -> Modifier {
        match self {
            BuildType::Debug => Modifier::Debug,
            BuildType::Release => Modifier::Release,
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildType::Debug => write!(f, "Debug"),
            BuildType::Release => write!(f, "Release"),
        }
    }
}

/// Modifier attached to an expectation line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modifier {
    Skip,
    Slow,
    Defer,
    Wontfix,
    Debug,
    Release,
    Win,
    Mac,
    Linux,
}

impl Modifier {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SKIP" => Some(Modifier::Skip),
            "SLOW" => Some(Modifier::Slow),
            "DEFER" => Some(Modifier::Defer),
            "WONTFIX" => Some(Modifier::Wontfix),
            "DEBUG" => Some(Modifier::Debug),
            "RELEASE" => Some(Modifier::Release),
            "WIN" => Some(Modifier::Win),
            "MAC" => Some(Modifier::Mac),
            "LINUX" => Some(Modifier::Linux),
            _ => None,
        }
    }

    fn is_platform(&self) -> bool {
        matches!(self, Modifier::Win | Modifier::Mac | Modifier::Linux)
    }

    fn is_build_type(&self) -> bool {
        matches!(self, Modifier::Debug | Modifier::Release)
    }
}

/// Resolved expectation for one test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub results: BTreeSet<ExpectedResult>,
    pub modifiers: BTreeSet<Modifier>,
}

impl Default for Expectation {
    fn default() -> Self {
        Self {
            results: BTreeSet::from([ExpectedResult::Pass]),
            modifiers: BTreeSet::new(),
        }
    }
}

impl Expectation {
    pub fn new(results: impl IntoIterator<Item = ExpectedResult>) -> Self {
        Self {
            results: results.into_iter().collect(),
            modifiers: BTreeSet::new(),
        }
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.insert(modifier);
        self
    }

    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    pub fn timeline(&self) -> Timeline {
        if self.has_modifier(Modifier::Wontfix) {
            Timeline::Wontfix
        } else if self.has_modifier(Modifier::Defer) {
            Timeline::Defer
        } else {
            Timeline::Now
        }
    }

    /// Whether the actual outcome is one of the accepted outcomes
    pub fn matches(&self, kind: OutcomeKind) -> bool {
        if kind == OutcomeKind::Skip {
            return self.has_modifier(Modifier::Skip);
        }
        self.results.iter().any(|r| r.accepts(kind))
    }

    /// Space-joined expected tags, as written to the report
    pub fn tags(&self) -> String {
        self.results
            .iter()
            .map(ExpectedResult::tag)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether a line carrying these modifiers applies to the given configuration
    pub fn applies_to(&self, platform: Platform, build: BuildType) -> bool {
        let platforms: Vec<_> = self.modifiers.iter().filter(|m| m.is_platform()).collect();
        let builds: Vec<_> = self.modifiers.iter().filter(|m| m.is_build_type()).collect();

        (platforms.is_empty() || platforms.contains(&&platform.modifier()))
            && (builds.is_empty() || builds.contains(&&build.modifier()))
    }
}
