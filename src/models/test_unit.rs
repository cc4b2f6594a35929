//! Test units and shards
//!
//! A `TestUnit` is resolved once at discovery time and never changes; a
//! `Shard` is the unit of work a worker takes off the queue.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use super::Modifier;

/// A single test, resolved with its timeout and modifiers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestUnit {
    /// Path relative to the suite root, `/`-separated
    pub path: String,
    pub timeout: Duration,
    /// Expected pixel checksum, if a baseline checksum exists
    pub fingerprint: Option<String>,
    pub modifiers: BTreeSet<Modifier>,
}

impl TestUnit {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            fingerprint: None,
            modifiers: BTreeSet::new(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        self.modifiers.extend(modifiers);
        self
    }

    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    pub fn is_slow(&self) -> bool {
        self.has_modifier(Modifier::Slow)
    }
}

impl fmt::Display for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}ms)", self.path, self.timeout.as_millis())
    }
}

/// An ordered group of tests assigned to one worker as a whole
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shard {
    pub label: String,
    pub tests: Vec<TestUnit>,
}

impl Shard {
    pub fn new(label: impl Into<String>, tests: Vec<TestUnit>) -> Self {
        Self {
            label: label.into(),
            tests,
        }
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} tests)", self.label, self.tests.len())
    }
}
