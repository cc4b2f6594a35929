//! Result summary
//!
//! Partitions the tests of one pass into outcome buckets as results arrive.
//! Only the draining side of a pass mutates a summary; everything else reads
//! it through the accessors.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

use crate::expectations::TestExpectations;
use crate::models::{FailureArtifact, OutcomeKind, Timeline};

/// Errors raised while aggregating or classifying results
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResultsError {
    #[error("Outcome reported twice for {0}")]
    DuplicateOutcome(String),

    #[error("Outcome reported for {0}, which is not part of this pass")]
    UnknownTest(String),

    #[error("No retry outcome was reported for {0}")]
    MissingRetryOutcome(String),
}

/// Aggregate of one pass
#[derive(Clone, Debug)]
pub struct ResultSummary {
    scope: HashSet<String>,
    total: usize,
    remaining: usize,
    expected: usize,
    unexpected: usize,
    tests_by_outcome: BTreeMap<OutcomeKind, BTreeSet<String>>,
    tests_by_timeline: BTreeMap<Timeline, BTreeSet<String>>,
    results: BTreeMap<String, OutcomeKind>,
    unexpected_results: BTreeMap<String, OutcomeKind>,
    failures: BTreeMap<String, Vec<FailureArtifact>>,
}

impl ResultSummary {
    /// Empty summary over `tests`, with timeline buckets resolved up front
    pub fn new(expectations: &TestExpectations, tests: impl IntoIterator<Item = String>) -> Self {
        let scope: HashSet<String> = tests.into_iter().collect();

        let tests_by_outcome = OutcomeKind::all()
            .into_iter()
            .map(|kind| (kind, BTreeSet::new()))
            .collect();
        let tests_by_timeline = Timeline::all()
            .into_iter()
            .map(|timeline| (timeline, expectations.tests_with_timeline(&scope, timeline)))
            .collect();

        Self {
            total: scope.len(),
            remaining: scope.len(),
            scope,
            expected: 0,
            unexpected: 0,
            tests_by_outcome,
            tests_by_timeline,
            results: BTreeMap::new(),
            unexpected_results: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    /// Record the single outcome of `test` for this pass
    pub(crate) fn add(
        &mut self,
        test: &str,
        failures: Vec<FailureArtifact>,
        kind: OutcomeKind,
        expected: bool,
    ) -> Result<(), ResultsError> {
        if !self.scope.contains(test) {
            return Err(ResultsError::UnknownTest(test.to_string()));
        }
        if self.results.contains_key(test) {
            return Err(ResultsError::DuplicateOutcome(test.to_string()));
        }

        self.tests_by_outcome
            .entry(kind)
            .or_default()
            .insert(test.to_string());
        self.results.insert(test.to_string(), kind);
        self.remaining -= 1;

        if !failures.is_empty() {
            self.failures.insert(test.to_string(), failures);
        }
        if expected {
            self.expected += 1;
        } else {
            self.unexpected_results.insert(test.to_string(), kind);
            self.unexpected += 1;
        }
        Ok(())
    }

    /// Unexpected results other than passes; crashes only when asked for
    pub fn get_failures(&self, include_crashes: bool) -> BTreeMap<String, OutcomeKind> {
        self.unexpected_results
            .iter()
            .filter(|(_, &kind)| {
                kind != OutcomeKind::Pass && (include_crashes || kind != OutcomeKind::Crash)
            })
            .map(|(test, &kind)| (test.clone(), kind))
            .collect()
    }

    pub fn contains(&self, test: &str) -> bool {
        self.scope.contains(test)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn unexpected(&self) -> usize {
        self.unexpected
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    pub fn result(&self, test: &str) -> Option<OutcomeKind> {
        self.results.get(test).copied()
    }

    pub fn results(&self) -> &BTreeMap<String, OutcomeKind> {
        &self.results
    }

    pub fn unexpected_results(&self) -> &BTreeMap<String, OutcomeKind> {
        &self.unexpected_results
    }

    pub fn failures(&self) -> &BTreeMap<String, Vec<FailureArtifact>> {
        &self.failures
    }

    pub fn tests_with_outcome(&self, kind: OutcomeKind) -> &BTreeSet<String> {
        &self.tests_by_outcome[&kind]
    }

    pub fn tests_with_timeline(&self, timeline: Timeline) -> &BTreeSet<String> {
        &self.tests_by_timeline[&timeline]
    }

    /// Tests in scope that have not reported yet
    pub fn missing(&self) -> BTreeSet<String> {
        self.scope
            .iter()
            .filter(|t| !self.results.contains_key(*t))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildType, Platform};

    fn summary_of(tests: &[&str]) -> ResultSummary {
        let expectations = TestExpectations::parse(
            "DEFER : a/deferred.html = FAIL\n",
            Platform::Linux,
            BuildType::Release,
        )
        .unwrap();
        ResultSummary::new(&expectations, tests.iter().map(|t| t.to_string()))
    }

    #[test]
    fn test_add_updates_counters() {
        let mut summary = summary_of(&["a/1.html", "a/2.html", "a/3.html"]);
        assert_eq!(summary.remaining(), 3);

        summary.add("a/1.html", vec![], OutcomeKind::Pass, true).unwrap();
        summary
            .add(
                "a/2.html",
                vec![FailureArtifact::new("text-diff")],
                OutcomeKind::Text,
                false,
            )
            .unwrap();

        assert_eq!(summary.remaining(), 1);
        assert_eq!(summary.expected(), 1);
        assert_eq!(summary.unexpected(), 1);
        assert_eq!(summary.unexpected_results().len(), 1);
        assert_eq!(summary.failures()["a/2.html"].len(), 1);
        assert_eq!(summary.missing(), BTreeSet::from(["a/3.html".to_string()]));
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_buckets_partition_all_tests() {
        let tests = ["a/1.html", "a/2.html", "a/3.html", "a/4.html"];
        let mut summary = summary_of(&tests);
        let kinds = [
            OutcomeKind::Pass,
            OutcomeKind::Crash,
            OutcomeKind::Pass,
            OutcomeKind::Timeout,
        ];
        for (test, kind) in tests.iter().zip(kinds) {
            summary.add(test, vec![], kind, kind == OutcomeKind::Pass).unwrap();
        }

        let bucket_total: usize = OutcomeKind::all()
            .iter()
            .map(|k| summary.tests_with_outcome(*k).len())
            .sum();
        assert_eq!(bucket_total, summary.total());
        assert_eq!(summary.remaining(), 0);
        assert!(summary.is_complete());
        assert_eq!(summary.expected() + summary.unexpected(), summary.total());
    }

    #[test]
    fn test_duplicate_and_unknown_rejected() {
        let mut summary = summary_of(&["a/1.html"]);
        summary.add("a/1.html", vec![], OutcomeKind::Pass, true).unwrap();

        assert_eq!(
            summary.add("a/1.html", vec![], OutcomeKind::Pass, true),
            Err(ResultsError::DuplicateOutcome("a/1.html".to_string()))
        );
        assert_eq!(
            summary.add("b/9.html", vec![], OutcomeKind::Pass, true),
            Err(ResultsError::UnknownTest("b/9.html".to_string()))
        );
        assert_eq!(summary.remaining(), 0);
        assert_eq!(summary.expected(), 1);
    }

    #[test]
    fn test_get_failures_excludes_passes_and_optionally_crashes() {
        let mut summary = summary_of(&["a/pass.html", "a/crash.html", "a/text.html", "a/ok.html"]);
        summary.add("a/pass.html", vec![], OutcomeKind::Pass, false).unwrap();
        summary.add("a/crash.html", vec![], OutcomeKind::Crash, false).unwrap();
        summary.add("a/text.html", vec![], OutcomeKind::Text, false).unwrap();
        summary.add("a/ok.html", vec![], OutcomeKind::Text, true).unwrap();

        let retryable = summary.get_failures(false);
        assert_eq!(retryable.keys().collect::<Vec<_>>(), vec!["a/text.html"]);

        let all = summary.get_failures(true);
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("a/crash.html"), Some(&OutcomeKind::Crash));
    }

    #[test]
    fn test_timeline_buckets() {
        let summary = summary_of(&["a/deferred.html", "a/other.html"]);
        assert!(summary
            .tests_with_timeline(Timeline::Defer)
            .contains("a/deferred.html"));
        assert_eq!(summary.tests_with_timeline(Timeline::Now).len(), 1);
        assert!(summary.tests_with_timeline(Timeline::Wontfix).is_empty());
    }

    #[test]
    fn test_empty_summary_is_complete() {
        let summary = summary_of(&[]);
        assert_eq!(summary.total(), 0);
        assert!(summary.is_complete());
    }
}
