//! Unexpected-results report
//!
//! Classifies every unexpected result of the first pass as an unexpected
//! pass, a flaky test, or a regression, using the retry pass when one ran.
//! Classification is a pure function of the two summaries and the
//! expectations, so building the report twice yields the same value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::expectations::TestExpectations;
use crate::models::{OutcomeKind, Timeline};
use crate::results::summary::{ResultSummary, ResultsError};

/// Report format version
pub const REPORT_VERSION: u32 = 1;

/// How an unexpected result was judged
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    UnexpectedPass,
    Flaky,
    Regression,
}

impl Classification {
    pub fn name(&self) -> &'static str {
        match self {
            Classification::UnexpectedPass => "unexpected pass",
            Classification::Flaky => "flaky",
            Classification::Regression => "regression",
        }
    }
}

/// One test entry. Fields are declared in key order so the JSON output is sorted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnexpectedTest {
    /// Space-separated observed outcome tags, first pass then retry
    pub actual: String,

    /// Space-separated expectation tags
    pub expected: String,

    #[serde(skip)]
    pub classification: Option<Classification>,
}

/// Machine-readable summary of unexpected results
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnexpectedResults {
    /// Tests in the NOW timeline that did not pass
    pub fixable: usize,

    pub num_flaky: usize,

    pub num_passes: usize,

    pub num_regressions: usize,

    /// Tests in the NOW timeline recorded as SKIP
    pub skipped: usize,

    pub tests: BTreeMap<String, UnexpectedTest>,

    pub version: u32,
}

impl UnexpectedResults {
    /// Classify the unexpected results of `first`.
    ///
    /// `retry` is the summary of the retry pass when one ran. Any test in the
    /// retry scope must have a retry outcome.
    pub fn summarize(
        first: &ResultSummary,
        retry: Option<&ResultSummary>,
        expectations: &TestExpectations,
    ) -> Result<Self, ResultsError> {
        let mut report = Self {
            fixable: 0,
            num_flaky: 0,
            num_passes: 0,
            num_regressions: 0,
            skipped: 0,
            tests: BTreeMap::new(),
            version: REPORT_VERSION,
        };

        // Counted from what the tests did in the first pass.
        let now = first.tests_with_timeline(Timeline::Now);
        report.fixable = now
            .difference(first.tests_with_outcome(OutcomeKind::Pass))
            .count();
        report.skipped = now
            .intersection(first.tests_with_outcome(OutcomeKind::Skip))
            .count();

        for (test, &result) in first.unexpected_results() {
            let mut actual = vec![result.tag().to_string()];

            let classification = match result {
                OutcomeKind::Pass => Classification::UnexpectedPass,
                OutcomeKind::Crash => Classification::Regression,
                _ => match retry.filter(|r| r.contains(test)) {
                    Some(retry) => {
                        let retry_result = retry
                            .result(test)
                            .ok_or_else(|| ResultsError::MissingRetryOutcome(test.clone()))?;
                        if retry_result == result {
                            Classification::Regression
                        } else {
                            actual.push(retry_result.tag().to_string());
                            Classification::Flaky
                        }
                    }
                    None => {
                        // Without a retry outcome the test is treated as flaky.
                        actual.push(expectations.expectations_string(test));
                        Classification::Flaky
                    }
                },
            };

            match classification {
                Classification::UnexpectedPass => report.num_passes += 1,
                Classification::Flaky => report.num_flaky += 1,
                Classification::Regression => report.num_regressions += 1,
            }

            report.tests.insert(
                test.clone(),
                UnexpectedTest {
                    actual: actual.join(" "),
                    expected: expectations.expectations_string(test),
                    classification: Some(classification),
                },
            );
        }

        Ok(report)
    }

    /// Tests with the given classification, in path order
    pub fn tests_classified(&self, classification: Classification) -> Vec<&str> {
        self.tests
            .iter()
            .filter(|(_, t)| t.classification == Some(classification))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn has_regressions(&self) -> bool {
        self.num_regressions > 0
    }

    /// Pretty JSON with sorted keys
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
