//! Expectation lookup
//!
//! Resolves a test path to the most specific expectation entry that applies
//! to the current platform and build type.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

use super::parser::{parse_line, ExpectationsError, LineError};
use crate::models::{BuildType, Expectation, Modifier, OutcomeKind, Platform, Timeline};

/// Parsed expectations for one platform/build configuration
#[derive(Clone, Debug, Default)]
pub struct TestExpectations {
    entries: HashMap<String, Expectation>,
    default: Expectation,
}

impl TestExpectations {
    /// Expectations with no entries: every test is expected to pass
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse expectation text for the given configuration
    pub fn parse(
        content: &str,
        platform: Platform,
        build: BuildType,
    ) -> Result<Self, ExpectationsError> {
        let mut entries: HashMap<String, Expectation> = HashMap::new();
        let mut errors = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_number = idx + 1;
            let parsed = match parse_line(raw) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => continue,
                Err(message) => {
                    errors.push(LineError {
                        line: line_number,
                        message,
                    });
                    continue;
                }
            };

            if !parsed.expectation.applies_to(platform, build) {
                continue;
            }

            if entries.contains_key(&parsed.path) {
                errors.push(LineError {
                    line: line_number,
                    message: format!("duplicate expectation for '{}'", parsed.path),
                });
                continue;
            }
            entries.insert(parsed.path, parsed.expectation);
        }

        if !errors.is_empty() {
            return Err(ExpectationsError::Invalid(errors));
        }

        debug!(
            "Parsed {} expectation entries for {} {}",
            entries.len(),
            platform,
            build
        );

        Ok(Self {
            entries,
            default: Expectation::default(),
        })
    }

    /// Load and parse an expectations file
    pub fn load(
        path: impl AsRef<Path>,
        platform: Platform,
        build: BuildType,
    ) -> Result<Self, ExpectationsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ExpectationsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, platform, build)
    }

    /// Check the text parses for every platform and build type
    pub fn lint(content: &str) -> Result<(), ExpectationsError> {
        let mut errors = BTreeSet::new();
        for platform in Platform::all() {
            for build in [BuildType::Debug, BuildType::Release] {
                if let Err(ExpectationsError::Invalid(found)) =
                    Self::parse(content, platform, build)
                {
                    errors.extend(found);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ExpectationsError::Invalid(errors.into_iter().collect()))
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most specific expectation for a test: the file itself, then each
    /// enclosing directory from innermost outwards
    pub fn expected(&self, test: &str) -> &Expectation {
        let mut candidate = test.trim_matches('/');
        loop {
            if let Some(expectation) = self.entries.get(candidate) {
                return expectation;
            }
            match candidate.rfind('/') {
                Some(idx) => candidate = &candidate[..idx],
                None => return &self.default,
            }
        }
    }

    pub fn has_modifier(&self, test: &str, modifier: Modifier) -> bool {
        self.expected(test).has_modifier(modifier)
    }

    pub fn matches(&self, test: &str, kind: OutcomeKind) -> bool {
        self.expected(test).matches(kind)
    }

    pub fn timeline(&self, test: &str) -> Timeline {
        self.expected(test).timeline()
    }

    pub fn expectations_string(&self, test: &str) -> String {
        self.expected(test).tags()
    }

    /// Tests from `tests` that fall in the given timeline
    pub fn tests_with_timeline<'a>(
        &self,
        tests: impl IntoIterator<Item = &'a String>,
        timeline: Timeline,
    ) -> BTreeSet<String> {
        tests
            .into_iter()
            .filter(|t| self.timeline(t) == timeline)
            .cloned()
            .collect()
    }

    /// Tests from `tests` carrying the given modifier
    pub fn tests_with_modifier<'a>(
        &self,
        tests: impl IntoIterator<Item = &'a String>,
        modifier: Modifier,
    ) -> BTreeSet<String> {
        tests
            .into_iter()
            .filter(|t| self.has_modifier(t, modifier))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
// Layout test expectations
BUG1 SKIP : fast/forms = PASS
BUG2 : fast/forms/select.html = FAIL
SLOW : http/tests/slow.html = PASS TIMEOUT
WONTFIX : fast/js/old.html = CRASH
DEFER MAC : fast/css/mac-only.html = IMAGE
DEBUG : fast/css/debug-only.html = TEXT
";

    fn linux_release() -> TestExpectations {
        TestExpectations::parse(SAMPLE, Platform::Linux, BuildType::Release).unwrap()
    }

    #[test]
    fn test_unlisted_test_expects_pass() {
        let expectations = linux_release();
        let expected = expectations.expected("fast/dom/a.html");
        assert_eq!(expected, &Expectation::default());
        assert!(expectations.matches("fast/dom/a.html", OutcomeKind::Pass));
        assert_eq!(expectations.timeline("fast/dom/a.html"), Timeline::Now);
    }

    #[test]
    fn test_most_specific_entry_wins() {
        let expectations = linux_release();
        assert!(expectations.has_modifier("fast/forms/input.html", Modifier::Skip));
        assert!(!expectations.has_modifier("fast/forms/select.html", Modifier::Skip));
        assert!(expectations.matches("fast/forms/select.html", OutcomeKind::Text));
    }

    #[test]
    fn test_modifiers_and_timelines() {
        let expectations = linux_release();
        assert!(expectations.has_modifier("http/tests/slow.html", Modifier::Slow));
        assert_eq!(expectations.timeline("fast/js/old.html"), Timeline::Wontfix);
        assert_eq!(
            expectations.expectations_string("http/tests/slow.html"),
            "PASS TIMEOUT"
        );
    }

    #[test]
    fn test_platform_and_build_filtering() {
        let linux = linux_release();
        assert_eq!(linux.expectations_string("fast/css/mac-only.html"), "PASS");
        assert_eq!(linux.expectations_string("fast/css/debug-only.html"), "PASS");

        let mac_debug = TestExpectations::parse(SAMPLE, Platform::Mac, BuildType::Debug).unwrap();
        assert_eq!(mac_debug.expectations_string("fast/css/mac-only.html"), "IMAGE");
        assert_eq!(mac_debug.timeline("fast/css/mac-only.html"), Timeline::Defer);
        assert_eq!(mac_debug.expectations_string("fast/css/debug-only.html"), "TEXT");
    }

    #[test]
    fn test_errors_are_collected_with_line_numbers() {
        let content = "SKIP : a.html = PASS\nBROKEN a.html\nSKIP : b.html = NOPE\n";
        match TestExpectations::parse(content, Platform::Linux, BuildType::Release) {
            Err(ExpectationsError::Invalid(errors)) => {
                let lines: Vec<_> = errors.iter().map(|e| e.line).collect();
                assert_eq!(lines, vec![2, 3]);
            }
            other => panic!("Expected invalid expectations, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let content = ": a.html = PASS\n: a.html = FAIL\n";
        assert!(TestExpectations::parse(content, Platform::Linux, BuildType::Release).is_err());

        // Distinct configurations may list the same path
        let per_platform = "MAC : a.html = PASS\nWIN : a.html = FAIL\n";
        assert!(TestExpectations::lint(per_platform).is_ok());
    }

    #[test]
    fn test_lint_reports_all_configurations() {
        assert!(TestExpectations::lint(SAMPLE).is_ok());
        let err = TestExpectations::lint("LINUX : a.html = PASS\nLINUX : a.html = TEXT\n")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate expectation for 'a.html'"));
    }

    #[test]
    fn test_set_queries() {
        let expectations = linux_release();
        let tests: Vec<String> = vec![
            "fast/forms/input.html".to_string(),
            "fast/js/old.html".to_string(),
            "http/tests/slow.html".to_string(),
        ];

        let skipped = expectations.tests_with_modifier(&tests, Modifier::Skip);
        assert_eq!(skipped.len(), 1);

        let wontfix = expectations.tests_with_timeline(&tests, Timeline::Wontfix);
        assert!(wontfix.contains("fast/js/old.html"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let expectations =
            TestExpectations::load(file.path(), Platform::Linux, BuildType::Release).unwrap();
        assert!(!expectations.is_empty());

        let missing = TestExpectations::load("/nonexistent/expectations.txt", Platform::Linux, BuildType::Release);
        assert!(matches!(missing, Err(ExpectationsError::Io { .. })));
    }
}
