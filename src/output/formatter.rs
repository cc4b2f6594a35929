//! Output formatters for run results
//!
//! Renders the pre-run expectation counts, the timing statistics, and the
//! final results either as text for a terminal or as the JSON report.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::executor::{PreparedRun, RunReport};
use crate::expectations::TestExpectations;
use crate::models::{Expectation, ExpectedResult, Modifier, OutcomeKind, Timeline};
use crate::results::{Classification, ResultSummary, TimingReport, UnexpectedResults, WorkerStats};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    /// What is about to run and how many results of each class are expected
    pub fn format_expected(&self, prepared: &PreparedRun, expectations: &TestExpectations) -> String {
        let mut output = String::new();
        writeln!(output, "Found: {} tests", prepared.found).unwrap();
        if let Some(chunk) = &prepared.chunk {
            writeln!(output, "{chunk}").unwrap();
        }

        let scope: BTreeSet<String> = prepared.summary_scope().collect();
        let by_timeline: Vec<BTreeSet<String>> = Timeline::all()
            .into_iter()
            .map(|t| expectations.tests_with_timeline(&scope, t))
            .collect();

        let classes: [(&str, fn(&Expectation) -> bool); 4] = [
            ("passes", |e| e.results == BTreeSet::from([ExpectedResult::Pass])),
            ("failures", |e| !e.results.contains(&ExpectedResult::Pass)),
            ("flaky", |e| e.results.len() > 1 && e.results.contains(&ExpectedResult::Pass)),
            ("skipped", |e| e.has_modifier(Modifier::Skip)),
        ];

        let width = |set: &BTreeSet<String>| set.len().to_string().len();
        for (label, predicate) in classes.iter() {
            let tests: BTreeSet<&String> = scope
                .iter()
                .filter(|t| predicate(expectations.expected(t)))
                .collect();
            let counts: Vec<usize> = by_timeline
                .iter()
                .map(|bucket| tests.iter().filter(|t| bucket.contains(t.as_str())).count())
                .collect();
            writeln!(
                output,
                "Expect: {:5} {:<8} ({:>w0$} now, {:>w1$} defer, {:>w2$} wontfix)",
                tests.len(),
                label,
                counts[0],
                counts[1],
                counts[2],
                w0 = width(&by_timeline[0]),
                w1 = width(&by_timeline[1]),
                w2 = width(&by_timeline[2]),
            )
            .unwrap();
        }
        output
    }

    /// Timing statistics of the first pass
    pub fn format_timing(&self, timing: &TimingReport) -> String {
        let mut output = String::new();
        writeln!(output, "Total time: {:.1}s", timing.total_time.as_secs_f64()).unwrap();
        writeln!(output, "Worker timing:").unwrap();
        write_workers(&mut output, &timing.workers);
        writeln!(
            output,
            "   {:6.1} cumulative, {:6.1} optimal",
            timing.cumulative_time.as_secs_f64(),
            timing.optimal_time.as_secs_f64()
        )
        .unwrap();

        writeln!(output, "Per-test timing ({} tests): {}", timing.per_test.count, timing.per_test.format_summary()).unwrap();

        let sections = [
            ("slowest tests", &timing.slowest_tests),
            ("tests marked SLOW", &timing.slow_tests),
            ("tests that timed out or crashed", &timing.timeout_or_crash),
        ];
        for (heading, tests) in sections {
            if tests.is_empty() {
                continue;
            }
            writeln!(output, "{} ({}):", heading, tests.len()).unwrap();
            for test in tests.iter() {
                writeln!(output, "  {:8.3}s {}", test.duration.as_secs_f64(), test.test).unwrap();
            }
        }

        if !timing.slow_shards.is_empty() {
            writeln!(output, "Directories that took longer than 10s:").unwrap();
            for shard in &timing.slow_shards {
                writeln!(
                    output,
                    "  {:8.1}s {} ({} tests)",
                    shard.duration.as_secs_f64(),
                    shard.label,
                    shard.num_tests
                )
                .unwrap();
            }
        }
        output
    }

    /// Worker timing of the retry pass; empty when no retry ran
    pub fn format_retry_timing(&self, workers: &[WorkerStats]) -> String {
        let mut output = String::new();
        if workers.is_empty() {
            return output;
        }
        let retried: usize = workers.iter().map(|w| w.num_tests).sum();
        writeln!(output, "Retry worker timing ({retried} tests):").unwrap();
        write_workers(&mut output, workers);
        output
    }

    /// Pass rate and per-timeline breakdown of the first pass
    pub fn format_summary(&self, summary: &ResultSummary) -> String {
        let mut output = String::new();

        let total = summary.total();
        let passed = summary.tests_with_outcome(OutcomeKind::Pass).len();
        let pct = if total > 0 {
            passed as f64 * 100.0 / total as f64
        } else {
            0.0
        };

        writeln!(output).unwrap();
        writeln!(output, "=> Results: {passed}/{total} tests passed ({pct:.1}%)").unwrap();

        let headings = [
            (Timeline::Now, "Tests to be fixed for the current release"),
            (Timeline::Defer, "Tests we'll fix in the future if they fail (DEFER)"),
            (Timeline::Wontfix, "Tests that will only be fixed if they crash (WONTFIX)"),
        ];
        for (timeline, heading) in headings {
            writeln!(output).unwrap();
            self.write_timeline_entry(&mut output, summary, timeline, heading);
        }
        output
    }

    fn write_timeline_entry(
        &self,
        output: &mut String,
        summary: &ResultSummary,
        timeline: Timeline,
        heading: &str,
    ) {
        let tests = summary.tests_with_timeline(timeline);
        let passing = tests
            .iter()
            .filter(|t| summary.result(t) == Some(OutcomeKind::Pass))
            .count();
        let not_passing = tests.len() - passing;
        writeln!(output, "=> {heading} ({not_passing}):").unwrap();
        if not_passing == 0 {
            return;
        }

        for kind in OutcomeKind::all() {
            if kind == OutcomeKind::Pass {
                continue;
            }
            let count = tests
                .iter()
                .filter(|t| summary.result(t) == Some(kind))
                .count();
            if count > 0 {
                let pct = count as f64 * 100.0 / not_passing as f64;
                writeln!(output, "  {:5} {:<24} ({:4.1}%)", count, kind.description(count != 1), pct).unwrap();
            }
        }
    }

    /// `All N tests ran as expected.` or the expected/unexpected split
    pub fn format_one_line_summary(&self, total: usize, expected: usize) -> String {
        let unexpected = total - expected;
        if unexpected == 0 {
            self.paint(&format!("All {expected} tests ran as expected."), "32")
        } else if expected == 1 {
            format!("1 test ran as expected, {unexpected} didn't:")
        } else {
            format!("{expected} tests ran as expected, {unexpected} didn't:")
        }
    }

    /// Unexpected passes, flaky tests and regressions
    pub fn format_unexpected(&self, unexpected: &UnexpectedResults) -> String {
        let mut output = String::new();
        if unexpected.tests.is_empty() {
            return output;
        }
        writeln!(output).unwrap();

        let mut passes: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut flaky: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut regressions: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (test, entry) in &unexpected.tests {
            let actual: Vec<&str> = entry.actual.split(' ').collect();
            let expected: Vec<&str> = entry.expected.split(' ').collect();
            match entry.classification {
                Some(Classification::UnexpectedPass) => {
                    let key = if expected.contains(&"CRASH") {
                        "Expected to crash, but passed"
                    } else if expected.contains(&"TIMEOUT") {
                        "Expected to timeout, but passed"
                    } else {
                        "Expected to fail, but passed"
                    };
                    passes.entry(key).or_default().push(test);
                }
                Some(Classification::Flaky) => {
                    flaky.entry(actual[0]).or_default().push(test);
                }
                _ => {
                    regressions.entry(entry.actual.as_str()).or_default().push(test);
                }
            }
        }

        for (key, tests) in &passes {
            writeln!(output, "{}", self.paint(&format!("{}: ({})", key, tests.len()), "32")).unwrap();
            for test in tests {
                writeln!(output, "  {test}").unwrap();
            }
            writeln!(output).unwrap();
        }

        for (tag, tests) in &flaky {
            let heading = format!("Unexpected flakiness: {} ({})", describe_tag(tag), tests.len());
            writeln!(output, "{}", self.paint(&heading, "33")).unwrap();
            for test in tests {
                let entry = &unexpected.tests[*test];
                let merged: BTreeSet<&str> = entry
                    .actual
                    .split(' ')
                    .chain(entry.expected.split(' '))
                    .collect();
                writeln!(output, "  {} = {}", test, merged.into_iter().collect::<Vec<_>>().join(" ")).unwrap();
            }
            writeln!(output).unwrap();
        }

        for (tag, tests) in &regressions {
            let heading = format!("Regressions: Unexpected {} : ({})", describe_tag(tag), tests.len());
            writeln!(output, "{}", self.paint(&heading, "31")).unwrap();
            for test in tests {
                writeln!(output, "  {test} = {tag}").unwrap();
            }
            writeln!(output).unwrap();
        }
        output
    }

    /// Everything printed after a completed run
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => report.unexpected.to_json().unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = self.format_summary(&report.first);
                writeln!(output).unwrap();
                writeln!(
                    output,
                    "{}",
                    self.format_one_line_summary(report.first.total(), report.first.expected())
                )
                .unwrap();
                output.push_str(&self.format_unexpected(&report.unexpected));
                output
            }
        }
    }
}

fn write_workers(output: &mut String, workers: &[WorkerStats]) {
    for worker in workers {
        writeln!(
            output,
            "    {:<12} # tests: {:5}  time: {:7.1}s",
            worker.name,
            worker.num_tests,
            worker.total_time.as_secs_f64()
        )
        .unwrap();
    }
}

fn describe_tag(tag: &str) -> &'static str {
    OutcomeKind::from_tag(tag)
        .map(|kind| kind.description(true))
        .unwrap_or("results")
}
