//! Shard builder
//!
//! Partitions the tests of a pass into ordered shards for the worker pool.
//! Priority is fixed here by shard order; the queue itself is plain FIFO.

use std::collections::BTreeMap;

use crate::config::RunnerConfig;
use crate::models::{Shard, TestUnit};

/// Label used for singleton shards and for tests at the suite root
pub const ROOT_LABEL: &str = ".";

/// How to partition tests into shards
#[derive(Clone, Debug)]
pub struct ShardOptions {
    /// One shard per test
    pub fully_parallel: bool,
    pub num_workers: usize,
    /// Top-level directory of tests that need the protocol helper server
    pub protocol_dir: String,
    /// Keep the protocol directory as a single shard that always runs first
    pub isolate_protocol_dir: bool,
}

impl ShardOptions {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            fully_parallel: config.fully_parallel,
            num_workers: config.workers(),
            protocol_dir: config.protocol_dir.clone(),
            isolate_protocol_dir: config.isolate_protocol_dir(),
        }
    }

    /// Grouping key for a test path relative to the suite root
    pub fn group_for(&self, test: &str) -> String {
        let dir = match test.rfind('/') {
            Some(idx) => &test[..idx],
            None => return ROOT_LABEL.to_string(),
        };

        if self.isolate_protocol_dir {
            let top = dir.split('/').next().unwrap_or(dir);
            if top == self.protocol_dir {
                return self.protocol_dir.clone();
            }
        }
        dir.to_string()
    }

    fn is_forced_first(&self, label: &str) -> bool {
        self.isolate_protocol_dir && label == self.protocol_dir
    }
}

impl Default for ShardOptions {
    fn default() -> Self {
        Self {
            fully_parallel: false,
            num_workers: 1,
            protocol_dir: "http".to_string(),
            isolate_protocol_dir: false,
        }
    }
}

/// Partition `tests` into the shard sequence for one pass.
///
/// Directory groups keep their tests in reverse discovery order and are
/// ordered by descending size, with the isolated protocol group first.
pub fn build_shards(tests: Vec<TestUnit>, options: &ShardOptions) -> Vec<Shard> {
    if options.fully_parallel || options.num_workers <= 1 {
        return tests
            .into_iter()
            .map(|test| Shard::new(ROOT_LABEL, vec![test]))
            .collect();
    }

    let mut groups: BTreeMap<String, Vec<TestUnit>> = BTreeMap::new();
    for test in tests {
        groups.entry(options.group_for(&test.path)).or_default().push(test);
    }

    let mut forced_first = None;
    let mut shards = Vec::with_capacity(groups.len());
    for (label, mut group) in groups {
        group.reverse();
        let shard = Shard::new(label, group);
        if options.is_forced_first(&shard.label) {
            forced_first = Some(shard);
        } else {
            shards.push(shard);
        }
    }

    // Stable sort: equal sizes stay in label order.
    shards.sort_by(|a, b| b.len().cmp(&a.len()));

    if let Some(shard) = forced_first {
        shards.insert(0, shard);
    }
    shards
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn units(paths: &[&str]) -> Vec<TestUnit> {
        paths
            .iter()
            .map(|p| TestUnit::new(*p, Duration::from_millis(6000)))
            .collect()
    }

    fn options(workers: usize, isolate: bool) -> ShardOptions {
        ShardOptions {
            num_workers: workers,
            isolate_protocol_dir: isolate,
            ..Default::default()
        }
    }

    fn labels(shards: &[Shard]) -> Vec<&str> {
        shards.iter().map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn test_protocol_dir_first_then_descending_size() {
        let tests = units(&[
            "A/1.html",
            "A/2.html",
            "A/3.html",
            "A/4.html",
            "A/5.html",
            "B/1.html",
            "B/2.html",
            "http/tests/a/1.html",
            "http/tests/b/2.html",
            "http/tests/3.html",
        ]);

        let shards = build_shards(tests, &options(4, true));
        assert_eq!(labels(&shards), vec!["http", "A", "B"]);
        assert_eq!(shards[0].len(), 3);
        assert_eq!(shards[1].len(), 5);
        assert_eq!(shards[2].len(), 2);
    }

    #[test]
    fn test_protocol_dir_split_when_not_isolated() {
        let tests = units(&[
            "http/tests/a/1.html",
            "http/tests/a/2.html",
            "http/tests/b/1.html",
            "fast/1.html",
        ]);

        let shards = build_shards(tests, &options(4, false));
        assert_eq!(labels(&shards), vec!["http/tests/a", "fast", "http/tests/b"]);
    }

    #[test]
    fn test_nested_directories_group_separately() {
        let tests = units(&["fast/dom/1.html", "fast/dom/2.html", "fast/css/1.html"]);
        let shards = build_shards(tests, &options(2, true));
        assert_eq!(labels(&shards), vec!["fast/dom", "fast/css"]);
    }

    #[test]
    fn test_reverse_order_within_group() {
        let tests = units(&["A/1.html", "A/2.html", "A/3.html"]);
        let shards = build_shards(tests, &options(2, false));

        let order: Vec<&str> = shards[0].tests.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(order, vec!["A/3.html", "A/2.html", "A/1.html"]);
    }

    #[test]
    fn test_fully_parallel_yields_singletons() {
        let tests = units(&["A/1.html", "A/2.html", "B/1.html", "http/tests/1.html"]);
        let opts = ShardOptions {
            fully_parallel: true,
            ..options(4, true)
        };

        let shards = build_shards(tests, &opts);
        assert_eq!(shards.len(), 4);
        assert!(shards.iter().all(|s| s.len() == 1));
    }

    #[test]
    fn test_single_worker_yields_singletons() {
        let shards = build_shards(units(&["A/1.html", "A/2.html"]), &options(1, false));
        assert_eq!(shards.len(), 2);
        assert!(shards.iter().all(|s| s.len() == 1 && s.label == ROOT_LABEL));
    }

    #[test]
    fn test_empty_input() {
        assert!(build_shards(Vec::new(), &options(4, true)).is_empty());
        assert!(build_shards(Vec::new(), &options(1, true)).is_empty());
    }

    #[test]
    fn test_root_level_tests() {
        let opts = options(4, true);
        assert_eq!(opts.group_for("top.html"), ".");
        assert_eq!(opts.group_for("http/tests/x.html"), "http");
        assert_eq!(opts.group_for("httpfoo/x.html"), "httpfoo");
    }
}
