//! Configuration module
//!
//! Handles loading and managing runner configuration. Values come from a
//! config file, then `LAYOUT_RUNNER_*` environment variables, then CLI flags.

#![allow(dead_code)]

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{expand_path, find_config_file};

use file::is_yaml_file;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{BuildType, Platform};

/// Per-test timeout when none is configured, matching the test shell default
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 6 * 1000;

/// Runner configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Version of config file format
    pub version: String,

    /// Number of parallel workers (defaults to available cores)
    pub num_workers: Option<usize>,

    /// Per-test timeout in milliseconds (defaults by build type)
    pub time_out_ms: Option<u64>,

    /// Multiplier applied to the timeout of tests marked SLOW
    pub slow_timeout_multiplier: u32,

    /// Build type of the binary under test
    pub build_type: BuildType,

    /// Platform for expectations (defaults to the host platform)
    pub platform: Option<Platform>,

    /// Root directory of the test suite
    pub suite_root: PathBuf,

    /// Top-level directory whose tests need the HTTP helper server
    pub protocol_dir: String,

    /// Keep protocol tests in one shard scheduled first
    /// (defaults to true on platforms where they are unstable when split)
    pub isolate_protocol_dir: Option<bool>,

    /// Run every test as its own shard
    pub fully_parallel: bool,

    /// Directory receiving result files
    pub results_directory: PathBuf,

    /// Expectations file (relative paths are resolved against the suite root)
    pub expectations_file: Option<PathBuf>,

    /// Test shell command and leading arguments
    pub command: Vec<String>,

    /// Wrapper command placed before the test shell, split on whitespace
    pub wrapper: Option<String>,

    /// Number of slow tests listed in the timing report
    pub num_slow_tests_to_log: usize,

    /// Interval between progress updates while draining results
    pub progress_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            num_workers: None,
            time_out_ms: None,
            slow_timeout_multiplier: 5,
            build_type: BuildType::Release,
            platform: None,
            suite_root: PathBuf::from("LayoutTests"),
            protocol_dir: "http".to_string(),
            isolate_protocol_dir: None,
            fully_parallel: false,
            results_directory: PathBuf::from("layout-test-results"),
            expectations_file: None,
            command: Vec::new(),
            wrapper: None,
            num_slow_tests_to_log: 50,
            progress_interval_ms: 100,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from the first standard location, or defaults if none exists
    pub fn load_default() -> Result<Self> {
        match find_config_file() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }
        if self.num_workers == Some(0) {
            anyhow::bail!("num_workers must be at least 1");
        }
        if self.time_out_ms == Some(0) {
            anyhow::bail!("time_out_ms must be greater than zero");
        }
        if self.slow_timeout_multiplier == 0 {
            anyhow::bail!("slow_timeout_multiplier must be at least 1");
        }
        if self.protocol_dir.is_empty() || self.protocol_dir.contains('/') {
            anyhow::bail!(
                "protocol_dir must be a single top-level directory name, got '{}'",
                self.protocol_dir
            );
        }
        Ok(())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(workers) = env.workers {
            self.num_workers = Some(workers);
        }
        if let Some(timeout) = env.time_out_ms {
            self.time_out_ms = Some(timeout);
        }
        if let Some(dir) = &env.results_directory {
            self.results_directory = PathBuf::from(dir);
        }
        if let Some(root) = &env.suite_root {
            self.suite_root = PathBuf::from(root);
        }
        if let Some(platform) = env.platform.as_deref().and_then(Platform::from_str) {
            self.platform = Some(platform);
        }
        if let Some(fully_parallel) = env.fully_parallel {
            self.fully_parallel = fully_parallel;
        }
    }

    /// Worker pool size
    pub fn workers(&self) -> usize {
        self.num_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }

    /// Whether protocol tests stay in one forced-first shard
    pub fn isolate_protocol_dir(&self) -> bool {
        self.isolate_protocol_dir
            .unwrap_or_else(|| self.platform() == Platform::Win)
    }

    /// Regular per-test timeout
    pub fn test_timeout(&self) -> Duration {
        let ms = self.time_out_ms.unwrap_or(match self.build_type {
            BuildType::Debug => 2 * DEFAULT_TEST_TIMEOUT_MS,
            BuildType::Release => DEFAULT_TEST_TIMEOUT_MS,
        });
        Duration::from_millis(ms)
    }

    /// Timeout for tests marked SLOW
    pub fn slow_test_timeout(&self) -> Duration {
        self.test_timeout() * self.slow_timeout_multiplier
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    /// Expectations file path, resolved against the suite root
    pub fn expectations_path(&self) -> Option<PathBuf> {
        self.expectations_file.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.suite_root.join(p)
            }
        })
    }

    /// Full command line for the test shell, wrapper first
    pub fn command_line(&self) -> Vec<String> {
        let mut line: Vec<String> = self
            .wrapper
            .as_deref()
            .map(|w| w.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        line.extend(self.command.iter().cloned());
        line
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            num_workers: Some(4),
            expectations_file: Some(PathBuf::from("test_expectations.txt")),
            command: vec!["out/Release/test_shell".to_string(), "--layout-tests".to_string()],
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.test_timeout(), Duration::from_millis(6000));
        assert_eq!(config.slow_test_timeout(), Duration::from_millis(30000));
        assert_eq!(config.protocol_dir, "http");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_build_doubles_timeout() {
        let config = RunnerConfig {
            build_type: BuildType::Debug,
            ..RunnerConfig::default()
        };
        assert_eq!(config.test_timeout(), Duration::from_millis(12000));

        let explicit = RunnerConfig {
            build_type: BuildType::Debug,
            time_out_ms: Some(1000),
            ..RunnerConfig::default()
        };
        assert_eq!(explicit.test_timeout(), Duration::from_millis(1000));
        assert_eq!(explicit.slow_test_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_isolation_defaults_by_platform() {
        let win = RunnerConfig {
            platform: Some(Platform::Win),
            ..RunnerConfig::default()
        };
        assert!(win.isolate_protocol_dir());

        let linux = RunnerConfig {
            platform: Some(Platform::Linux),
            ..RunnerConfig::default()
        };
        assert!(!linux.isolate_protocol_dir());

        let forced = RunnerConfig {
            platform: Some(Platform::Linux),
            isolate_protocol_dir: Some(true),
            ..RunnerConfig::default()
        };
        assert!(forced.isolate_protocol_dir());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_workers = RunnerConfig {
            num_workers: Some(0),
            ..RunnerConfig::default()
        };
        assert!(zero_workers.validate().is_err());

        let nested_protocol_dir = RunnerConfig {
            protocol_dir: "http/tests".to_string(),
            ..RunnerConfig::default()
        };
        assert!(nested_protocol_dir.validate().is_err());

        let bad_version = RunnerConfig {
            version: "9.9".to_string(),
            ..RunnerConfig::default()
        };
        assert!(bad_version.validate().is_err());
    }

    #[test]
    fn test_command_line_with_wrapper() {
        let config = RunnerConfig {
            wrapper: Some("valgrind --smc-check=all".to_string()),
            command: vec!["test_shell".to_string()],
            ..RunnerConfig::default()
        };
        assert_eq!(
            config.command_line(),
            vec!["valgrind", "--smc-check=all", "test_shell"]
        );
    }

    #[test]
    fn test_expectations_path_resolution() {
        let config = RunnerConfig::example();
        assert_eq!(
            config.expectations_path(),
            Some(PathBuf::from("LayoutTests/test_expectations.txt"))
        );
    }

    #[test]
    fn test_save_load_yaml_and_json() {
        let dir = tempdir().unwrap();
        let config = RunnerConfig::example();

        for name in ["config.yaml", "config.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            let loaded = RunnerConfig::load(&path).unwrap();
            assert_eq!(loaded.num_workers, Some(4));
            assert_eq!(loaded.command, config.command);
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.yaml");
        std::fs::write(&path, "num_workers: 2\nfully_parallel: true\n").unwrap();

        let loaded = RunnerConfig::load(&path).unwrap();
        assert_eq!(loaded.workers(), 2);
        assert!(loaded.fully_parallel);
        assert_eq!(loaded.num_slow_tests_to_log, 50);
    }

    #[test]
    fn test_apply_env() {
        let mut config = RunnerConfig::default();
        let env = EnvConfig {
            workers: Some(3),
            time_out_ms: Some(2500),
            platform: Some("mac".to_string()),
            ..Default::default()
        };
        config.apply_env(&env);

        assert_eq!(config.workers(), 3);
        assert_eq!(config.test_timeout(), Duration::from_millis(2500));
        assert_eq!(config.platform(), Platform::Mac);
    }
}
