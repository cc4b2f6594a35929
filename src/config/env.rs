//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "LAYOUT_RUNNER";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Worker count from LAYOUT_RUNNER_WORKERS
    pub workers: Option<usize>,
    /// Per-test timeout from LAYOUT_RUNNER_TIMEOUT_MS
    pub time_out_ms: Option<u64>,
    /// Results directory from LAYOUT_RUNNER_RESULTS_DIR
    pub results_directory: Option<String>,
    /// Suite root from LAYOUT_RUNNER_SUITE_ROOT
    pub suite_root: Option<String>,
    /// Platform from LAYOUT_RUNNER_PLATFORM
    pub platform: Option<String>,
    /// Fully parallel mode from LAYOUT_RUNNER_FULLY_PARALLEL
    pub fully_parallel: Option<bool>,
    /// Config file from LAYOUT_RUNNER_CONFIG
    pub config_file: Option<String>,
    /// Verbose from LAYOUT_RUNNER_VERBOSE
    pub verbose: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            workers: get_env_parse("WORKERS"),
            time_out_ms: get_env_parse("TIMEOUT_MS"),
            results_directory: get_env("RESULTS_DIR"),
            suite_root: get_env("SUITE_ROOT"),
            platform: get_env("PLATFORM"),
            fully_parallel: get_env_bool("FULLY_PARALLEL"),
            config_file: get_env("CONFIG"),
            verbose: get_env_bool("VERBOSE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.workers.is_some()
            || self.time_out_ms.is_some()
            || self.results_directory.is_some()
            || self.suite_root.is_some()
            || self.platform.is_some()
            || self.fully_parallel.is_some()
            || self.config_file.is_some()
            || self.verbose.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_WORKERS:        {:?}", ENV_PREFIX, self.workers);
        println!("  {}_TIMEOUT_MS:     {:?}", ENV_PREFIX, self.time_out_ms);
        println!("  {}_RESULTS_DIR:    {:?}", ENV_PREFIX, self.results_directory);
        println!("  {}_SUITE_ROOT:     {:?}", ENV_PREFIX, self.suite_root);
        println!("  {}_PLATFORM:       {:?}", ENV_PREFIX, self.platform);
        println!("  {}_FULLY_PARALLEL: {:?}", ENV_PREFIX, self.fully_parallel);
        println!("  {}_CONFIG:         {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_VERBOSE:        {:?}", ENV_PREFIX, self.verbose);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all LAYOUT_RUNNER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_WORKERS         Number of parallel workers");
    println!("  {ENV_PREFIX}_TIMEOUT_MS      Per-test timeout in milliseconds");
    println!("  {ENV_PREFIX}_RESULTS_DIR     Directory receiving result files");
    println!("  {ENV_PREFIX}_SUITE_ROOT      Root directory of the test suite");
    println!("  {ENV_PREFIX}_PLATFORM        Expectations platform (win, mac, linux)");
    println!("  {ENV_PREFIX}_FULLY_PARALLEL  Run every test as its own shard (true/false)");
    println!("  {ENV_PREFIX}_CONFIG          Path to configuration file");
    println!("  {ENV_PREFIX}_VERBOSE         Enable debug logging (true/false)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_WORKERS=8");
    println!("  layout-runner run fast/css");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sets variables for the life of the guard, restoring previous values on drop
    struct EnvGuard {
        previous: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn set(vars: &[(&str, &str)]) -> Self {
            let previous = vars
                .iter()
                .map(|(k, v)| {
                    let key = format!("{ENV_PREFIX}_{k}");
                    let old = env::var(&key).ok();
                    env::set_var(&key, v);
                    (key, old)
                })
                .collect();
            Self { previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.previous {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.workers.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_load_and_parse() {
        let _guard = EnvGuard::set(&[
            ("WORKERS", "6"),
            ("TIMEOUT_MS", "not-a-number"),
            ("FULLY_PARALLEL", "yes"),
        ]);

        let config = EnvConfig::load();
        assert_eq!(config.workers, Some(6));
        assert_eq!(config.time_out_ms, None);
        assert_eq!(config.fully_parallel, Some(true));
        assert!(config.has_any());
    }
}
