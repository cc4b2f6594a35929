//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parallel layout-test runner
#[derive(Parser, Debug)]
#[command(name = "layout-runner")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.0")]
#[command(about = "Run layout tests in parallel, retry unexpected failures, and report regressions")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run layout tests
    Run(RunArgs),

    /// Check an expectations file for every platform and build type
    Lint(LintArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Tests or directories to run, relative to the suite root (default: all)
    pub paths: Vec<String>,

    /// Read the tests to run from a file, one per line (repeatable)
    #[arg(long = "test-list")]
    pub test_list: Vec<PathBuf>,

    /// Layout test suite root
    #[arg(long)]
    pub suite_root: Option<PathBuf>,

    /// Expectations file
    #[arg(short, long)]
    pub expectations: Option<PathBuf>,

    /// Test shell command; the test path is appended as the last argument
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Wrapper prepended to the test shell command (e.g. "valgrind --smc-check=all")
    #[arg(long)]
    pub wrapper: Option<String>,

    /// Number of worker tasks (default: available parallelism)
    #[arg(short = 'n', long)]
    pub num_workers: Option<usize>,

    /// Run every test as its own shard
    #[arg(long)]
    pub fully_parallel: bool,

    /// Per-test timeout in milliseconds
    #[arg(long)]
    pub time_out_ms: Option<u64>,

    /// Test a debug build (doubles the default timeout)
    #[arg(long)]
    pub debug: bool,

    /// Platform whose expectations apply (win, mac, linux)
    #[arg(long)]
    pub platform: Option<String>,

    /// Run tests marked SKIP
    #[arg(short, long)]
    pub force: bool,

    /// Run chunk n of l ("n:l"); wraps around at the end of the list
    #[arg(long, conflicts_with = "run_part")]
    pub run_chunk: Option<String>,

    /// Run part n of m ("n:m"), 1-indexed
    #[arg(long)]
    pub run_part: Option<String>,

    /// Shuffle the run order
    #[arg(long)]
    pub randomize_order: bool,

    /// Directory for result files
    #[arg(short, long)]
    pub results_directory: Option<PathBuf>,

    /// Number of slow tests listed in the timing statistics
    #[arg(long)]
    pub num_slow_tests_to_log: Option<usize>,

    /// Extra logging: "unexpected" logs unexpected results as they arrive,
    /// "timing" prints the timing statistics (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub log: Vec<String>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl RunArgs {
    pub fn logs(&self, what: &str) -> bool {
        self.log.iter().any(|l| l.eq_ignore_ascii_case(what))
    }
}

/// Arguments for the lint command
#[derive(Parser, Debug)]
pub struct LintArgs {
    /// Expectations file (default: from configuration)
    pub file: Option<PathBuf>,
}

/// Arguments for configuration management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "layout-runner.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment overrides instead
        #[arg(long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (default: first standard location)
        file: Option<PathBuf>,
    },

    /// List supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "layout-runner",
            "run",
            "fast/dom",
            "http/tests",
            "-n",
            "8",
            "--run-chunk",
            "3:5",
            "--log",
            "unexpected,timing",
            "--command",
            "out/Release/test_shell",
            "--layout-tests",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.paths, vec!["fast/dom", "http/tests"]);
                assert_eq!(run.num_workers, Some(8));
                assert_eq!(run.run_chunk.as_deref(), Some("3:5"));
                assert!(run.logs("unexpected"));
                assert!(run.logs("timing"));
                assert_eq!(run.command, vec!["out/Release/test_shell", "--layout-tests"]);
                assert_eq!(run.format, "text");
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_chunk_and_part_conflict() {
        let result = Args::try_parse_from([
            "layout-runner",
            "run",
            "--run-chunk",
            "1:2",
            "--run-part",
            "1:2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_lint_args() {
        let args = Args::parse_from(["layout-runner", "--verbose", "lint", "expectations.txt"]);
        assert!(args.verbose);
        match args.command {
            Command::Lint(lint) => assert_eq!(lint.file, Some(PathBuf::from("expectations.txt"))),
            _ => panic!("Expected Lint command"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["layout-runner", "-q", "-v", "lint"]).is_err());
        let args = Args::parse_from(["layout-runner", "lint", "--quiet"]);
        assert!(args.quiet);
    }

    #[test]
    fn test_config_init() {
        let args = Args::parse_from(["layout-runner", "config", "init", "--force"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { output, force },
            }) => {
                assert_eq!(output, PathBuf::from("layout-runner.yaml"));
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
