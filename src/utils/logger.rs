//! Logging setup
//!
//! Logs go to stderr so stdout stays clean for `--format json`. Progress
//! lines are `info!`, per-test chatter is `debug!`.

use tracing_subscriber::EnvFilter;

/// How much the runner itself logs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// Warnings and errors only
    Quiet,
    /// Progress and the run summary
    Normal,
    /// Shard, worker and per-test details
    Verbose,
}

impl LogLevel {
    /// `--quiet` wins over `--verbose`
    pub fn for_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (_, true) => LogLevel::Quiet,
            (true, false) => LogLevel::Verbose,
            (false, false) => LogLevel::Normal,
        }
    }

    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Quiet => "layout_runner=warn",
            LogLevel::Normal => "layout_runner=info",
            LogLevel::Verbose => "layout_runner=debug",
        }
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, replaces `level`.
pub fn init_logger(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
