//! Layout Runner - parallel layout-test orchestrator
//!
//! Discovers layout tests, shards them across a pool of workers, runs each
//! test through an external test shell, retries unexpected failures once,
//! and reports regressions.
//!
//! ## Usage
//!
//! ```bash
//! # Run the whole suite with 8 workers
//! layout-runner run -n 8 --command out/Release/test_shell
//!
//! # Run part of the suite
//! layout-runner run fast/dom http/tests --run-chunk 3:5
//!
//! # Check an expectations file
//! layout-runner lint LayoutTests/test_expectations.txt
//! ```
//!
//! The exit status is the number of regressions (capped at 250), or one of
//! the reserved codes below.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod cli;
mod config;
mod discovery;
mod executor;
mod expectations;
mod models;
mod output;
mod results;
mod utils;

use cli::{Args, RunArgs};
use config::{print_env_help, EnvConfig, RunnerConfig};
use discovery::{gather_test_files, read_test_lists, ChunkMode, ChunkSpec};
use executor::{CommandExecutor, PreparedRun, RunOptions, TestRunner};
use expectations::TestExpectations;
use models::{BuildType, Platform};
use output::{OutputFormat, ResultFormatter};
use results::{ResultsDirectory, RunInfo, StoredRun};
use utils::{init_logger, LogLevel, Timer};

/// Highest exit status used for a regression count
const EXIT_MAX_REGRESSIONS: i32 = 250;
const EXIT_INTERRUPTED: i32 = 252;
const EXIT_CONFIG_ERROR: i32 = 253;
const EXIT_HARNESS_ERROR: i32 = 254;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let env = EnvConfig::load();
    init_logger(LogLevel::for_flags(
        args.verbose || env.verbose.unwrap_or(false),
        args.quiet,
    ));

    let code = match args.command {
        cli::Command::Run(run_args) => run_tests(args.config, run_args, env).await,
        cli::Command::Lint(lint_args) => match lint_expectations(args.config, lint_args, &env) {
            Ok(()) => 0,
            Err(e) => {
                error!("{e:#}");
                EXIT_CONFIG_ERROR
            }
        },
        cli::Command::Config(config_args) => {
            match manage_config(config_args, args.config.as_deref(), &env) {
                Ok(()) => 0,
                Err(e) => {
                    error!("{e:#}");
                    EXIT_CONFIG_ERROR
                }
            }
        }
    };

    std::process::exit(code);
}

/// Everything needed to start a run, resolved before any test executes
struct RunSetup {
    config: RunnerConfig,
    runner: TestRunner,
    prepared: PreparedRun,
    formatter: ResultFormatter,
    results: ResultsDirectory,
    log_timing: bool,
}

async fn run_tests(config_path: Option<PathBuf>, args: RunArgs, env: EnvConfig) -> i32 {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping workers");
            interrupt.cancel();
        }
    });

    let setup = match setup_run(config_path, &args, &env, cancel) {
        Ok(setup) => setup,
        Err(e) => {
            error!("{e:#}");
            return EXIT_CONFIG_ERROR;
        }
    };

    if setup.formatter.format() == OutputFormat::Text {
        print!(
            "{}",
            setup
                .formatter
                .format_expected(&setup.prepared, setup.runner.expectations())
        );
    }

    if setup.prepared.chunk.is_some() {
        if let Err(e) = setup.results.write_tests_run(&setup.prepared.test_paths()) {
            error!("{e:#}");
            return EXIT_HARNESS_ERROR;
        }
    }

    let info = RunInfo {
        started_at: Utc::now(),
        platform: setup.config.platform().to_string(),
        build_type: setup.config.build_type.to_string(),
        num_workers: setup.config.workers(),
    };

    let report = match setup.runner.run(&setup.prepared).await {
        Ok(report) => report,
        Err(e) if e.is_interrupt() => {
            warn!("Run interrupted; no results written");
            return EXIT_INTERRUPTED;
        }
        Err(e) => {
            error!("Fatal: {e}");
            return EXIT_HARNESS_ERROR;
        }
    };

    let stored = StoredRun::build(
        &info,
        report.elapsed,
        &report.first,
        report.retry.as_ref(),
        setup.runner.expectations(),
        Some(report.timing.clone()),
    );
    let written = setup
        .results
        .write_unexpected_results(&report.unexpected)
        .and_then(|_| setup.results.write_full_results(&stored));
    if let Err(e) = written {
        error!("{e:#}");
        return EXIT_HARNESS_ERROR;
    }

    println!("{}", setup.formatter.format_report(&report));
    if setup.log_timing && setup.formatter.format() == OutputFormat::Text {
        println!("{}", setup.formatter.format_timing(&report.timing));
        print!("{}", setup.formatter.format_retry_timing(&report.retry_workers));
    }

    info!(
        "Finished in {:.1}s: {} regressions, {} flaky, {} unexpected passes; results in {}",
        report.elapsed.as_secs_f64(),
        report.unexpected.num_regressions,
        report.unexpected.num_flaky,
        report.unexpected.num_passes,
        setup.results.path().display()
    );
    if !report.unexpected.has_regressions() {
        return 0;
    }

    report
        .unexpected
        .num_regressions
        .min(EXIT_MAX_REGRESSIONS as usize) as i32
}

fn setup_run(
    config_path: Option<PathBuf>,
    args: &RunArgs,
    env: &EnvConfig,
    cancel: CancellationToken,
) -> Result<RunSetup> {
    let mut config = load_config(config_path.as_deref(), env)?;
    apply_run_args(&mut config, args)?;
    config.validate()?;

    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;
    let mut formatter = ResultFormatter::new(format);
    if args.no_color {
        formatter = formatter.no_color();
    }

    let chunk = match (&args.run_chunk, &args.run_part) {
        (Some(value), _) => Some(ChunkSpec::parse(ChunkMode::Chunk, value)?),
        (None, Some(value)) => Some(ChunkSpec::parse(ChunkMode::Part, value)?),
        (None, None) => None,
    };

    let expectations = match config.expectations_path() {
        Some(path) => TestExpectations::load(&path, config.platform(), config.build_type)
            .with_context(|| format!("Invalid expectations in {}", path.display()))?,
        None => TestExpectations::empty(),
    };
    info!(
        "Loaded {} expectations for {} {}",
        expectations.len(),
        config.platform(),
        config.build_type
    );

    let executor = CommandExecutor::new(config.command_line(), &config.suite_root)
        .context("Set a test shell with --command or the `command` config key")?;

    let mut paths = args.paths.clone();
    paths.extend(read_test_lists(&args.test_list)?);

    let timer = Timer::start("discovery");
    let test_files = gather_test_files(&config.suite_root, &paths)?;
    let discovery_time = timer.stop();
    info!(
        "Gathered {} test files in {:.2}s",
        test_files.len(),
        discovery_time.as_secs_f64()
    );
    if test_files.is_empty() {
        warn!("No tests found under {}", config.suite_root.display());
    }

    let runner = TestRunner::new(
        config.clone(),
        Arc::new(expectations),
        Arc::new(executor),
        cancel,
    )
    .with_options(RunOptions {
        force: args.force,
        randomize_order: args.randomize_order,
        chunk,
        log_unexpected: args.logs("unexpected"),
    });
    let prepared = runner.prepare(test_files)?;

    Ok(RunSetup {
        results: ResultsDirectory::new(&config.results_directory),
        config,
        runner,
        prepared,
        formatter,
        log_timing: args.logs("timing"),
    })
}

/// File, then environment, in increasing precedence
fn load_config(config_path: Option<&Path>, env: &EnvConfig) -> Result<RunnerConfig> {
    let path = config_path
        .map(Path::to_path_buf)
        .or_else(|| env.config_file.as_deref().map(config::expand_path));

    let mut config = match path {
        Some(path) => RunnerConfig::load(&path)?,
        None => RunnerConfig::load_default()?,
    };
    config.apply_env(env);
    Ok(config)
}

/// CLI flags override everything else
fn apply_run_args(config: &mut RunnerConfig, args: &RunArgs) -> Result<()> {
    if let Some(root) = &args.suite_root {
        config.suite_root = root.clone();
    }
    if let Some(file) = &args.expectations {
        let file = if file.is_absolute() {
            file.clone()
        } else {
            std::env::current_dir()?.join(file)
        };
        config.expectations_file = Some(file);
    }
    if !args.command.is_empty() {
        config.command = args.command.clone();
    }
    if let Some(wrapper) = &args.wrapper {
        config.wrapper = Some(wrapper.clone());
    }
    if let Some(workers) = args.num_workers {
        config.num_workers = Some(workers);
    }
    if args.fully_parallel {
        config.fully_parallel = true;
    }
    if let Some(timeout) = args.time_out_ms {
        config.time_out_ms = Some(timeout);
    }
    if args.debug {
        config.build_type = BuildType::Debug;
    }
    if let Some(name) = &args.platform {
        let platform =
            Platform::from_str(name).ok_or_else(|| anyhow::anyhow!("Unknown platform: {name}"))?;
        config.platform = Some(platform);
    }
    if let Some(dir) = &args.results_directory {
        config.results_directory = dir.clone();
    }
    if let Some(count) = args.num_slow_tests_to_log {
        config.num_slow_tests_to_log = count;
    }
    Ok(())
}

fn lint_expectations(config_path: Option<PathBuf>, args: cli::LintArgs, env: &EnvConfig) -> Result<()> {
    let path = match args.file {
        Some(file) => file,
        None => load_config(config_path.as_deref(), env)?
            .expectations_path()
            .ok_or_else(|| anyhow::anyhow!("No expectations file given or configured"))?,
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    TestExpectations::lint(&content)
        .with_context(|| format!("Lint failed for {}", path.display()))?;

    println!("✓ Expectations file is valid: {}", path.display());
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, config_path: Option<&Path>, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            RunnerConfig::example().save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env: show_env, format } => {
            if show_env {
                env.print_summary();
            } else {
                let config = load_config(config_path, env)?;
                let output = if format == "json" {
                    serde_json::to_string_pretty(&config)?
                } else {
                    serde_yaml::to_string(&config)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| config_path.map(Path::to_path_buf))
                .or_else(config::find_config_file)
                .ok_or_else(|| anyhow::anyhow!("No configuration file found"))?;

            match RunnerConfig::load(&path) {
                Ok(_) => println!("✓ Configuration file is valid: {}", path.display()),
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => print_env_help(),
    }

    Ok(())
}
