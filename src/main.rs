//! Test Orchestrator - concurrent UI and API test runner
//!
//! Discovers test units from a manifest, runs them under a concurrency bound,
//! retries transient failures with linear backoff, and reports the outcome.
//!
//! ## Features
//!
//! - Bounded-concurrency scheduling with a shared work queue
//! - Retries for timeouts and network errors, never for assertion failures
//! - Pooled browser sessions and per-endpoint keep-alive HTTP agents
//! - Grouped console output and a persisted JSON report
//!
//! ## Usage
//!
//! ```bash
//! # Create a sample manifest and config
//! test-orchestrator init
//!
//! # Run every unit
//! test-orchestrator run
//!
//! # Run API units on 8 workers without retries
//! test-orchestrator run --type api --workers 8 --no-retry
//!
//! # List discovered units
//! test-orchestrator list --type ui
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod catalog;
mod cli;
mod config;
mod executor;
mod http;
mod models;
mod output;
mod pool;
mod results;
mod utils;

use catalog::{BuiltinResolver, TestCatalog, SAMPLE_MANIFEST};
use cli::Args;
use config::{AppConfig, EnvConfig};
use executor::{RetryPolicy, Scheduler};
use models::TestCategory;
use output::{format_unit_list, OutputFormat, ResultFormatter};
use pool::SharedResources;
use results::{Reporter, RunReport};
use utils::{init_logger, LogLevel, Timer};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = if args.verbose || env.verbose.unwrap_or(false) {
        LogLevel::Debug
    } else {
        env.log_level
            .as_deref()
            .and_then(LogLevel::from_str)
            .unwrap_or_default()
    };
    init_logger(level);

    let code = match dispatch(args.command, &env).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!("{e:#}");
            1
        }
    };
    std::process::exit(code);
}

/// Run a command; `Ok(false)` means it completed but did not succeed
async fn dispatch(command: cli::Command, env: &EnvConfig) -> Result<bool> {
    match command {
        cli::Command::Run(run_args) => run_units(run_args, env).await,
        cli::Command::List(list_args) => list_units(list_args, env),
        cli::Command::Init(init_args) => init_project(init_args).map(|_| true),
        cli::Command::Config(config_args) => manage_config(config_args, env).map(|_| true),
    }
}

/// Resolve configuration: CLI over environment over file over defaults
fn load_config(path: Option<&Path>, env: &EnvConfig) -> Result<AppConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));
    let mut config = AppConfig::load_or_default(path.as_deref())?;
    if env.has_any() {
        debug!("Applying TEST_ORCH_* environment overrides");
    }
    config.apply_env(env);
    Ok(config)
}

fn parse_category(value: Option<&str>) -> Result<Option<TestCategory>> {
    value
        .map(|s| {
            TestCategory::from_str(s).ok_or_else(|| anyhow::anyhow!("Unknown test type: {s}"))
        })
        .transpose()
}

fn apply_run_args(config: &mut AppConfig, args: &cli::RunArgs) -> Result<()> {
    if let Some(category) = parse_category(args.category.as_deref())? {
        config.filters.include = vec![category];
    }
    if let Some(manifest) = &args.manifest {
        config.manifest = manifest.clone();
    }
    if let Some(workers) = args.workers {
        config.parallel.enabled = true;
        config.parallel.max_workers = workers;
    }
    if args.sequential {
        config.parallel.enabled = false;
    }
    if let Some(retries) = args.retries {
        config.retry.enabled = true;
        config.retry.max_retries = retries;
    }
    if args.no_retry {
        config.retry.enabled = false;
    }
    if let Some(grep) = &args.grep {
        config.filters.grep = Some(grep.clone());
    }
    if args.report {
        config.reporting.enabled = true;
    }
    config.validate()
}

async fn run_units(args: cli::RunArgs, env: &EnvConfig) -> Result<bool> {
    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;

    let mut config = load_config(args.config.as_deref(), env)?;
    apply_run_args(&mut config, &args)?;

    let catalog = TestCatalog::load(&config.manifest)?;
    if catalog.is_empty() {
        anyhow::bail!("No test units found in {}", config.manifest.display());
    }
    let units = catalog.select(&config.filters);
    if units.is_empty() {
        anyhow::bail!(
            "None of the {} units in {} match the filters",
            catalog.len(),
            config.manifest.display()
        );
    }

    let policy = RetryPolicy::from_config(&config.retry);
    let concurrency = config.concurrency();
    info!(
        "Running {} of {} units ({} workers, {} retries)",
        units.len(),
        catalog.len(),
        concurrency,
        policy.max_retries()
    );

    let resources = Arc::new(SharedResources::new(&config.pool, config.timeout_secs));
    let scheduler = Scheduler::new(Arc::new(BuiltinResolver::new()), resources.clone(), policy);

    let timer = Timer::start("run");
    let outcomes = scheduler.run(units, concurrency).await;
    let duration_ms = timer.stop().as_millis() as u64;
    resources.drain_all().await;

    let report = RunReport::new(outcomes, duration_ms);
    let mut formatter = ResultFormatter::new(format);
    if args.no_color || !std::io::stdout().is_terminal() {
        formatter = formatter.no_color();
    }
    println!("{}", formatter.format_report(&report));

    if config.reporting.enabled {
        match Reporter::from_config(&config.reporting).write(&report) {
            Ok(path) => {
                if format == OutputFormat::Table {
                    println!("Report saved to {}", path.display());
                }
            }
            Err(e) => warn!("Failed to save report: {e:#}"),
        }
    }

    Ok(report.summary.is_all_passed())
}

fn list_units(args: cli::ListArgs, env: &EnvConfig) -> Result<bool> {
    let mut config = load_config(args.config.as_deref(), env)?;
    if let Some(category) = parse_category(args.category.as_deref())? {
        config.filters.include = vec![category];
    }
    if let Some(manifest) = args.manifest {
        config.manifest = manifest;
    }

    let catalog = TestCatalog::load(&config.manifest)?;
    let groups = catalog.grouped(&config.filters);
    println!("{}", format_unit_list(&groups));
    Ok(!groups.is_empty())
}

fn init_project(args: cli::InitArgs) -> Result<()> {
    for path in [&args.manifest, &args.config] {
        if path.exists() && !args.force {
            anyhow::bail!(
                "File already exists: {}. Use --force to overwrite.",
                path.display()
            );
        }
    }

    if let Some(parent) = args.manifest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(&args.manifest, SAMPLE_MANIFEST)
        .with_context(|| format!("Failed to write manifest: {}", args.manifest.display()))?;
    println!("✓ Sample manifest created: {}", args.manifest.display());

    let config = AppConfig {
        manifest: args.manifest.clone(),
        ..AppConfig::default()
    };
    config.save(&args.config)?;
    println!("✓ Configuration file created: {}", args.config.display());
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Show { file, format } => {
            let config = load_config(file.as_deref(), env)?;
            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(config::find_config)
                .ok_or_else(|| anyhow::anyhow!("No configuration file found"))?;

            match AppConfig::load(&path) {
                Ok(_) => println!("✓ Configuration file is valid: {}", path.display()),
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => config::print_env_help(),
    }
    Ok(())
}
