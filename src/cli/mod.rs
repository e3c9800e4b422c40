//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Concurrent test orchestrator with retries and pooled resources
#[derive(Parser, Debug)]
#[command(name = "test-orchestrator")]
#[command(version = "0.1.0")]
#[command(about = "Run UI and API test units concurrently with retries")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run test units
    Run(RunArgs),

    /// List discovered test units
    List(ListArgs),

    /// Create a sample manifest and configuration file
    Init(InitArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Only run units of this category (ui, api)
    #[arg(short = 't', long = "type")]
    pub category: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Unit manifest (overrides configuration)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Maximum concurrently running units
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Retries for transient failures
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Disable retries
    #[arg(long, conflicts_with = "retries")]
    pub no_retry: bool,

    /// Run one unit at a time
    #[arg(long, conflicts_with = "workers")]
    pub sequential: bool,

    /// Only run units whose name contains this text
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Write the JSON report even when reporting is disabled
    #[arg(long)]
    pub report: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Disable colored output (implied when stdout is not a terminal)
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for list command
#[derive(Parser, Debug, Default)]
pub struct ListArgs {
    /// Only list units of this category (ui, api)
    #[arg(short = 't', long = "type")]
    pub category: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Unit manifest (overrides configuration)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

/// Arguments for init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Manifest path to create
    #[arg(short, long, default_value = "./tests/units.yaml")]
    pub manifest: PathBuf,

    /// Configuration file to create
    #[arg(short, long, default_value = "./test-orchestrator.yaml")]
    pub config: PathBuf,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Configuration file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output format (yaml, json)
        #[arg(long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file
        file: Option<PathBuf>,
    },

    /// List supported environment variables
    Env,
}
