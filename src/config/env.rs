//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "TEST_ORCH";

/// Configuration overrides read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Config file from TEST_ORCH_CONFIG
    pub config_file: Option<String>,
    /// Manifest from TEST_ORCH_MANIFEST
    pub manifest: Option<String>,
    /// Concurrency from TEST_ORCH_WORKERS
    pub workers: Option<usize>,
    /// Retries from TEST_ORCH_RETRIES
    pub retries: Option<u32>,
    /// Backoff base from TEST_ORCH_RETRY_DELAY_MS
    pub retry_delay_ms: Option<u64>,
    /// Report directory from TEST_ORCH_REPORT_DIR
    pub report_dir: Option<String>,
    /// Request timeout from TEST_ORCH_TIMEOUT
    pub timeout: Option<u64>,
    /// Verbose from TEST_ORCH_VERBOSE
    pub verbose: Option<bool>,
    /// Log level from TEST_ORCH_LOG_LEVEL
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            config_file: get_env("CONFIG"),
            manifest: get_env("MANIFEST"),
            workers: get_env_parse("WORKERS"),
            retries: get_env_parse("RETRIES"),
            retry_delay_ms: get_env_parse("RETRY_DELAY_MS"),
            report_dir: get_env("REPORT_DIR"),
            timeout: get_env_parse("TIMEOUT"),
            verbose: get_env_bool("VERBOSE"),
            log_level: get_env("LOG_LEVEL"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.config_file.is_some()
            || self.manifest.is_some()
            || self.workers.is_some()
            || self.retries.is_some()
            || self.retry_delay_ms.is_some()
            || self.report_dir.is_some()
            || self.timeout.is_some()
            || self.verbose.is_some()
            || self.log_level.is_some()
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

/// Print all TEST_ORCH environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_CONFIG          Path to configuration file");
    println!("  {ENV_PREFIX}_MANIFEST        Path to unit manifest");
    println!("  {ENV_PREFIX}_WORKERS         Maximum concurrent units");
    println!("  {ENV_PREFIX}_RETRIES         Retries for transient failures");
    println!("  {ENV_PREFIX}_RETRY_DELAY_MS  Backoff base in milliseconds");
    println!("  {ENV_PREFIX}_REPORT_DIR      Report output directory");
    println!("  {ENV_PREFIX}_TIMEOUT         Request timeout in seconds");
    println!("  {ENV_PREFIX}_VERBOSE         Enable verbose output (true/false)");
    println!("  {ENV_PREFIX}_LOG_LEVEL       Log level (trace, debug, info, warn, error)");
}
