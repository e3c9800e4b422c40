//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::find_config;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::http::DEFAULT_MAX_IDLE_PER_HOST;
use crate::models::TestCategory;
use crate::pool::DEFAULT_CAPACITY;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Unit manifest path
    pub manifest: PathBuf,

    /// Per-request timeout for built-in bodies, in seconds
    pub timeout_secs: u64,

    /// Concurrency settings
    pub parallel: ParallelConfig,

    /// Retry settings
    pub retry: RetryConfig,

    /// Shared resource pool settings
    pub pool: PoolConfig,

    /// Report output settings
    pub reporting: ReportConfig,

    /// Unit selection
    pub filters: FilterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("./tests/units.yaml"),
            timeout_secs: 30,
            parallel: ParallelConfig::default(),
            retry: RetryConfig::default(),
            pool: PoolConfig::default(),
            reporting: ReportConfig::default(),
            filters: FilterConfig::default(),
        }
    }
}

impl AppConfig {
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

    /// Load from an explicit path, the first standard location, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path.map(Path::to_path_buf).or_else(find_config) {
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

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.parallel.enabled && self.parallel.max_workers == 0 {
            anyhow::bail!("parallel.max_workers must be at least 1");
        }
        if self.pool.max_browsers == 0 {
            anyhow::bail!("pool.max_browsers must be at least 1");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Number of concurrent execution slots
    pub fn concurrency(&self) -> usize {
        if self.parallel.enabled {
            self.parallel.max_workers.max(1)
        } else {
            1
        }
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(manifest) = &env.manifest {
            self.manifest = PathBuf::from(manifest);
        }
        if let Some(workers) = env.workers {
            self.parallel.max_workers = workers;
        }
        if let Some(retries) = env.retries {
            self.retry.max_retries = retries;
        }
        if let Some(delay) = env.retry_delay_ms {
            self.retry.retry_delay_ms = delay;
        }
        if let Some(dir) = &env.report_dir {
            self.reporting.output_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = env.timeout {
            self.timeout_secs = timeout;
        }
    }
}

/// Concurrency configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Run units concurrently (one at a time otherwise)
    pub enabled: bool,

    /// Maximum concurrently executing units
    pub max_workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_workers: 4,
        }
    }
}

/// Retry configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,

    /// Additional attempts after the first
    pub max_retries: u32,

    /// Backoff base; the n-th retry waits n times this long
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// Shared resource pool configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle browser sessions kept for reuse
    pub max_browsers: usize,

    /// Idle keep-alive sockets per HTTP endpoint
    pub max_idle_per_host: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_browsers: DEFAULT_CAPACITY,
            max_idle_per_host: DEFAULT_MAX_IDLE_PER_HOST,
        }
    }
}

/// Report configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,

    /// Remove previous reports before writing a new one
    pub clean_old: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: PathBuf::from("./reports"),
            clean_old: true,
        }
    }
}

/// Unit selection filters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Categories to run (all when empty)
    pub include: Vec<TestCategory>,

    /// Unit names to skip
    pub exclude: Vec<String>,

    /// Only run units whose name contains this text
    pub grep: Option<String>,
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
