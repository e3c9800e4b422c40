//! Run report persistence
//!
//! Writes the machine-readable report of a run to the output directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::aggregate::ResultAggregator;
use crate::config::ReportConfig;
use crate::models::{Summary, TestOutcome};

/// File name prefix shared by every report
pub const REPORT_PREFIX: &str = "test-report-";

/// Machine-readable report of one run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration of the run in milliseconds
    pub duration: u64,
    pub summary: Summary,
    pub results: Vec<TestOutcome>,
}

impl RunReport {
    pub fn new(results: Vec<TestOutcome>, duration_ms: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            duration: duration_ms,
            summary: ResultAggregator::summarize(&results),
            results,
        }
    }
}

/// Writes reports into a directory
pub struct Reporter {
    output_dir: PathBuf,
    clean_old: bool,
}

impl Reporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            clean_old: false,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(&config.output_dir).with_clean_old(config.clean_old)
    }

    pub fn with_clean_old(mut self, clean_old: bool) -> Self {
        self.clean_old = clean_old;
        self
    }

    fn report_path(&self, timestamp: &DateTime<Utc>) -> PathBuf {
        let stamp = timestamp.format("%Y-%m-%dT%H-%M-%S-%3fZ");
        self.output_dir.join(format!("{REPORT_PREFIX}{stamp}.json"))
    }

    /// Save a report, removing earlier ones first when configured
    pub fn write(&self, report: &RunReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create report directory: {}", self.output_dir.display())
        })?;

        if self.clean_old {
            let removed = self.clean()?;
            if removed > 0 {
                debug!("Removed {} old reports", removed);
            }
        }

        let path = self.report_path(&report.timestamp);
        let file = File::create(&path).context("Failed to create report file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)
            .context("Failed to write report")?;

        info!("Saved test report to {}", path.display());
        Ok(path)
    }

    /// Remove existing reports, returning how many were deleted
    pub fn clean(&self) -> Result<usize> {
        if !self.output_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for path in self.reports()? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }

    /// Paths of existing reports, oldest first
    pub fn reports(&self) -> Result<Vec<PathBuf>> {
        if !self.output_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            if is_report_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn is_report_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.starts_with(REPORT_PREFIX) && name.ends_with(".json")
}
