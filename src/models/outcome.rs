//! Outcome models
//!
//! Defines the recorded result of running one unit and the derived summary.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::failure::{ErrorSummary, UnitError};
use super::unit::{TestCategory, TestUnit};

/// Final status of a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Passed,
    Failed,
}

impl OutcomeStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            OutcomeStatus::Passed => "✓",
            OutcomeStatus::Failed => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Passed)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Passed => write!(f, "PASSED"),
            OutcomeStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result of running one unit to its final (post-retry) state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    #[serde(flatten)]
    pub unit: TestUnit,
    pub status: OutcomeStatus,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub error: Option<ErrorSummary>,
    #[serde(rename = "retryCount")]
    pub retry_attempts: u32,
}

impl TestOutcome {
    pub fn passed(unit: TestUnit, duration_ms: u64, retry_attempts: u32) -> Self {
        Self {
            unit,
            status: OutcomeStatus::Passed,
            duration_ms,
            error: None,
            retry_attempts,
        }
    }

    pub fn failed(unit: TestUnit, duration_ms: u64, error: UnitError, retry_attempts: u32) -> Self {
        Self {
            unit,
            status: OutcomeStatus::Failed,
            duration_ms,
            error: Some(error.into()),
            retry_attempts,
        }
    }

    pub fn name(&self) -> &str {
        &self.unit.name
    }

    pub fn category(&self) -> TestCategory {
        self.unit.category
    }

    pub fn message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.unit,
            self.duration_ms
        )?;
        if self.retry_attempts > 0 {
            write!(f, " (retries: {})", self.retry_attempts)?;
        }
        if let Some(msg) = self.message() {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Summary statistics derived from a set of outcomes
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage of passed units, two decimals
    pub pass_rate: f64,
}

impl Summary {
    pub fn is_all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} | Passed: {} | Failed: {} | Pass Rate: {:.2}%",
            self.total, self.passed, self.failed, self.pass_rate
        )
    }
}
