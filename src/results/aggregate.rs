//! Result aggregation
//!
//! Pure functions over a set of outcomes. Summaries never depend on the
//! order outcomes arrive in.

use crate::models::{OutcomeStatus, Summary, TestCategory, TestOutcome};

/// Derives summaries and groupings from outcomes
pub struct ResultAggregator;

impl ResultAggregator {
    /// Count outcomes by status.
    ///
    /// Pass rate is a percentage rounded to two decimals, 0 when empty.
    pub fn summarize(outcomes: &[TestOutcome]) -> Summary {
        let total = outcomes.len();
        let passed = outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .count();
        let failed = total - passed;

        let pass_rate = if total == 0 {
            0.0
        } else {
            (passed as f64 / total as f64 * 10_000.0).round() / 100.0
        };

        Summary {
            total,
            passed,
            failed,
            pass_rate,
        }
    }

    /// Outcomes grouped by category, groups in first-seen order
    pub fn group_by_category(outcomes: &[TestOutcome]) -> Vec<(TestCategory, Vec<&TestOutcome>)> {
        let mut groups: Vec<(TestCategory, Vec<&TestOutcome>)> = Vec::new();
        for outcome in outcomes {
            let category = outcome.category();
            match groups.iter_mut().find(|(c, _)| *c == category) {
                Some((_, members)) => members.push(outcome),
                None => groups.push((category, vec![outcome])),
            }
        }
        groups
    }

    pub fn failures(outcomes: &[TestOutcome]) -> Vec<&TestOutcome> {
        outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .collect()
    }

    /// Outcomes that needed at least one retry
    pub fn retried(outcomes: &[TestOutcome]) -> Vec<&TestOutcome> {
        outcomes.iter().filter(|o| o.retry_attempts > 0).collect()
    }
}
