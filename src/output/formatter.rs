//! Output formatters for run results
//!
//! Provides grouped table, JSON, and one-line summary output.

use crate::models::{OutcomeStatus, TestCategory, TestOutcome, TestUnit};
use crate::results::{ResultAggregator, RunReport};

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a full run report
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_report_table(report),
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Summary => self.format_report_brief(report),
        }
    }

    fn status_str(&self, status: OutcomeStatus) -> String {
        let text = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return text;
        }
        match status {
            OutcomeStatus::Passed => format!("\x1b[32m{text}\x1b[0m"),
            OutcomeStatus::Failed => format!("\x1b[31m{text}\x1b[0m"),
        }
    }

    fn format_outcome_line(&self, outcome: &TestOutcome) -> String {
        let mut line = format!(
            "  {} {:40} [{:>6}ms]",
            self.status_str(outcome.status),
            outcome.name(),
            outcome.duration_ms
        );
        if outcome.retry_attempts > 0 {
            line.push_str(&format!(" (retries: {})", outcome.retry_attempts));
        }
        if let Some(message) = outcome.message() {
            line.push_str(&format!("\n      Error: {message}"));
        }
        line
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(" Test Results\n");
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        for (category, outcomes) in ResultAggregator::group_by_category(&report.results) {
            output.push_str(&format!(
                "\n {} ({})\n",
                category_title(category),
                outcomes.len()
            ));
            output.push_str(" ───────────────────────────────────────────────────────────\n");
            for outcome in outcomes {
                output.push_str(&self.format_outcome_line(outcome));
                output.push('\n');
            }
        }

        let summary = &report.summary;
        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", summary.passed)
        } else {
            summary.passed.to_string()
        };
        let fail_str = if self.colorize && summary.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.failed)
        } else {
            summary.failed.to_string()
        };

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Total: {} | Passed: {} | Failed: {}\n",
            summary.total, pass_str, fail_str
        ));
        output.push_str(&format!(
            " Pass Rate: {:.2}% | Duration: {}ms\n",
            summary.pass_rate, report.duration
        ));

        let retried = ResultAggregator::retried(&report.results);
        if !retried.is_empty() {
            output.push_str(&format!(" Retried: {}\n", retried.len()));
        }

        let failures = ResultAggregator::failures(&report.results);
        if !failures.is_empty() {
            output.push_str("\n Failed Units:\n");
            for outcome in failures {
                output.push_str(&format!("   - {}\n", outcome.unit));
            }
        }
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        output
    }

    fn format_report_brief(&self, report: &RunReport) -> String {
        let summary = &report.summary;
        format!(
            "{}/{} passed ({:.2}%), {} failed in {}ms",
            summary.passed, summary.total, summary.pass_rate, summary.failed, report.duration
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn category_title(category: TestCategory) -> &'static str {
    match category {
        TestCategory::Ui => "UI Tests",
        TestCategory::Api => "API Tests",
        TestCategory::Unknown => "Other Tests",
    }
}

/// Format discovered units grouped by category for listing
pub fn format_unit_list(groups: &[(TestCategory, Vec<TestUnit>)]) -> String {
    let mut output = String::new();
    let total: usize = groups.iter().map(|(_, units)| units.len()).sum();

    output.push_str(&format!("\nDiscovered {total} units:\n"));
    for (category, units) in groups {
        output.push_str(&format!("\n  {} ({})\n", category_title(*category), units.len()));
        for unit in units {
            output.push_str(&format!("    - {:40} {}\n", unit.name, unit.locator));
        }
    }
    output
}
