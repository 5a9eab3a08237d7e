//! Report rendering
//!
//! Human output prints one status line per document with its violations
//! indented below, followed by a summary. JSON output is a single object.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::outcome::{ValidationOutcome, Violation};
use crate::validator::DocumentReport;

/// Counts for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[DocumentReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            summary.total += 1;
            match &report.outcome {
                Ok(ValidationOutcome::Pass) => summary.passed += 1,
                Ok(ValidationOutcome::Fail(_)) => summary.failed += 1,
                Err(_) => summary.errors += 1,
            }
            summary
        })
    }

    /// 2 when any document could not be checked, 1 when any failed, 0 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.errors > 0 {
            2
        } else if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: RunSummary,
    duration_ms: u128,
    documents: Vec<JsonDocument<'a>>,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    path: &'a PathBuf,
    status: &'static str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    violations: &'a [Violation],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_ms: u128,
}

/// Renders batch results in the configured format
pub struct Reporter {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Reporter {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel) -> Self {
        Self {
            format,
            verbosity,
            show_colors: std::io::stdout().is_terminal(),
        }
    }

    /// Force colors on or off
    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn render(&self, reports: &[DocumentReport], total_duration: Duration) -> String {
        match self.format {
            OutputFormat::Human => self.render_human(reports, total_duration),
            OutputFormat::Json => render_json(reports, total_duration),
        }
    }

    fn render_human(&self, reports: &[DocumentReport], total_duration: Duration) -> String {
        let mut output = String::new();

        for report in reports {
            if self.verbosity == VerbosityLevel::Quiet && report.passed() {
                continue;
            }
            output.push_str(&self.format_document(report));
            output.push('\n');
        }

        let summary = RunSummary::from_reports(reports);
        if self.verbosity > VerbosityLevel::Quiet || summary.exit_code() != 0 {
            output.push_str(&self.format_summary(&summary, total_duration));
        }

        output
    }

    pub fn format_document(&self, report: &DocumentReport) -> String {
        let path_display = report.path.display();
        let duration_str = format_duration(report.duration);

        match &report.outcome {
            Ok(ValidationOutcome::Pass) => format!(
                "{}  {} ({})",
                self.colorize("✓ PASS", "32"),
                path_display,
                duration_str
            ),
            Ok(ValidationOutcome::Fail(violations)) => {
                let mut output = format!(
                    "{}  {} ({}) - {} violation{}",
                    self.colorize("✗ FAIL", "31"),
                    path_display,
                    duration_str,
                    violations.len(),
                    if violations.len() == 1 { "" } else { "s" }
                );
                for violation in violations {
                    output.push_str(&format!("\n    {}", violation));
                }
                output
            }
            Err(error) => format!(
                "{}  {} ({}) - {}",
                self.colorize("⚠ ERROR", "33"),
                path_display,
                duration_str,
                error
            ),
        }
    }

    fn format_summary(&self, summary: &RunSummary, total_duration: Duration) -> String {
        let mut output = String::new();
        output.push_str("\nSummary:\n");
        output.push_str(&format!("  Documents: {}\n", summary.total));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Passed:", "32"),
            summary.passed
        ));

        if summary.failed > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Failed:", "31"),
                summary.failed
            ));
        }
        if summary.errors > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "33"),
                summary.errors
            ));
        }

        output.push_str(&format!("  Duration: {}\n", format_duration(total_duration)));
        output
    }
}

fn render_json(reports: &[DocumentReport], total_duration: Duration) -> String {
    let documents = reports
        .iter()
        .map(|report| {
            let (status, violations, error) = match &report.outcome {
                Ok(ValidationOutcome::Pass) => ("pass", &[][..], None),
                Ok(ValidationOutcome::Fail(violations)) => ("fail", violations.as_slice(), None),
                Err(error) => ("error", &[][..], Some(error.to_string())),
            };
            JsonDocument {
                path: &report.path,
                status,
                violations,
                error,
                duration_ms: report.duration.as_millis(),
            }
        })
        .collect();

    let report = JsonReport {
        summary: RunSummary::from_reports(reports),
        duration_ms: total_duration.as_millis(),
        documents,
    };

    // Serializing plain structs of strings and numbers cannot fail
    serde_json::to_string_pretty(&report).unwrap_or_default()
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
