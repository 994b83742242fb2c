//! Rendering of evaluation outcomes
//!
//! Each numeric cell carries its own pass/fail marker. A cell marker only
//! reflects that cell's threshold; the aggregate verdict needs every cell to
//! pass.

use crate::evaluator::{AddedFileResult, EvaluationOutcome, ModifiedFileResult};
use crate::ratio::Ratio;
use crate::thresholds::ThresholdPolicy;
use serde::Serialize;

const MARKDOWN_PASS: &str = "&#9989;";
const MARKDOWN_FAIL: &str = "&#10060;";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// GitHub-flavoured Markdown, suitable as a pull request comment
    #[default]
    Markdown,
    /// Plain text with aligned columns
    Text,
    /// JSON documents
    Json,
}

impl ReportFormat {
    /// File extension for saved output
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
        }
    }
}

/// How ratios are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueStyle {
    /// As recorded, e.g. `0.92`
    #[default]
    Ratio,
    /// Scaled by 100, e.g. `92%`
    Percent,
}

/// Rendered comment bodies for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub added: String,
    pub modified: String,
    pub summary: String,
    pub passed: bool,
}

/// Turns an evaluation outcome into tables and a summary
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    policy: ThresholdPolicy,
    format: ReportFormat,
    style: ValueStyle,
}

impl ReportRenderer {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self {
            policy,
            format: ReportFormat::default(),
            style: ValueStyle::default(),
        }
    }

    /// Builder pattern: set output format
    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    /// Builder pattern: set value style
    pub fn with_style(mut self, style: ValueStyle) -> Self {
        self.style = style;
        self
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Render both tables and the summary
    pub fn render(&self, outcome: &EvaluationOutcome) -> RenderedReport {
        RenderedReport {
            added: self.added_table(&outcome.added),
            modified: self.modified_table(&outcome.modified),
            summary: self.summary(outcome),
            passed: outcome.passed,
        }
    }

    /// Table of added files: path, coverage and marker
    pub fn added_table(&self, added: &[AddedFileResult]) -> String {
        if self.format == ReportFormat::Json {
            #[derive(Serialize)]
            struct JsonAddedRow<'a> {
                path: &'a str,
                coverage: Ratio,
                coverage_passed: bool,
            }

            let rows: Vec<JsonAddedRow> = added
                .iter()
                .map(|file| JsonAddedRow {
                    path: &file.path,
                    coverage: file.coverage,
                    coverage_passed: self.policy.coverage_passes(file.coverage),
                })
                .collect();
            return serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".into());
        }

        let rows: Vec<Vec<String>> = added
            .iter()
            .map(|file| {
                vec![
                    file.path.clone(),
                    self.cell(
                        self.value(file.coverage),
                        self.policy.coverage_passes(file.coverage),
                    ),
                ]
            })
            .collect();
        self.table(&["Added Files", "Coverage"], &rows)
    }

    /// Table of modified files: path, coverage and marker, delta and marker
    pub fn modified_table(&self, modified: &[ModifiedFileResult]) -> String {
        if self.format == ReportFormat::Json {
            #[derive(Serialize)]
            struct JsonModifiedRow<'a> {
                path: &'a str,
                coverage: Ratio,
                coverage_passed: bool,
                delta: Ratio,
                delta_passed: bool,
                baseline: Option<Ratio>,
            }

            let rows: Vec<JsonModifiedRow> = modified
                .iter()
                .map(|file| JsonModifiedRow {
                    path: &file.path,
                    coverage: file.coverage,
                    coverage_passed: self.policy.coverage_passes(file.coverage),
                    delta: file.delta,
                    delta_passed: self.policy.delta_passes(file.delta),
                    baseline: file.baseline,
                })
                .collect();
            return serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".into());
        }

        let rows: Vec<Vec<String>> = modified
            .iter()
            .map(|file| {
                vec![
                    file.path.clone(),
                    self.cell(
                        self.value(file.coverage),
                        self.policy.coverage_passes(file.coverage),
                    ),
                    self.cell(self.delta(file.delta), self.policy.delta_passes(file.delta)),
                ]
            })
            .collect();
        self.table(&["Modified Files", "Coverage", "Change in Coverage"], &rows)
    }

    /// Verdict line, violations and files that could not be evaluated
    pub fn summary(&self, outcome: &EvaluationOutcome) -> String {
        let violations = outcome.violations(&self.policy);

        if self.format == ReportFormat::Json {
            #[derive(Serialize)]
            struct JsonSummary<'a> {
                passed: bool,
                evaluated: usize,
                min_coverage: Ratio,
                max_coverage_change: Ratio,
                violations: &'a [crate::thresholds::Violation],
                skipped: &'a [crate::evaluator::SkippedFile],
            }

            let summary = JsonSummary {
                passed: outcome.passed,
                evaluated: outcome.evaluated(),
                min_coverage: self.policy.min_coverage(),
                max_coverage_change: self.policy.max_coverage_change(),
                violations: &violations,
                skipped: &outcome.skipped,
            };
            return serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".into());
        }

        let (bold, bullet) = match self.format {
            ReportFormat::Markdown => ("**", "- "),
            _ => ("", "  - "),
        };
        let mut output = String::new();

        if outcome.passed {
            output.push_str(&format!(
                "{bold}Coverage gate passed{bold}: {} files evaluated ({} added, {} modified).\n",
                outcome.evaluated(),
                outcome.added.len(),
                outcome.modified.len()
            ));
        } else {
            let failing_files = outcome
                .results()
                .iter()
                .filter(|result| !result.violations(&self.policy).is_empty())
                .count();
            output.push_str(&format!(
                "{bold}Coverage gate failed{bold}: {} threshold violations in {} of {} evaluated files.\n\n",
                violations.len(),
                failing_files,
                outcome.evaluated()
            ));
            for violation in &violations {
                output.push_str(&format!("{}{}\n", bullet, violation));
            }
        }

        if !outcome.skipped.is_empty() {
            output.push_str("\nNot evaluated:\n\n");
            for skipped in &outcome.skipped {
                output.push_str(&format!(
                    "{}{} ({}): {}\n",
                    bullet, skipped.path, skipped.category, skipped.reason
                ));
            }
        }

        output.push_str(&format!(
            "\nThresholds: minimum coverage {}, maximum coverage change {}\n",
            self.value(self.policy.min_coverage()),
            self.delta(self.policy.max_coverage_change())
        ));
        output
    }

    /// One-line GitHub Actions workflow command
    pub fn github_annotation(&self, outcome: &EvaluationOutcome) -> String {
        if outcome.passed {
            format!(
                "::notice::Coverage gate passed for {} files",
                outcome.evaluated()
            )
        } else {
            let violations: Vec<String> = outcome
                .violations(&self.policy)
                .iter()
                .map(|v| v.to_string())
                .collect();
            format!(
                "::error::Coverage gate failed: {}",
                escape_workflow_data(&violations.join("; "))
            )
        }
    }

    fn value(&self, ratio: Ratio) -> String {
        match self.style {
            ValueStyle::Ratio => ratio.to_string(),
            ValueStyle::Percent => format!("{}%", ratio.to_percent()),
        }
    }

    fn delta(&self, ratio: Ratio) -> String {
        match self.style {
            ValueStyle::Ratio => format!("{:+}", ratio),
            ValueStyle::Percent => format!("{:+}%", ratio.to_percent()),
        }
    }

    fn cell(&self, value: String, passed: bool) -> String {
        let marker = match (self.format, passed) {
            (ReportFormat::Markdown, true) => MARKDOWN_PASS,
            (ReportFormat::Markdown, false) => MARKDOWN_FAIL,
            (_, true) => "PASS",
            (_, false) => "FAIL",
        };
        format!("{} {}", value, marker)
    }

    fn table(&self, headers: &[&str], rows: &[Vec<String>]) -> String {
        match self.format {
            ReportFormat::Markdown => markdown_table(headers, rows),
            _ => text_table(headers, rows),
        }
    }
}

fn markdown_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut output = String::new();
    output.push_str(&format!("| {} |\n", headers.join(" | ")));
    output.push_str(&format!("|{}\n", "---|".repeat(headers.len())));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|cell| cell.replace('|', "\\|")).collect();
        output.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    output
}

fn text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:width$}", cell, width = *width))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut output = line(headers.to_vec());
    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&line(rules.iter().map(String::as_str).collect()));
    for row in rows {
        output.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    output
}

/// Escape a workflow command message
fn escape_workflow_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
