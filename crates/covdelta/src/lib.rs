//! # covdelta
//!
//! Coverage delta gate for change requests.
//!
//! ## Features
//!
//! - Parse Cobertura XML coverage reports into exact per-file line-rates
//! - Compare a candidate report against a baseline report
//! - Evaluate added and modified files against a threshold policy
//! - Render Markdown, text or JSON tables with per-cell pass/fail markers
//! - Deterministic aggregate verdict for CI exit codes
//!
//! ## Usage
//!
//! ```bash
//! # Produce coverage.xml for the candidate, keep the baseline as coverage-main.xml
//! covdelta check --baseline main --min-coverage 0.80 --max-coverage-change 0.05
//! ```
//!
//! ```rust,ignore
//! use covdelta::{CoverageGate, GateConfig};
//!
//! let run = CoverageGate::new(GateConfig::default()).run()?;
//! if !run.outcome.passed {
//!     println!("coverage gate failed");
//! }
//! ```

pub mod config;
pub mod evaluator;
pub mod extractor;
pub mod gate;
pub mod parser;
pub mod publish;
pub mod ratio;
pub mod report;
pub mod store;
pub mod thresholds;

pub use config::{FileListPaths, GateConfig, PathListFormat, ReportPaths};
pub use evaluator::{
    AddedFileResult, DeltaEvaluator, EvaluationOutcome, FileCategory, FileCoverageResult,
    ModifiedFileResult, SkipReason, SkippedFile, check_coverage_pass_fail,
};
pub use extractor::{Extraction, extract};
pub use gate::{CoverageGate, GateRun, GateStatus, ListFailure};
pub use parser::{CoverageReport, RecordedRate};
pub use publish::{Comment, CommentKind, CommentSink, DirectorySink, WriterSink};
pub use ratio::Ratio;
pub use report::{RenderedReport, ReportFormat, ReportRenderer, ValueStyle};
pub use store::{ReportLocator, ReportStore};
pub use thresholds::{ThresholdPolicy, Violation};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during coverage gate operations
#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("Coverage report not found: {}", path.display())]
    ReportNotFound { path: PathBuf },

    #[error("Failed to parse coverage report: {0}")]
    ParseError(String),

    #[error("Invalid ratio {value:?}: {reason}")]
    InvalidRatio { value: String, reason: String },

    #[error("Failed to read path list {}: {message}", path.display())]
    PathList { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, CoverageError>;

/// Evaluate a candidate report against an optional baseline with the default policy
pub fn quick_evaluate(
    current_xml: &str,
    baseline_xml: Option<&str>,
    added: &[String],
    modified: &[String],
) -> Result<EvaluationOutcome> {
    let current = CoverageReport::from_xml(current_xml)?;
    let baseline = baseline_xml.map(CoverageReport::from_xml).transpose()?;
    let evaluator = DeltaEvaluator::new(ThresholdPolicy::default());
    Ok(evaluator.evaluate(&current, baseline.as_ref(), added, modified))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_evaluate() {
        let current = r#"<coverage><class filename="a.py" complexity="0" line-rate="0.92"/></coverage>"#;
        let baseline = r#"<coverage><class filename="a.py" complexity="0" line-rate="0.80"/></coverage>"#;

        let outcome =
            quick_evaluate(current, Some(baseline), &[], &["a.py".to_string()]).unwrap();

        assert!(outcome.passed);
        assert_eq!(outcome.modified[0].delta.to_string(), "0.12");
    }

    #[test]
    fn test_error_messages() {
        let err = CoverageError::ReportNotFound {
            path: PathBuf::from("coverage.xml"),
        };
        assert_eq!(err.to_string(), "Coverage report not found: coverage.xml");
    }
}
