//! End-to-end gate run: load, extract, evaluate, render

use crate::Result;
use crate::config::GateConfig;
use crate::evaluator::{DeltaEvaluator, EvaluationOutcome, FileCategory};
use crate::publish::{Comment, CommentKind};
use crate::report::ReportRenderer;
use crate::store::ReportStore;

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// Every evaluated file met its thresholds
    Pass,
    /// At least one file violated a threshold
    PolicyFailure,
    /// A required input could not be read
    Fatal,
}

impl GateStatus {
    /// Process exit code for this status
    pub fn exit_code(&self) -> u8 {
        match self {
            GateStatus::Pass => 0,
            GateStatus::PolicyFailure => 1,
            GateStatus::Fatal => 2,
        }
    }
}

/// A path list that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFailure {
    pub category: FileCategory,
    pub message: String,
}

/// Result of one gate run
#[derive(Debug, Clone)]
pub struct GateRun {
    pub outcome: EvaluationOutcome,
    /// Categories whose path list failed; the other category still ran
    pub list_failures: Vec<ListFailure>,
}

impl GateRun {
    pub fn status(&self) -> GateStatus {
        if !self.list_failures.is_empty() {
            GateStatus::Fatal
        } else if self.outcome.passed {
            GateStatus::Pass
        } else {
            GateStatus::PolicyFailure
        }
    }

    fn list_failed(&self, category: FileCategory) -> bool {
        self.list_failures.iter().any(|f| f.category == category)
    }

    /// Comment bodies in posting order
    ///
    /// A table is left out when its path list failed to load. The summary is
    /// included only when the run did not pass.
    pub fn comments(&self, renderer: &ReportRenderer) -> Vec<Comment> {
        let rendered = renderer.render(&self.outcome);
        let mut comments = Vec::new();

        if !self.list_failed(FileCategory::Added) {
            comments.push(Comment::new(CommentKind::AddedFiles, rendered.added));
        }
        if !self.list_failed(FileCategory::Modified) {
            comments.push(Comment::new(CommentKind::ModifiedFiles, rendered.modified));
        }

        if self.status() != GateStatus::Pass {
            let mut summary = rendered.summary;
            for failure in &self.list_failures {
                summary.push_str(&format!(
                    "\nCould not read the {} file list: {}\n",
                    failure.category, failure.message
                ));
            }
            comments.push(Comment::new(CommentKind::Summary, summary));
        }

        comments
    }
}

/// Runs the coverage gate for one configuration
#[derive(Debug, Clone)]
pub struct CoverageGate {
    config: GateConfig,
}

impl CoverageGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Run against the filesystem locations in the configuration
    pub fn run(&self) -> Result<GateRun> {
        let mut store = ReportStore::new(self.config.clone());
        self.run_with(&mut store)
    }

    /// Run against an existing store
    ///
    /// Fails only when the current report cannot be loaded. Path list failures
    /// are recorded on the returned run so the other category is still
    /// evaluated.
    pub fn run_with(&self, store: &mut ReportStore) -> Result<GateRun> {
        let current = store.current_report()?;
        let baseline = store.baseline_report(&self.config.baseline);

        let mut list_failures = Vec::new();
        let mut load_list = |category: FileCategory| match store.load_path_list(category) {
            Ok(paths) => paths,
            Err(err) => {
                log::warn!("Skipping {} files: {}", category, err);
                list_failures.push(ListFailure {
                    category,
                    message: err.to_string(),
                });
                Vec::new()
            }
        };
        let added = load_list(FileCategory::Added);
        let modified = load_list(FileCategory::Modified);

        let evaluator = DeltaEvaluator::new(self.config.policy.clone());
        let outcome = evaluator.evaluate(&current, baseline.as_deref(), &added, &modified);

        Ok(GateRun {
            outcome,
            list_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoverageError;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    fn gate(dir: &TempDir) -> CoverageGate {
        CoverageGate::new(GateConfig::default().with_root(dir.path()))
    }

    #[test]
    fn test_missing_current_report_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(&dir, "files_added.json", "[]");
        write(&dir, "files_modified.json", "[]");

        assert!(matches!(
            gate(&dir).run(),
            Err(CoverageError::ReportNotFound { .. })
        ));
    }

    #[test]
    fn test_unparseable_current_report_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(&dir, "coverage.xml", "<html/>");
        write(&dir, "files_added.json", r#"["a.py"]"#);
        write(&dir, "files_modified.json", "[]");

        assert!(matches!(
            gate(&dir).run(),
            Err(CoverageError::ParseError(_))
        ));
    }

    #[test]
    fn test_list_failure_keeps_other_category() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "coverage.xml",
            r#"<coverage><class filename="a.py" complexity="0" line-rate="0.9"/></coverage>"#,
        );
        write(&dir, "files_added.json", r#"["a.py"]"#);

        let run = gate(&dir).run().unwrap();

        assert_eq!(run.outcome.added.len(), 1);
        assert_eq!(run.list_failures.len(), 1);
        assert_eq!(run.list_failures[0].category, FileCategory::Modified);
        assert_eq!(run.status(), GateStatus::Fatal);

        let comments = run.comments(&ReportRenderer::new(GateConfig::default().policy));
        let kinds: Vec<CommentKind> = comments.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CommentKind::AddedFiles, CommentKind::Summary]);
        assert!(comments[1].body.contains("Could not read the modified file list"));
    }

    #[test]
    fn test_passing_run_has_no_summary_comment() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "coverage.xml",
            r#"<coverage><class filename="a.py" complexity="0" line-rate="0.9"/></coverage>"#,
        );
        write(&dir, "files_added.json", "[]");
        write(&dir, "files_modified.json", r#"["a.py"]"#);

        let run = gate(&dir).run().unwrap();

        assert_eq!(run.status(), GateStatus::Pass);
        assert_eq!(run.status().exit_code(), 0);
        assert_eq!(run.comments(&ReportRenderer::new(GateConfig::default().policy)).len(), 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(GateStatus::PolicyFailure.exit_code(), 1);
        assert_eq!(GateStatus::Fatal.exit_code(), 2);
    }
}
