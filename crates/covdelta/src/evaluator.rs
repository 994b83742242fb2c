//! Coverage and delta evaluation for added and modified files
//!
//! The evaluator is stateless apart from its policy: every file is a pure
//! function of its path and the two immutable report snapshots. Files the
//! coverage tool never instrumented, or whose line-rate cannot be read, are
//! recorded as skipped and never take part in the verdict.

use crate::extractor::{Extraction, extract};
use crate::parser::CoverageReport;
use crate::ratio::Ratio;
use crate::thresholds::{ThresholdPolicy, Violation};
use serde::Serialize;
use std::fmt;

/// Which change list a file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Added,
    Modified,
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileCategory::Added => f.write_str("added"),
            FileCategory::Modified => f.write_str("modified"),
        }
    }
}

/// Coverage of a file added by the change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedFileResult {
    pub path: String,
    pub coverage: Ratio,
}

/// Coverage and change in coverage of a modified file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedFileResult {
    pub path: String,
    pub coverage: Ratio,
    /// `coverage - baseline`; zero when the file is new to the baseline
    pub delta: Ratio,
    /// Baseline line-rate, `None` when the baseline had no record
    pub baseline: Option<Ratio>,
}

/// Either kind of per-file result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum FileCoverageResult {
    Added(AddedFileResult),
    Modified(ModifiedFileResult),
}

impl FileCoverageResult {
    pub fn path(&self) -> &str {
        match self {
            FileCoverageResult::Added(result) => &result.path,
            FileCoverageResult::Modified(result) => &result.path,
        }
    }

    pub fn coverage(&self) -> Ratio {
        match self {
            FileCoverageResult::Added(result) => result.coverage,
            FileCoverageResult::Modified(result) => result.coverage,
        }
    }

    /// Thresholds this file violates, coverage first
    pub fn violations(&self, policy: &ThresholdPolicy) -> Vec<Violation> {
        let mut violations = Vec::new();
        if !policy.coverage_passes(self.coverage()) {
            violations.push(Violation::CoverageBelowMinimum {
                path: self.path().to_string(),
                coverage: self.coverage(),
                minimum: policy.min_coverage(),
            });
        }
        if let FileCoverageResult::Modified(result) = self {
            if !policy.delta_passes(result.delta) {
                violations.push(Violation::DropExceeded {
                    path: result.path.clone(),
                    delta: result.delta,
                    allowed: policy.max_coverage_change(),
                });
            }
        }
        violations
    }
}

/// Why a listed file produced no result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The candidate report has no record for the file
    NotInstrumented,
    /// The candidate report's line-rate is unusable
    MalformedCurrent { raw: String },
    /// The baseline report's line-rate is unusable, so no delta exists
    MalformedBaseline { raw: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotInstrumented => f.write_str("not present in the current coverage report"),
            SkipReason::MalformedCurrent { raw } => {
                write!(f, "unreadable line-rate {:?} in the current coverage report", raw)
            }
            SkipReason::MalformedBaseline { raw } => {
                write!(f, "unreadable line-rate {:?} in the baseline coverage report", raw)
            }
        }
    }
}

/// A listed file left out of the results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub category: FileCategory,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Everything one evaluation produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationOutcome {
    /// Added files in input order
    pub added: Vec<AddedFileResult>,
    /// Modified files in input order
    pub modified: Vec<ModifiedFileResult>,
    /// Listed files that produced no result
    pub skipped: Vec<SkippedFile>,
    /// Aggregate verdict
    pub passed: bool,
}

impl EvaluationOutcome {
    /// All results, added files first
    pub fn results(&self) -> Vec<FileCoverageResult> {
        self.added
            .iter()
            .cloned()
            .map(FileCoverageResult::Added)
            .chain(self.modified.iter().cloned().map(FileCoverageResult::Modified))
            .collect()
    }

    /// Every threshold violation, in result order
    pub fn violations(&self, policy: &ThresholdPolicy) -> Vec<Violation> {
        self.results()
            .iter()
            .flat_map(|result| result.violations(policy))
            .collect()
    }

    /// Number of files with a result
    pub fn evaluated(&self) -> usize {
        self.added.len() + self.modified.len()
    }
}

/// Aggregate verdict: any single violating file fails the change
pub fn check_coverage_pass_fail(
    policy: &ThresholdPolicy,
    added: &[AddedFileResult],
    modified: &[ModifiedFileResult],
) -> bool {
    added.iter().all(|file| policy.coverage_passes(file.coverage))
        && modified
            .iter()
            .all(|file| policy.coverage_passes(file.coverage) && policy.delta_passes(file.delta))
}

/// Applies a threshold policy to a candidate report and its baseline
#[derive(Debug, Clone)]
pub struct DeltaEvaluator {
    policy: ThresholdPolicy,
}

impl DeltaEvaluator {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    /// Evaluate both change lists and compute the verdict
    pub fn evaluate(
        &self,
        current: &CoverageReport,
        baseline: Option<&CoverageReport>,
        added: &[String],
        modified: &[String],
    ) -> EvaluationOutcome {
        let mut skipped = Vec::new();
        let added = self.evaluate_added(current, added, &mut skipped);
        let modified = self.evaluate_modified(current, baseline, modified, &mut skipped);
        let passed = check_coverage_pass_fail(&self.policy, &added, &modified);

        log::info!(
            "Evaluated {} added and {} modified files ({} skipped): {}",
            added.len(),
            modified.len(),
            skipped.len(),
            if passed { "pass" } else { "fail" }
        );

        EvaluationOutcome {
            added,
            modified,
            skipped,
            passed,
        }
    }

    /// Current coverage for each added file
    pub fn evaluate_added(
        &self,
        current: &CoverageReport,
        paths: &[String],
        skipped: &mut Vec<SkippedFile>,
    ) -> Vec<AddedFileResult> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            match current_coverage(current, path, FileCategory::Added) {
                Ok(coverage) => {
                    log::debug!("added {}: coverage {}", path, coverage);
                    results.push(AddedFileResult {
                        path: path.clone(),
                        coverage,
                    });
                }
                Err(skip) => skipped.push(skip),
            }
        }
        results
    }

    /// Current coverage and delta against the baseline for each modified file
    pub fn evaluate_modified(
        &self,
        current: &CoverageReport,
        baseline: Option<&CoverageReport>,
        paths: &[String],
        skipped: &mut Vec<SkippedFile>,
    ) -> Vec<ModifiedFileResult> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let coverage = match current_coverage(current, path, FileCategory::Modified) {
                Ok(coverage) => coverage,
                Err(skip) => {
                    skipped.push(skip);
                    continue;
                }
            };

            let previous = match baseline.map(|report| extract(report, path)) {
                Some(Extraction::Present(ratio)) => Some(ratio),
                Some(Extraction::Malformed { raw }) => {
                    log::warn!("Skipping {}: baseline line-rate {:?} is unreadable", path, raw);
                    skipped.push(SkippedFile {
                        path: path.clone(),
                        category: FileCategory::Modified,
                        reason: SkipReason::MalformedBaseline { raw },
                    });
                    continue;
                }
                Some(Extraction::Absent) | None => None,
            };

            // A file new to the baseline cannot have regressed.
            let delta = coverage - previous.unwrap_or(coverage);
            log::debug!("modified {}: coverage {}, delta {:+}", path, coverage, delta);
            results.push(ModifiedFileResult {
                path: path.clone(),
                coverage,
                delta,
                baseline: previous,
            });
        }
        results
    }
}

fn current_coverage(
    current: &CoverageReport,
    path: &str,
    category: FileCategory,
) -> std::result::Result<Ratio, SkippedFile> {
    let reason = match extract(current, path) {
        Extraction::Present(ratio) => return Ok(ratio),
        Extraction::Absent => {
            log::debug!("Skipping {} file {}: not in the current report", category, path);
            SkipReason::NotInstrumented
        }
        Extraction::Malformed { raw } => {
            log::warn!("Skipping {} file {}: line-rate {:?} is unreadable", category, path, raw);
            SkipReason::MalformedCurrent { raw }
        }
    };
    Err(SkippedFile {
        path: path.to_string(),
        category,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(text: &str) -> Ratio {
        Ratio::parse(text).unwrap()
    }

    fn report(rates: &[(&str, &str)]) -> CoverageReport {
        CoverageReport::from_rates(rates.iter().map(|(path, rate)| (*path, r(rate))))
    }

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn policy() -> ThresholdPolicy {
        ThresholdPolicy::new(r("0.80"), r("-0.05")).unwrap()
    }

    #[test]
    fn test_improved_file_passes() {
        let current = report(&[("a.py", "0.92")]);
        let baseline = report(&[("a.py", "0.80")]);

        let outcome = DeltaEvaluator::new(policy()).evaluate(
            &current,
            Some(&baseline),
            &[],
            &paths(&["a.py"]),
        );

        assert_eq!(outcome.modified.len(), 1);
        assert_eq!(outcome.modified[0].coverage, r("0.92"));
        assert_eq!(outcome.modified[0].delta, r("0.12"));
        assert!(outcome.passed);
    }

    #[test]
    fn test_regressed_file_fails_both_thresholds() {
        let current = report(&[("a.py", "0.40")]);
        let baseline = report(&[("a.py", "0.90")]);

        let outcome = DeltaEvaluator::new(policy()).evaluate(
            &current,
            Some(&baseline),
            &[],
            &paths(&["a.py"]),
        );

        assert_eq!(outcome.modified[0].delta, r("-0.50"));
        assert!(!outcome.passed);
        assert_eq!(outcome.violations(&policy()).len(), 2);
    }

    #[test]
    fn test_missing_baseline_report_gives_zero_delta() {
        let current = report(&[("a.py", "0.55")]);
        let policy = ThresholdPolicy::new(r("0.50"), r("-0.05")).unwrap();

        let outcome =
            DeltaEvaluator::new(policy).evaluate(&current, None, &[], &paths(&["a.py"]));

        assert!(outcome.modified[0].delta.is_zero());
        assert_eq!(outcome.modified[0].baseline, None);
        assert!(outcome.passed);
    }

    #[test]
    fn test_file_new_to_baseline_gives_zero_delta() {
        let current = report(&[("a.py", "0.10"), ("b.py", "0.95")]);
        let baseline = report(&[("b.py", "0.95")]);

        let outcome = DeltaEvaluator::new(policy()).evaluate(
            &current,
            Some(&baseline),
            &[],
            &paths(&["a.py", "b.py"]),
        );

        assert!(outcome.modified.iter().all(|m| m.delta.is_zero()));
        assert_eq!(outcome.modified[1].baseline, Some(r("0.95")));
    }

    #[test]
    fn test_files_absent_from_current_are_excluded() {
        let current = report(&[("kept.py", "0.90")]);
        let baseline = report(&[("gone.py", "0.10")]);

        let outcome = DeltaEvaluator::new(policy()).evaluate(
            &current,
            Some(&baseline),
            &paths(&["new.py"]),
            &paths(&["gone.py", "kept.py"]),
        );

        assert!(outcome.added.is_empty());
        assert_eq!(outcome.modified.len(), 1);
        assert_eq!(outcome.modified[0].path, "kept.py");
        assert_eq!(outcome.skipped.len(), 2);
        assert!(outcome
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::NotInstrumented));
        assert!(outcome.passed);
    }

    #[test]
    fn test_malformed_rates_are_skipped_not_fatal() {
        let xml = r#"<coverage>
            <class filename="bad.py" complexity="0" line-rate="oops"/>
            <class filename="good.py" complexity="0" line-rate="0.85"/>
            <class filename="old.py" complexity="0" line-rate="0.85"/>
        </coverage>"#;
        let baseline_xml = r#"<coverage>
            <class filename="old.py" complexity="0" line-rate="?"/>
        </coverage>"#;
        let current = CoverageReport::from_xml(xml).unwrap();
        let baseline = CoverageReport::from_xml(baseline_xml).unwrap();

        let outcome = DeltaEvaluator::new(policy()).evaluate(
            &current,
            Some(&baseline),
            &paths(&["bad.py", "good.py"]),
            &paths(&["old.py"]),
        );

        assert_eq!(outcome.added.len(), 1);
        assert!(outcome.modified.is_empty());
        assert_eq!(
            outcome.skipped[0].reason,
            SkipReason::MalformedCurrent { raw: "oops".into() }
        );
        assert_eq!(
            outcome.skipped[1].reason,
            SkipReason::MalformedBaseline { raw: "?".into() }
        );
        assert!(outcome.passed);
    }

    #[test]
    fn test_input_order_is_preserved() {
        let current = report(&[("c.py", "0.9"), ("a.py", "0.9"), ("b.py", "0.9")]);

        let outcome = DeltaEvaluator::new(policy()).evaluate(
            &current,
            None,
            &paths(&["c.py", "a.py", "b.py"]),
            &[],
        );

        let order: Vec<&str> = outcome.added.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(order, vec!["c.py", "a.py", "b.py"]);
    }

    #[test]
    fn test_empty_change_set_passes() {
        let outcome =
            DeltaEvaluator::new(policy()).evaluate(&CoverageReport::default(), None, &[], &[]);

        assert!(outcome.passed);
        assert_eq!(outcome.evaluated(), 0);
    }

    #[test]
    fn test_single_added_file_below_minimum_fails_run() {
        let current = report(&[("a.py", "0.99"), ("b.py", "0.79")]);

        let outcome = DeltaEvaluator::new(policy()).evaluate(
            &current,
            None,
            &paths(&["a.py", "b.py"]),
            &[],
        );

        assert!(!outcome.passed);
        let violations = outcome.violations(&policy());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path(), "b.py");
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let current = report(&[("a.py", "0.70"), ("b.py", "0.81")]);
        let baseline = report(&[("b.py", "0.90")]);
        let evaluator = DeltaEvaluator::new(policy());
        let added = paths(&["a.py"]);
        let modified = paths(&["b.py", "missing.py"]);

        let first = evaluator.evaluate(&current, Some(&baseline), &added, &modified);
        let second = evaluator.evaluate(&current, Some(&baseline), &added, &modified);

        assert_eq!(first, second);
    }

    #[test]
    fn test_check_coverage_pass_fail_on_delta_only() {
        let modified = vec![ModifiedFileResult {
            path: "a.py".into(),
            coverage: r("0.94"),
            delta: r("-0.06"),
            baseline: Some(r("1.00")),
        }];

        assert!(!check_coverage_pass_fail(&policy(), &[], &modified));
    }
}
