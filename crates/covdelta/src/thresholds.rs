//! Coverage threshold policy

use crate::ratio::Ratio;
use crate::{CoverageError, Result};
use serde::Serialize;
use std::fmt;

/// Limits every added or modified file must satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdPolicy {
    /// Minimum line-rate for every evaluated file
    min_coverage: Ratio,
    /// Lowest allowed delta for modified files (never positive)
    max_coverage_change: Ratio,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            min_coverage: Ratio::hundredths(80),
            max_coverage_change: Ratio::hundredths(-5),
        }
    }
}

impl ThresholdPolicy {
    /// Build a validated policy
    ///
    /// A positive `max_coverage_change` is read as the size of the allowed
    /// drop and negated, so `0.05` and `-0.05` mean the same thing.
    pub fn new(min_coverage: Ratio, max_coverage_change: Ratio) -> Result<Self> {
        if !min_coverage.is_unit_interval() {
            return Err(CoverageError::ConfigError(format!(
                "minimum coverage {} is outside [0, 1]",
                min_coverage
            )));
        }

        let max_coverage_change = if max_coverage_change.is_positive() {
            log::debug!(
                "Reading max coverage change {} as an allowed drop of -{}",
                max_coverage_change,
                max_coverage_change
            );
            -max_coverage_change
        } else {
            max_coverage_change
        };

        if max_coverage_change < -Ratio::ONE {
            return Err(CoverageError::ConfigError(format!(
                "max coverage change {} is below -1",
                max_coverage_change
            )));
        }

        Ok(Self {
            min_coverage,
            max_coverage_change,
        })
    }

    /// Require high coverage and forbid any regression
    pub fn strict() -> Self {
        Self {
            min_coverage: Ratio::hundredths(90),
            max_coverage_change: Ratio::ZERO,
        }
    }

    /// Permissive limits for repositories still building up tests
    pub fn relaxed() -> Self {
        Self {
            min_coverage: Ratio::hundredths(50),
            max_coverage_change: Ratio::hundredths(-10),
        }
    }

    /// Look up a named preset
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "default" => Ok(Self::default()),
            "strict" => Ok(Self::strict()),
            "relaxed" => Ok(Self::relaxed()),
            other => Err(CoverageError::ConfigError(format!(
                "unknown threshold preset {:?} (expected default, strict or relaxed)",
                other
            ))),
        }
    }

    pub fn min_coverage(&self) -> Ratio {
        self.min_coverage
    }

    pub fn max_coverage_change(&self) -> Ratio {
        self.max_coverage_change
    }

    /// Whether a file's coverage satisfies the minimum
    pub fn coverage_passes(&self, coverage: Ratio) -> bool {
        coverage >= self.min_coverage
    }

    /// Whether a modified file's delta stays within the allowed drop
    pub fn delta_passes(&self, delta: Ratio) -> bool {
        delta >= self.max_coverage_change
    }

    /// Replace the minimum coverage, keeping validation
    pub fn with_min_coverage(self, min_coverage: Ratio) -> Result<Self> {
        Self::new(min_coverage, self.max_coverage_change)
    }

    /// Replace the max coverage change, keeping validation
    pub fn with_max_coverage_change(self, max_coverage_change: Ratio) -> Result<Self> {
        Self::new(self.min_coverage, max_coverage_change)
    }
}

/// A single threshold a file failed to meet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    CoverageBelowMinimum {
        path: String,
        coverage: Ratio,
        minimum: Ratio,
    },
    DropExceeded {
        path: String,
        delta: Ratio,
        allowed: Ratio,
    },
}

impl Violation {
    pub fn path(&self) -> &str {
        match self {
            Violation::CoverageBelowMinimum { path, .. } | Violation::DropExceeded { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::CoverageBelowMinimum {
                path,
                coverage,
                minimum,
            } => write!(
                f,
                "{}: coverage {} is below the minimum {}",
                path, coverage, minimum
            ),
            Violation::DropExceeded {
                path,
                delta,
                allowed,
            } => write!(
                f,
                "{}: coverage dropped by {}, more than the allowed {}",
                path,
                delta.abs(),
                allowed.abs()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(text: &str) -> Ratio {
        Ratio::parse(text).unwrap()
    }

    #[test]
    fn test_default_policy() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.min_coverage(), r("0.8"));
        assert_eq!(policy.max_coverage_change(), r("-0.05"));
    }

    #[test]
    fn test_positive_change_is_negated() {
        let policy = ThresholdPolicy::new(r("0.8"), r("0.05")).unwrap();
        assert_eq!(policy.max_coverage_change(), r("-0.05"));

        let same = ThresholdPolicy::new(r("0.8"), r("-0.05")).unwrap();
        assert_eq!(policy, same);
    }

    #[test]
    fn test_invalid_policy() {
        assert!(ThresholdPolicy::new(r("1.2"), r("0")).is_err());
        assert!(ThresholdPolicy::new(r("-0.1"), r("0")).is_err());
        assert!(ThresholdPolicy::new(r("0.5"), r("-1.5")).is_err());
    }

    #[test]
    fn test_boundaries_pass() {
        let policy = ThresholdPolicy::new(r("0.80"), r("-0.05")).unwrap();

        assert!(policy.coverage_passes(r("0.8")));
        assert!(!policy.coverage_passes(r("0.7999")));
        assert!(policy.delta_passes(r("-0.050")));
        assert!(!policy.delta_passes(r("-0.0501")));
        assert!(policy.delta_passes(r("0.3")));
    }

    #[test]
    fn test_presets() {
        assert_eq!(ThresholdPolicy::preset("strict").unwrap(), ThresholdPolicy::strict());
        assert_eq!(ThresholdPolicy::preset("relaxed").unwrap(), ThresholdPolicy::relaxed());
        assert!(ThresholdPolicy::preset("lenient").is_err());
        assert!(ThresholdPolicy::strict().delta_passes(Ratio::ZERO));
        assert!(!ThresholdPolicy::strict().delta_passes(r("-0.01")));
    }

    #[test]
    fn test_violation_display() {
        let violation = Violation::DropExceeded {
            path: "a.py".into(),
            delta: r("-0.50"),
            allowed: r("-0.05"),
        };
        assert_eq!(
            violation.to_string(),
            "a.py: coverage dropped by 0.50, more than the allowed 0.05"
        );
        assert_eq!(violation.path(), "a.py");
    }
}
