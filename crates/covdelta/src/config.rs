//! Run configuration for the coverage gate
//!
//! One `GateConfig` is assembled at process entry and handed to the report
//! store and the evaluator. Layers apply in order: built-in defaults, a TOML
//! file, workflow inputs from the environment, then command-line flags.

use crate::ratio::Ratio;
use crate::thresholds::ThresholdPolicy;
use crate::{CoverageError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Workflow input carrying the minimum coverage for added/modified files
pub const ENV_MIN_NEW_COVERAGE: &str = "INPUT_MINNEWCOVERAGE";
/// Workflow input carrying the allowed coverage drop for modified files
pub const ENV_MAX_COVERAGE_CHANGE: &str = "INPUT_MAXCOVERAGECHANGE";
/// Workflow input naming the baseline branch or revision
pub const ENV_BASELINE: &str = "INPUT_BASELINE";

/// Placeholder replaced by the baseline identifier in the baseline report path
pub const BASELINE_PLACEHOLDER: &str = "{baseline}";

/// Where the two coverage snapshots live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportPaths {
    /// Candidate report
    pub current: PathBuf,
    /// Baseline report path template, may contain `{baseline}`
    pub baseline: String,
}

impl Default for ReportPaths {
    fn default() -> Self {
        Self {
            current: PathBuf::from("coverage.xml"),
            baseline: format!("coverage-{}.xml", BASELINE_PLACEHOLDER),
        }
    }
}

/// Encoding of the added/modified path lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathListFormat {
    /// A JSON array of path strings
    #[default]
    Json,
    /// One path per line, blank lines ignored
    Lines,
}

/// Where the added/modified path lists live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileListPaths {
    pub added: PathBuf,
    pub modified: PathBuf,
    pub format: PathListFormat,
}

impl Default for FileListPaths {
    fn default() -> Self {
        Self {
            added: PathBuf::from("files_added.json"),
            modified: PathBuf::from("files_modified.json"),
            format: PathListFormat::Json,
        }
    }
}

/// Complete, immutable parameters of one gate run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Threshold policy applied to every file
    pub policy: ThresholdPolicy,
    /// Baseline branch or revision identifier
    pub baseline: String,
    /// Directory relative paths resolve against
    pub root: PathBuf,
    /// Coverage report locations
    pub reports: ReportPaths,
    /// Path list locations
    pub files: FileListPaths,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            policy: ThresholdPolicy::default(),
            baseline: "main".into(),
            root: PathBuf::from("."),
            reports: ReportPaths::default(),
            files: FileListPaths::default(),
        }
    }
}

/// On-disk TOML layout; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    preset: Option<String>,
    #[serde(alias = "minNewCoverage")]
    min_new_coverage: Option<Ratio>,
    #[serde(alias = "maxCoverageChange")]
    max_coverage_change: Option<Ratio>,
    baseline: Option<String>,
    root: Option<PathBuf>,
    reports: Option<ReportPaths>,
    files: Option<FileListPaths>,
}

impl GateConfig {
    /// Load a TOML file on top of the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::default().merge_toml(&content)
    }

    /// Apply the keys present in a TOML document
    pub fn merge_toml(mut self, content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;

        if let Some(preset) = file.preset {
            self.policy = ThresholdPolicy::preset(&preset)?;
        }
        if let Some(min) = file.min_new_coverage {
            self.policy = self.policy.with_min_coverage(min)?;
        }
        if let Some(change) = file.max_coverage_change {
            self.policy = self.policy.with_max_coverage_change(change)?;
        }
        if let Some(baseline) = file.baseline {
            self.baseline = baseline;
        }
        if let Some(root) = file.root {
            self.root = root;
        }
        if let Some(reports) = file.reports {
            self.reports = reports;
        }
        if let Some(files) = file.files {
            self.files = files;
        }

        Ok(self)
    }

    /// Apply workflow inputs from the process environment
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply workflow inputs from any variable lookup; empty values are unset
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(min) = read(ENV_MIN_NEW_COVERAGE) {
            let min = Ratio::parse(&min).map_err(|e| env_error(ENV_MIN_NEW_COVERAGE, e))?;
            self.policy = self.policy.with_min_coverage(min)?;
        }
        if let Some(change) = read(ENV_MAX_COVERAGE_CHANGE) {
            let change =
                Ratio::parse(&change).map_err(|e| env_error(ENV_MAX_COVERAGE_CHANGE, e))?;
            self.policy = self.policy.with_max_coverage_change(change)?;
        }
        if let Some(baseline) = read(ENV_BASELINE) {
            self.baseline = baseline.trim().to_string();
        }

        Ok(self)
    }

    /// Builder pattern: set minimum coverage
    pub fn with_min_coverage(mut self, min: Ratio) -> Result<Self> {
        self.policy = self.policy.with_min_coverage(min)?;
        Ok(self)
    }

    /// Builder pattern: set allowed coverage change
    pub fn with_max_coverage_change(mut self, change: Ratio) -> Result<Self> {
        self.policy = self.policy.with_max_coverage_change(change)?;
        Ok(self)
    }

    /// Builder pattern: set baseline identifier
    pub fn with_baseline(mut self, baseline: impl Into<String>) -> Self {
        self.baseline = baseline.into();
        self
    }

    /// Builder pattern: set root directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Resolve a configured path against the root directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Candidate report location
    pub fn current_report_path(&self) -> PathBuf {
        self.resolve(&self.reports.current)
    }

    /// Baseline report location for a baseline identifier
    ///
    /// Branch names such as `release/1.2` become `release-1.2` so they stay a
    /// single path component.
    pub fn baseline_report_path(&self, baseline: &str) -> PathBuf {
        let component = baseline.replace(['/', '\\'], "-");
        let path = self.reports.baseline.replace(BASELINE_PLACEHOLDER, &component);
        self.resolve(Path::new(&path))
    }

    pub fn added_list_path(&self) -> PathBuf {
        self.resolve(&self.files.added)
    }

    pub fn modified_list_path(&self) -> PathBuf {
        self.resolve(&self.files.modified)
    }
}

fn env_error(name: &str, err: CoverageError) -> CoverageError {
    CoverageError::ConfigError(format!("{}: {}", name, err))
}
