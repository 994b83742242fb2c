//! Loading of coverage snapshots and change lists

use crate::config::{GateConfig, PathListFormat};
use crate::evaluator::FileCategory;
use crate::parser::CoverageReport;
use crate::{CoverageError, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identifies one of the two coverage snapshots
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReportLocator {
    /// The candidate under evaluation
    Current,
    /// The comparison point, named by branch or revision
    Baseline(String),
}

/// Reads reports and path lists from disk, caching parsed reports
#[derive(Debug)]
pub struct ReportStore {
    config: GateConfig,
    cache: HashMap<ReportLocator, Arc<CoverageReport>>,
}

impl ReportStore {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            cache: HashMap::new(),
        }
    }

    /// File a locator points at
    pub fn locate(&self, locator: &ReportLocator) -> PathBuf {
        match locator {
            ReportLocator::Current => self.config.current_report_path(),
            ReportLocator::Baseline(id) => self.config.baseline_report_path(id),
        }
    }

    /// Load and parse a report, failing with `ReportNotFound` if the file is missing
    pub fn load_report(&mut self, locator: &ReportLocator) -> Result<Arc<CoverageReport>> {
        if let Some(report) = self.cache.get(locator) {
            return Ok(Arc::clone(report));
        }

        let path = self.locate(locator);
        let content = read_document(&path)?;
        let report = Arc::new(CoverageReport::from_xml(&content)?);
        log::info!(
            "Loaded {:?} coverage report {} ({} files)",
            locator,
            path.display(),
            report.len()
        );

        self.cache.insert(locator.clone(), Arc::clone(&report));
        Ok(report)
    }

    /// The candidate report; any failure here is fatal to the run
    pub fn current_report(&mut self) -> Result<Arc<CoverageReport>> {
        self.load_report(&ReportLocator::Current)
    }

    /// The baseline report, or `None` when there is nothing usable to compare against
    pub fn baseline_report(&mut self, baseline: &str) -> Option<Arc<CoverageReport>> {
        let locator = ReportLocator::Baseline(baseline.to_string());
        match self.load_report(&locator) {
            Ok(report) => Some(report),
            Err(CoverageError::ReportNotFound { path }) => {
                log::info!(
                    "No baseline report for {:?} at {}; modified files get a zero delta",
                    baseline,
                    path.display()
                );
                None
            }
            Err(err) => {
                log::warn!(
                    "Ignoring baseline report for {:?}: {}; modified files get a zero delta",
                    baseline,
                    err
                );
                None
            }
        }
    }

    /// Read the added or modified path list
    pub fn load_path_list(&self, category: FileCategory) -> Result<Vec<String>> {
        let path = match category {
            FileCategory::Added => self.config.added_list_path(),
            FileCategory::Modified => self.config.modified_list_path(),
        };
        let content = fs::read_to_string(&path).map_err(|err| CoverageError::PathList {
            path: path.clone(),
            message: err.to_string(),
        })?;
        let paths = parse_path_list(&content, self.config.files.format, &path)?;
        log::debug!("{} {} files listed in {}", paths.len(), category, path.display());
        Ok(paths)
    }
}

/// Parse a path list in the configured format
///
/// A JSON list must be an array of strings; anything else, including an
/// empty document, is rejected.
pub fn parse_path_list(
    content: &str,
    format: PathListFormat,
    source: &Path,
) -> Result<Vec<String>> {
    match format {
        PathListFormat::Json => {
            serde_json::from_str::<Vec<String>>(content).map_err(|err| CoverageError::PathList {
                path: source.to_path_buf(),
                message: err.to_string(),
            })
        }
        PathListFormat::Lines => Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
    }
}

fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => CoverageError::ReportNotFound {
            path: path.to_path_buf(),
        },
        _ => CoverageError::IoError(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REPORT: &str =
        r#"<coverage><class filename="a.py" complexity="0" line-rate="0.5"/></coverage>"#;

    fn store_in(dir: &TempDir) -> ReportStore {
        ReportStore::new(GateConfig::default().with_root(dir.path()))
    }

    #[test]
    fn test_load_current_report() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("coverage.xml"), REPORT).unwrap();
        let mut store = store_in(&dir);

        let report = store.current_report().unwrap();
        assert_eq!(report.len(), 1);

        // Second load comes from the cache even if the file disappears
        fs::remove_file(dir.path().join("coverage.xml")).unwrap();
        assert!(store.current_report().is_ok());
    }

    #[test]
    fn test_missing_current_report_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        assert!(matches!(
            store.current_report(),
            Err(CoverageError::ReportNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_or_broken_baseline_is_none() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(store.baseline_report("main").is_none());

        fs::write(dir.path().join("coverage-main.xml"), "not xml at all").unwrap();
        assert!(store.baseline_report("main").is_none());

        fs::write(dir.path().join("coverage-develop.xml"), REPORT).unwrap();
        assert!(store.baseline_report("develop").is_some());
    }

    #[test]
    fn test_locate() {
        let store = ReportStore::new(GateConfig::default().with_root("/ci"));
        assert_eq!(
            store.locate(&ReportLocator::Baseline("feature/x".into())),
            PathBuf::from("/ci/coverage-feature-x.xml")
        );
    }

    #[test]
    fn test_load_path_lists() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("files_added.json"), r#"["a.py", "b/c.py"]"#).unwrap();
        fs::write(dir.path().join("files_modified.json"), r#"["a.py", "#).unwrap();
        let store = store_in(&dir);

        assert_eq!(
            store.load_path_list(FileCategory::Added).unwrap(),
            vec!["a.py".to_string(), "b/c.py".to_string()]
        );
        assert!(matches!(
            store.load_path_list(FileCategory::Modified),
            Err(CoverageError::PathList { .. })
        ));
    }

    #[test]
    fn test_missing_path_list_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let err = store.load_path_list(FileCategory::Added).unwrap_err();
        assert!(err.to_string().contains("files_added.json"));
    }

    #[test]
    fn test_parse_json_path_list() {
        let source = Path::new("list");
        let json = PathListFormat::Json;

        assert_eq!(parse_path_list("[]", json, source).unwrap(), Vec::<String>::new());
        assert_eq!(
            parse_path_list(" [\"a.py\"]\n", json, source).unwrap(),
            vec!["a.py".to_string()]
        );
        assert!(parse_path_list("[1, 2]", json, source).is_err());
        assert!(parse_path_list("", json, source).is_err());
        assert!(parse_path_list("\"a.py\"", json, source).is_err());
        assert!(parse_path_list("a.py\nb.py\n", json, source).is_err());
        assert!(matches!(
            parse_path_list(r#"{"modified": ["a.py"]}"#, json, source),
            Err(CoverageError::PathList { .. })
        ));
    }

    #[test]
    fn test_parse_line_path_list() {
        let source = Path::new("list");

        assert_eq!(
            parse_path_list("  a.py\n\n b.py \n", PathListFormat::Lines, source).unwrap(),
            vec!["a.py".to_string(), "b.py".to_string()]
        );
        assert!(parse_path_list("", PathListFormat::Lines, source)
            .unwrap()
            .is_empty());
    }
}
