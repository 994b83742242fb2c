//! Per-file coverage lookup

use crate::parser::{CoverageReport, RecordedRate};
use crate::ratio::Ratio;

/// Outcome of looking up one file in one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The file has a usable line-rate
    Present(Ratio),
    /// The report has no record for the file
    Absent,
    /// The file has a record but its line-rate is unusable
    Malformed { raw: String },
}

/// Look up the line-rate recorded for exactly `path`
pub fn extract(report: &CoverageReport, path: &str) -> Extraction {
    match report.get(path) {
        Some(RecordedRate::Valid(ratio)) => Extraction::Present(*ratio),
        Some(RecordedRate::Malformed { raw }) => Extraction::Malformed { raw: raw.clone() },
        None => Extraction::Absent,
    }
}
