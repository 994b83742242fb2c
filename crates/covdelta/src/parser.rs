//! Cobertura XML parsing into per-file line-rates
//!
//! Coverage tools such as coverage.py and Cobertura write one `<class>` element
//! per source file:
//!
//! ```xml
//! <class name="a.py" filename="a.py" complexity="0" line-rate="0.92" branch-rate="0">
//! ```
//!
//! The whole document is tokenised into records keyed by the decoded
//! `filename` attribute, so lookups are exact and never depend on how a path
//! would behave inside a search pattern.

use crate::ratio::Ratio;
use crate::{CoverageError, Result};
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::Path;

/// Line-rate recorded for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRate {
    /// Decimal in `[0, 1]`
    Valid(Ratio),
    /// Attribute missing, not a plain decimal, or outside `[0, 1]`
    Malformed { raw: String },
}

impl RecordedRate {
    /// Classify the raw `line-rate` attribute text
    pub fn from_raw(raw: &str) -> Self {
        match Ratio::parse(raw) {
            Ok(ratio) if ratio.is_unit_interval() => RecordedRate::Valid(ratio),
            _ => RecordedRate::Malformed {
                raw: raw.to_string(),
            },
        }
    }
}

/// Immutable snapshot of per-file coverage
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    records: HashMap<String, RecordedRate>,
    duplicates: usize,
}

impl CoverageReport {
    /// Load a report from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_xml(&content)
    }

    /// Parse a report from Cobertura XML text
    pub fn from_xml(xml: &str) -> Result<Self> {
        CoberturaParser::new()?.parse(xml)
    }

    /// Build a report from already known rates; the first entry for a path wins
    pub fn from_rates<I, S>(rates: I) -> Self
    where
        I: IntoIterator<Item = (S, Ratio)>,
        S: Into<String>,
    {
        let mut report = Self::default();
        for (path, ratio) in rates {
            report.insert(path.into(), RecordedRate::Valid(ratio));
        }
        report
    }

    /// Recorded rate for an exact path
    pub fn get(&self, path: &str) -> Option<&RecordedRate> {
        self.records.get(path)
    }

    /// Number of distinct file records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ignored because an earlier record had the same path
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    fn insert(&mut self, path: String, rate: RecordedRate) {
        match self.records.entry(path) {
            Entry::Occupied(entry) => {
                self.duplicates += 1;
                log::debug!("Duplicate coverage record for {}, keeping the first", entry.key());
            }
            Entry::Vacant(entry) => {
                entry.insert(rate);
            }
        }
    }
}

/// Tokeniser for Cobertura documents
struct CoberturaParser {
    ignored: Regex,
    root: Regex,
    class_tag: Regex,
    attribute: Regex,
}

impl CoberturaParser {
    fn new() -> Result<Self> {
        Ok(Self {
            ignored: Regex::new(r"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>")?,
            root: Regex::new(r"<coverage[\s/>]")?,
            class_tag: Regex::new(r#"<class\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#)?,
            attribute: Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
        })
    }

    fn parse(&self, xml: &str) -> Result<CoverageReport> {
        let body = self.ignored.replace_all(xml, "");
        if !self.root.is_match(&body) {
            return Err(CoverageError::ParseError(
                "no <coverage> root element found".into(),
            ));
        }

        let mut report = CoverageReport::default();
        for tag in self.class_tag.captures_iter(&body) {
            let attributes = self.attributes(&tag[1]);
            let Some(filename) = attributes.get("filename") else {
                continue;
            };
            let rate = match attributes.get("line-rate") {
                Some(raw) => RecordedRate::from_raw(raw),
                None => RecordedRate::Malformed { raw: String::new() },
            };
            report.insert(filename.to_string(), rate);
        }

        if report.duplicates > 0 {
            log::debug!(
                "{} duplicate coverage records ignored (first match wins)",
                report.duplicates
            );
        }

        Ok(report)
    }

    /// Attribute map for one start tag; the first occurrence of a name wins
    fn attributes<'t>(&self, tag_body: &'t str) -> HashMap<&'t str, Cow<'t, str>> {
        let mut attributes = HashMap::new();
        for capture in self.attribute.captures_iter(tag_body) {
            let (Some(name), Some(value)) = (
                capture.get(1),
                capture.get(2).or_else(|| capture.get(3)),
            ) else {
                continue;
            };
            attributes
                .entry(name.as_str())
                .or_insert_with(|| decode_entities(value.as_str()));
        }
        attributes
    }
}

/// Decode the predefined XML entities and numeric character references
fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        decoded.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let entity = tail
            .find(';')
            .and_then(|end| decode_entity(&tail[1..end]).map(|ch| (ch, end)));
        match entity {
            Some((ch, end)) => {
                decoded.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = &tail[1..];
            }
        }
    }
    decoded.push_str(rest);
    Cow::Owned(decoded)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let reference = name.strip_prefix('#')?;
            let code = match reference.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => reference.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
