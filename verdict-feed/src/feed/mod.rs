//! Feed model: slices, raw records and deployment profiles
//!
//! A deployment fetches one or more named slices per refresh cycle. Data
//! slices carry verdict rows; the optional config slice names which data
//! slice gets rendered.

pub mod client;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::normalize::VerdictTable;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub use client::{FeedClient, FeedError};

/// Slice identifier. `-` and `_` are equivalent (`by-victim` == `by_victim`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceName(String);

impl SliceName {
    pub fn new(name: &str) -> Self {
        Self(name.trim().replace('-', "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SliceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fetched slice: the decoded top-level array, rows still untyped
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub name: SliceName,
    pub rows: Vec<Value>,
}

impl Slice {
    pub fn new(name: SliceName, rows: Vec<Value>) -> Self {
        Self { name, rows }
    }

    /// Convert rows to records. Malformed rows are skipped and reported.
    pub fn records(&self, diagnostics: &mut Diagnostics) -> Vec<RawRecord> {
        let mut records = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            match RawRecord::from_value(row) {
                Ok(record) => records.push(record),
                Err(reason) => diagnostics.push(Diagnostic::MalformedRecord {
                    slice: self.name.to_string(),
                    index,
                    reason,
                }),
            }
        }
        records
    }

    /// The `sheet` named by the first row of a config slice
    pub fn configured_sheet(&self) -> Option<SliceName> {
        self.rows
            .first()
            .and_then(|row| row.get("sheet"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|sheet| !sheet.is_empty())
            .map(SliceName::new)
    }
}

/// One row from a data slice
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    /// Defendant full name; the grouping key
    #[serde(deserialize_with = "string_or_number")]
    pub name_full: String,
    /// Free-text charge description
    #[serde(rename = "Charge", deserialize_with = "string_or_number")]
    pub charge: String,
    /// Coded verdict (`""`, `"0"`, `"1"`, `"2"`)
    #[serde(rename = "Verdict", deserialize_with = "string_or_number")]
    pub verdict: String,
}

impl RawRecord {
    pub fn new(name_full: &str, charge: &str, verdict: &str) -> Self {
        Self {
            name_full: name_full.to_string(),
            charge: charge.to_string(),
            verdict: verdict.to_string(),
        }
    }

    /// Build a record from one JSON row. Extra fields are ignored.
    pub fn from_value(row: &Value) -> Result<Self, String> {
        RawRecord::deserialize(row).map_err(|e| e.to_string())
    }
}

/// Accept a string cell, or a numeric cell as its decimal text.
/// Spreadsheet exports are not consistent about quoting codes.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or number, found {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Payload encoding served by the feed host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// Plain JSON array
    Json,
    /// JSON array wrapped in `callback(...);`
    Jsonp,
}

impl FeedFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FeedFormat::Json => "json",
            FeedFormat::Jsonp => "jsonp",
        }
    }
}

/// Deployment profile: which slices to fetch and the defaults that go with them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeedProfile {
    /// Penalty-phase feed: one combined `death_penalty` slice
    Sentencing,
    /// Guilt-phase feed: `config`, `numeric` and `by_victim` slices
    Trial,
}

impl FeedProfile {
    pub fn slice_plan(self) -> SlicePlan {
        match self {
            FeedProfile::Sentencing => SlicePlan {
                config: None,
                data: vec![SliceName::new("death_penalty")],
                default_sheet: Some(SliceName::new("death_penalty")),
            },
            FeedProfile::Trial => SlicePlan {
                config: Some(SliceName::new("config")),
                data: vec![SliceName::new("numeric"), SliceName::new("by_victim")],
                default_sheet: None,
            },
        }
    }

    pub fn default_refresh(self) -> Duration {
        match self {
            FeedProfile::Sentencing => Duration::from_secs(5),
            FeedProfile::Trial => Duration::from_secs(300),
        }
    }

    pub fn default_table(self) -> VerdictTable {
        match self {
            FeedProfile::Sentencing => VerdictTable::Sentencing,
            FeedProfile::Trial => VerdictTable::Trial,
        }
    }

    /// Only the sentencing page suppressed the colon after the enhancer count
    pub fn default_suppress_enhancer_colon(self) -> bool {
        matches!(self, FeedProfile::Sentencing)
    }
}

/// Slices fetched by one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicePlan {
    /// Slice whose first row names the sheet to render
    pub config: Option<SliceName>,
    /// Data slices
    pub data: Vec<SliceName>,
    /// Sheet rendered when there is no config slice
    pub default_sheet: Option<SliceName>,
}

impl SlicePlan {
    /// Every slice fetched per cycle, config first
    pub fn slices(&self) -> Vec<SliceName> {
        self.config.iter().chain(self.data.iter()).cloned().collect()
    }

    /// Distinct successful slices needed before rendering
    pub fn required_count(&self) -> usize {
        self.slices().len()
    }

    pub fn contains(&self, name: &SliceName) -> bool {
        self.config.as_ref() == Some(name) || self.data.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slice_name_treats_dash_and_underscore_alike() {
        assert_eq!(SliceName::new("by-victim"), SliceName::new("by_victim"));
        assert_eq!(SliceName::new(" numeric ").as_str(), "numeric");
    }

    #[test]
    fn test_record_from_value_ignores_extra_fields() {
        let row = json!({
            "Charge": "Attempted murder in the first degree, after deliberation and with intent",
            "Verdict": "",
            "Count No.": "31",
            "name_full": "Alejandra Cardona-Lamas"
        });
        let record = RawRecord::from_value(&row).unwrap();
        assert_eq!(record.name_full, "Alejandra Cardona-Lamas");
        assert_eq!(record.verdict, "");
    }

    #[test]
    fn test_record_from_value_accepts_numeric_verdict() {
        let row = json!({"name_full": "Doe, John", "Charge": "Murder", "Verdict": 1});
        assert_eq!(RawRecord::from_value(&row).unwrap().verdict, "1");
    }

    #[test]
    fn test_record_from_value_reports_missing_field() {
        let row = json!({"name_full": "Doe, John", "Verdict": "1"});
        let err = RawRecord::from_value(&row).unwrap_err();
        assert!(err.contains("Charge"), "{}", err);

        let err = RawRecord::from_value(&json!("nope")).unwrap_err();
        assert!(err.contains("invalid type"), "{}", err);

        let row = json!({"name_full": null, "Charge": "Murder", "Verdict": "1"});
        let err = RawRecord::from_value(&row).unwrap_err();
        assert!(err.contains("found null"), "{}", err);
    }

    #[test]
    fn test_slice_records_skips_and_reports_malformed_rows() {
        let slice = Slice::new(
            SliceName::new("numeric"),
            vec![
                json!({"name_full": "A", "Charge": "c1", "Verdict": "1"}),
                json!({"name_full": null, "Charge": "c2", "Verdict": "1"}),
                json!({"name_full": "A", "Charge": "c3", "Verdict": "2"}),
            ],
        );
        let mut diagnostics = Diagnostics::new();
        let records = slice.records(&mut diagnostics);

        assert_eq!(records.len(), 2);
        assert_eq!(diagnostics.malformed_count(), 1);
        assert!(matches!(
            diagnostics.entries()[0],
            Diagnostic::MalformedRecord { index: 1, .. }
        ));
    }

    #[test]
    fn test_configured_sheet_reads_first_row() {
        let config = Slice::new(
            SliceName::new("config"),
            vec![json!({"sheet": "by-victim"}), json!({"sheet": "numeric"})],
        );
        assert_eq!(config.configured_sheet(), Some(SliceName::new("by_victim")));

        let empty = Slice::new(SliceName::new("config"), vec![json!({"sheet": ""})]);
        assert_eq!(empty.configured_sheet(), None);
    }

    #[test]
    fn test_profile_plans() {
        let sentencing = FeedProfile::Sentencing.slice_plan();
        assert_eq!(sentencing.required_count(), 1);
        assert_eq!(sentencing.default_sheet, Some(SliceName::new("death_penalty")));

        let trial = FeedProfile::Trial.slice_plan();
        assert_eq!(trial.required_count(), 3);
        assert_eq!(trial.slices()[0], SliceName::new("config"));
        assert!(trial.contains(&SliceName::new("by-victim")));
        assert!(!trial.contains(&SliceName::new("death_penalty")));
    }

    #[test]
    fn test_profile_defaults() {
        assert_eq!(FeedProfile::Sentencing.default_refresh(), Duration::from_secs(5));
        assert_eq!(FeedProfile::Trial.default_refresh(), Duration::from_secs(300));
        assert_eq!(FeedProfile::Sentencing.default_table(), VerdictTable::Sentencing);
        assert_eq!(FeedProfile::Trial.default_table(), VerdictTable::Trial);
        assert!(FeedProfile::Sentencing.default_suppress_enhancer_colon());
        assert!(!FeedProfile::Trial.default_suppress_enhancer_colon());
    }
}
