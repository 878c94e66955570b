//! Sheet publisher: spreadsheet export to the feed's flatfiles
//!
//! The first row of the export holds the keys. Every other row becomes a
//! record. Outputs, with `stem` = sheet name with `-` mapped to `_`:
//! - `{stem}.csv`: header plus published rows, unchanged
//! - `{stem}.json`: array of published records
//! - `{stem}.jsonp`: the same array wrapped in `{stem}_callback(...);`
//!
//! The JSON outputs are only written when at least one record is published.

use crate::sheet::{parse_rows, write_row};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};
use verdict_common::{Error, Result};

/// `key=value` publish filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub key: String,
    pub value: String,
}

impl Filter {
    /// `Year` matches when the value occurs in the record's `Date`; other
    /// keys need an exact match. A missing field never matches.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        let field = if self.key == "Year" { "Date" } else { self.key.as_str() };
        let Some(actual) = record.get(field).and_then(Value::as_str) else {
            return false;
        };
        if self.key == "Year" {
            actual.contains(&self.value)
        } else {
            actual == self.value
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidInput(format!("filter must be key=value: {}", s)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidInput(format!("filter has an empty key: {}", s)));
        }
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Publisher options
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Worksheet name, e.g. `by-victim`
    pub sheet: String,
    pub out_dir: PathBuf,
    pub filters: Vec<Filter>,
}

impl PublishOptions {
    /// File stem and JSONP callback prefix
    pub fn stem(&self) -> String {
        self.sheet.trim().replace('-', "_")
    }
}

/// Published records plus the raw rows kept for CSV
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Publication {
    pub keys: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub records: Vec<Map<String, Value>>,
    pub filtered: usize,
}

/// What a publish run wrote
#[derive(Debug, Clone, PartialEq)]
pub struct PublishSummary {
    pub published: usize,
    pub filtered: usize,
    pub files: Vec<PathBuf>,
}

/// Turn export rows into records, applying name derivation and filters
pub fn build_publication(rows: &[Vec<String>], filters: &[Filter]) -> Result<Publication> {
    let Some((keys, body)) = rows.split_first() else {
        return Err(Error::InvalidInput("sheet has no header row".to_string()));
    };

    let mut publication = Publication {
        keys: keys.clone(),
        ..Default::default()
    };

    for row in body {
        let mut record: Map<String, Value> = keys
            .iter()
            .zip(row.iter())
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        // Config sheet rows are published as they are
        if record.contains_key("sheet") {
            publication.rows.push(row.clone());
            publication.records.push(record);
            continue;
        }

        derive_names(&mut record);

        if !filters.iter().all(|f| f.matches(&record)) {
            publication.filtered += 1;
            continue;
        }

        publication.rows.push(row.clone());
        publication.records.push(record);
    }

    Ok(publication)
}

/// Data slices need both `name_full` and `name_last`
fn derive_names(record: &mut Map<String, Value>) {
    let text = |record: &Map<String, Value>, key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    if let Some(full) = text(record, "name_full") {
        let last = full.split(' ').last().unwrap_or("").to_string();
        record.insert("name_last".to_string(), Value::String(last));
    } else {
        let first = text(record, "name_first").unwrap_or_default();
        let last = text(record, "name_last").unwrap_or_default();
        let full = format!("{} {}", first, last).trim().to_string();
        record.insert("name_full".to_string(), Value::String(full));
    }
}

/// Write the flatfiles for a publication
pub fn write_outputs(publication: &Publication, options: &PublishOptions) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&options.out_dir)?;
    let stem = options.stem();
    let mut files = Vec::new();

    let csv_path = options.out_dir.join(format!("{}.csv", stem));
    let mut csv = BufWriter::new(File::create(&csv_path)?);
    write_row(&mut csv, &publication.keys)?;
    for row in &publication.rows {
        write_row(&mut csv, row)?;
    }
    csv.flush()?;
    files.push(csv_path);

    if publication.records.is_empty() {
        debug!(sheet = %options.sheet, "No records published, skipping JSON outputs");
        return Ok(files);
    }

    let content = serde_json::to_string(&publication.records)
        .map_err(|e| Error::Internal(format!("Failed to serialize records: {}", e)))?;

    let json_path = options.out_dir.join(format!("{}.json", stem));
    std::fs::write(&json_path, &content)?;
    files.push(json_path);

    let jsonp_path = options.out_dir.join(format!("{}.jsonp", stem));
    std::fs::write(&jsonp_path, format!("{}_callback({});", stem, content))?;
    files.push(jsonp_path);

    Ok(files)
}

/// Publish a CSV export
pub fn publish_file(input: &Path, options: &PublishOptions) -> Result<PublishSummary> {
    let text = std::fs::read_to_string(input)?;
    let rows = parse_rows(&text);
    let publication = build_publication(&rows, &options.filters)?;
    let files = write_outputs(&publication, options)?;

    let summary = PublishSummary {
        published: publication.records.len(),
        filtered: publication.filtered,
        files,
    };
    info!(
        sheet = %options.sheet,
        published = summary.published,
        filtered = summary.filtered,
        "Published {}",
        input.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(lines: &[&[&str]]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|l| l.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_filter_parse() {
        let f: Filter = "Year=2015".parse().unwrap();
        assert_eq!(f.key, "Year");
        assert_eq!(f.value, "2015");
        assert!("novalue".parse::<Filter>().is_err());
        assert!("=x".parse::<Filter>().is_err());
    }

    #[test]
    fn test_name_last_derived_from_name_full() {
        let input = rows(&[
            &["Charge", "Verdict", "Count No.", "name_full"],
            &["Murder", "", "31", "Alejandra Cardona-Lamas"],
        ]);
        let publication = build_publication(&input, &[]).unwrap();
        assert_eq!(publication.records[0]["name_last"], "Cardona-Lamas");
    }

    #[test]
    fn test_name_full_built_from_parts() {
        let input = rows(&[
            &["Verdict", "Charge", "name_first", "Count No.", "name_last"],
            &["", "Attempted murder", "Kaylan", "", "Bailey"],
        ]);
        let publication = build_publication(&input, &[]).unwrap();
        assert_eq!(publication.records[0]["name_full"], "Kaylan Bailey");
    }

    #[test]
    fn test_config_rows_bypass_filters() {
        let input = rows(&[&["sheet"], &["by-victim"]]);
        let filters = vec!["Verdict=1".parse().unwrap()];
        let publication = build_publication(&input, &filters).unwrap();
        assert_eq!(publication.records.len(), 1);
        assert_eq!(publication.filtered, 0);
    }

    #[test]
    fn test_filters_year_and_exact() {
        let input = rows(&[
            &["name_full", "Date", "Verdict"],
            &["A B", "2015-07-16", "1"],
            &["C D", "2014-01-02", "1"],
            &["E F", "2015-08-01", "2"],
        ]);
        let filters = vec!["Year=2015".parse().unwrap(), "Verdict=1".parse().unwrap()];
        let publication = build_publication(&input, &filters).unwrap();

        assert_eq!(publication.records.len(), 1);
        assert_eq!(publication.rows[0][0], "A B");
        assert_eq!(publication.filtered, 2);
    }

    #[test]
    fn test_filter_on_missing_key_drops_row() {
        let input = rows(&[&["name_full"], &["A B"]]);
        let filters = vec!["Year=2015".parse().unwrap()];
        let publication = build_publication(&input, &filters).unwrap();
        assert!(publication.records.is_empty());
    }

    #[test]
    fn test_empty_sheet_is_an_error() {
        assert!(matches!(build_publication(&[], &[]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_stem_maps_dashes() {
        let options = PublishOptions {
            sheet: "by-victim".to_string(),
            out_dir: PathBuf::from("output"),
            filters: vec![],
        };
        assert_eq!(options.stem(), "by_victim");
    }
}
