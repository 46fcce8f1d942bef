//! Tabular input
//!
//! A `Dataset` is the raw string table read from CSV. It keeps column presence
//! and untouched cell text so the validator can report on structure before any
//! value is coerced. `Dataset::records` performs the coercion into typed
//! [`Record`]s, turning anything unparseable into an absent field.

use crate::error::DbiError;
use crate::types::Record;
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Read;
use std::path::Path;
use tracing::debug;

pub const COL_DATE: &str = "date";
pub const COL_USER_ID: &str = "user_id";
pub const COL_AGE_GROUP: &str = "age_group";
pub const COL_PRIMARY_DEVICE: &str = "primary_device";
pub const COL_INTERNET_TYPE: &str = "internet_type";
pub const COL_SOCIAL: &str = "social_media_hours";
pub const COL_WORK: &str = "work_or_study_hours";
pub const COL_ENTERTAINMENT: &str = "entertainment_hours";
pub const COL_TOTAL: &str = "total_screen_time";

/// Columns every input must carry
pub const REQUIRED_COLUMNS: [&str; 9] = [
    COL_DATE,
    COL_USER_ID,
    COL_AGE_GROUP,
    COL_PRIMARY_DEVICE,
    COL_INTERNET_TYPE,
    COL_SOCIAL,
    COL_WORK,
    COL_ENTERTAINMENT,
    COL_TOTAL,
];

/// Columns taking part in the total/components identity check
pub const HOUR_COLUMNS: [&str; 4] = [COL_TOTAL, COL_SOCIAL, COL_WORK, COL_ENTERTAINMENT];

/// Cell text treated as a missing value
const MISSING_TOKENS: [&str; 9] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "<NA>"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Raw string table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset from column names and rows.
    ///
    /// Short rows are padded with empty (missing) cells; long rows are truncated.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Read a CSV with a header row from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DbiError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() || (columns.len() == 1 && columns[0].is_empty()) {
            return Err(DbiError::EmptyInput);
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        debug!(columns = columns.len(), rows = rows.len(), "Loaded CSV dataset");
        Ok(Self::new(columns, rows))
    }

    /// Read a CSV file from disk
    pub fn from_path(path: &Path) -> Result<Self, DbiError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate over the raw rows
    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Raw text of one column for every row; `None` if the column is absent
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Numeric view of one column; unparseable cells become `None`
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name)
            .map(|cells| cells.into_iter().map(parse_number).collect())
    }

    /// Coerce every row into a typed record.
    ///
    /// Absent columns produce absent fields, so callers should check
    /// required columns first.
    pub fn records(&self) -> Vec<Record> {
        let idx = |name: &str| self.column_index(name);
        let date = idx(COL_DATE);
        let user_id = idx(COL_USER_ID);
        let age_group = idx(COL_AGE_GROUP);
        let device = idx(COL_PRIMARY_DEVICE);
        let internet = idx(COL_INTERNET_TYPE);
        let social = idx(COL_SOCIAL);
        let work = idx(COL_WORK);
        let entertainment = idx(COL_ENTERTAINMENT);
        let total = idx(COL_TOTAL);

        self.rows
            .iter()
            .map(|row| {
                let cell = |i: Option<usize>| i.map(|i| row[i].as_str());
                Record {
                    user_id: cell(user_id).and_then(parse_text),
                    date: cell(date).and_then(parse_date),
                    age_group: cell(age_group).and_then(parse_text),
                    primary_device: cell(device).and_then(parse_text),
                    internet_type: cell(internet).and_then(parse_text),
                    social_media_hours: cell(social).and_then(parse_number),
                    work_or_study_hours: cell(work).and_then(parse_number),
                    entertainment_hours: cell(entertainment).and_then(parse_number),
                    total_screen_time: cell(total).and_then(parse_number),
                }
            })
            .collect()
    }
}

/// True if the cell text counts as a missing value
pub fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

/// Identifier or label text; missing tokens become `None`
pub fn parse_text(cell: &str) -> Option<String> {
    if is_missing(cell) {
        None
    } else {
        Some(cell.trim().to_string())
    }
}

/// Finite, non-negative number of hours or `None`
pub fn parse_number(cell: &str) -> Option<f64> {
    if is_missing(cell) {
        return None;
    }
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Calendar date from common date or datetime layouts; time of day is discarded
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    if is_missing(cell) {
        return None;
    }
    let text = cell.trim();

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
date,user_id,age_group,primary_device,internet_type,social_media_hours,work_or_study_hours,entertainment_hours,total_screen_time
2024-01-01,u1,18-24,Mobile,WiFi,2,2,2,6
2024-01-01,u2,25-34,Laptop,Mobile Data,6,0,0,6
not-a-date,u3,25-34,Laptop,,abc,0,0,0
";

    #[test]
    fn test_from_reader() {
        let dataset = Dataset::from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(dataset.n_rows(), 3);
        assert_eq!(dataset.n_cols(), 9);
        for col in REQUIRED_COLUMNS {
            assert!(dataset.has_column(col), "missing {col}");
        }
    }

    #[test]
    fn test_records_coerce_bad_cells_to_absent() {
        let dataset = Dataset::from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let records = dataset.records();

        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(records[0].social_media_hours, Some(2.0));
        assert_eq!(records[1].internet_type.as_deref(), Some("Mobile Data"));

        assert_eq!(records[2].date, None);
        assert_eq!(records[2].internet_type, None);
        assert_eq!(records[2].social_media_hours, None);
        assert_eq!(records[2].total_screen_time, Some(0.0));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let csv = "a,b,c\n1,2\n";
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.column("c"), Some(vec![""]));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let result = Dataset::from_reader("".as_bytes());
        assert!(matches!(result, Err(DbiError::EmptyInput)));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 3.5 "), Some(3.5));
        assert_eq!(parse_number("0"), Some(0.0));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("three"), None);
        assert_eq!(parse_number("-2"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_parse_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9);
        assert_eq!(parse_date("2024-03-09"), expected);
        assert_eq!(parse_date("2024/03/09"), expected);
        assert_eq!(parse_date("03/09/2024"), expected);
        assert_eq!(parse_date("2024-03-09 18:30:00"), expected);
        assert_eq!(parse_date("2024-03-09T18:30:00Z"), expected);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("NA"), None);
    }

    #[test]
    fn test_missing_tokens() {
        assert!(is_missing(""));
        assert!(is_missing("  "));
        assert!(is_missing("NA"));
        assert!(is_missing("null"));
        assert!(!is_missing("0"));
        assert!(!is_missing("u1"));
    }
}
