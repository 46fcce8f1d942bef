//! Input validation
//!
//! Produces the schema and identity reports. Validation never fails on cell
//! content; the only structural problem worth stopping for (missing required
//! columns) is reported here and acted on by the pipeline.

use crate::dataset::{
    is_missing, parse_date, parse_number, parse_text, Dataset, COL_DATE, COL_ENTERTAINMENT,
    COL_SOCIAL, COL_TOTAL, COL_USER_ID, COL_WORK, HOUR_COLUMNS, REQUIRED_COLUMNS,
};
use crate::types::{IdentityReport, SchemaReport, ValidationReport};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Validator for raw datasets
pub struct Validator;

impl Validator {
    /// Run both checks
    pub fn validate(dataset: &Dataset, identity_tolerance: f64) -> ValidationReport {
        ValidationReport {
            schema: Self::schema_report(dataset),
            identity: Self::identity_report(dataset, identity_tolerance),
        }
    }

    /// Structural checks: required columns, missing cells, duplicate ids.
    ///
    /// A date or hour cell that is present but cannot be parsed counts as
    /// missing, since scoring treats it as absent.
    pub fn schema_report(dataset: &Dataset) -> SchemaReport {
        let missing_required_cols: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !dataset.has_column(col))
            .map(|col| col.to_string())
            .collect();

        let unparseable_cells = count_unparseable(dataset);
        let has_missing_values = unparseable_cells > 0
            || dataset
                .rows()
                .any(|row| row.iter().any(|cell| is_missing(cell)));

        let duplicate_user_id = dataset
            .column(COL_USER_ID)
            .map(|ids| count_duplicates(ids.into_iter().map(parse_text)));

        if unparseable_cells > 0 {
            warn!(unparseable_cells, "Unparseable date or hour cells treated as missing");
        }
        if let Some(dupes) = duplicate_user_id.filter(|d| *d > 0) {
            warn!(duplicates = dupes, "Duplicate user identifiers in input");
        }
        debug!(
            rows = dataset.n_rows(),
            cols = dataset.n_cols(),
            missing_required = missing_required_cols.len(),
            has_missing_values,
            "Schema report"
        );

        SchemaReport {
            n_rows: dataset.n_rows(),
            n_cols: dataset.n_cols(),
            missing_required_cols,
            has_missing_values,
            unparseable_cells,
            duplicate_user_id,
        }
    }

    /// Check `total == social + work + entertainment` per row.
    ///
    /// Rows where any of the four values is absent do not contribute to the
    /// maximum and are never counted as failing.
    pub fn identity_report(dataset: &Dataset, tolerance: f64) -> IdentityReport {
        if HOUR_COLUMNS.iter().any(|col| !dataset.has_column(col)) {
            debug!("Identity check skipped: hour columns absent");
            return IdentityReport::not_run();
        }

        let (Some(total), Some(social), Some(work), Some(entertainment)) = (
            dataset.numeric_column(COL_TOTAL),
            dataset.numeric_column(COL_SOCIAL),
            dataset.numeric_column(COL_WORK),
            dataset.numeric_column(COL_ENTERTAINMENT),
        ) else {
            return IdentityReport::not_run();
        };

        // (abs diff, magnitude of the operands)
        let diffs: Vec<(f64, f64)> = (0..total.len())
            .filter_map(|i| {
                let lhs = total[i]?;
                let rhs = social[i]? + work[i]? + entertainment[i]?;
                Some(((lhs - rhs).abs(), lhs.abs().max(rhs.abs())))
            })
            .collect();

        let max_abs_diff = diffs.iter().map(|(d, _)| *d).reduce(f64::max);
        let rows_failing = diffs
            .iter()
            .filter(|(d, magnitude)| exceeds_tolerance(*d, tolerance, *magnitude))
            .count();

        if rows_failing > 0 {
            warn!(
                rows_failing,
                ?max_abs_diff,
                "Total screen time does not match component hours"
            );
        }

        IdentityReport {
            identity_check_run: true,
            max_abs_diff,
            rows_failing: Some(rows_failing),
        }
    }
}

/// Compare a difference against the tolerance, ignoring the rounding error
/// of subtracting two doubles of the given magnitude.
fn exceeds_tolerance(diff: f64, tolerance: f64, magnitude: f64) -> bool {
    let rounding = 4.0 * f64::EPSILON * magnitude.max(1.0);
    diff - tolerance > rounding
}

/// Present cells in the date and hour columns that fail to parse
fn count_unparseable(dataset: &Dataset) -> usize {
    let dates = count_failing(dataset, COL_DATE, |cell| parse_date(cell).is_some());
    let hours: usize = HOUR_COLUMNS
        .iter()
        .map(|&col| count_failing(dataset, col, |cell| parse_number(cell).is_some()))
        .sum();
    dates + hours
}

fn count_failing(dataset: &Dataset, column: &str, parses: fn(&str) -> bool) -> usize {
    dataset.column(column).map_or(0, |cells| {
        cells
            .into_iter()
            .filter(|&cell| !is_missing(cell) && !parses(cell))
            .count()
    })
}

/// Count occurrences of a value after its first appearance
fn count_duplicates<I>(values: I) -> usize
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut seen = HashSet::new();
    values.into_iter().filter(|v| !seen.insert(v.clone())).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dataset(columns: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn full_columns() -> Vec<&'static str> {
        REQUIRED_COLUMNS.to_vec()
    }

    #[test]
    fn test_schema_report_complete() {
        let ds = dataset(
            &full_columns(),
            &[
                &["2024-01-01", "u1", "18-24", "Mobile", "WiFi", "2", "2", "2", "6"],
                &["2024-01-01", "u1", "18-24", "Mobile", "WiFi", "1", "1", "1", "3"],
                &["2024-01-02", "u2", "25-34", "Laptop", "WiFi", "1", "1", "1", "3"],
            ],
        );
        let report = Validator::schema_report(&ds);

        assert_eq!(
            report,
            SchemaReport {
                n_rows: 3,
                n_cols: 9,
                missing_required_cols: vec![],
                has_missing_values: false,
                unparseable_cells: 0,
                duplicate_user_id: Some(1),
            }
        );
    }

    #[test]
    fn test_schema_report_missing_columns_and_cells() {
        let ds = dataset(
            &["date", "age_group", "total_screen_time"],
            &[&["2024-01-01", "", "5"]],
        );
        let report = Validator::schema_report(&ds);

        assert_eq!(
            report.missing_required_cols,
            vec![
                "user_id",
                "primary_device",
                "internet_type",
                "social_media_hours",
                "work_or_study_hours",
                "entertainment_hours",
            ]
        );
        assert!(report.has_missing_values);
        assert_eq!(report.duplicate_user_id, None);
    }

    #[test]
    fn test_unparseable_cells_count_as_missing() {
        let ds = dataset(
            &full_columns(),
            &[
                &["not-a-date", "u1", "18-24", "Mobile", "WiFi", "abc", "2", "2", "6"],
                &["2024-01-01", "u2", "18-24", "Mobile", "WiFi", "1", "-2", "1", "3"],
                &["2024-01-02", "u3", "18-24", "Mobile", "WiFi", "1", "1", "1", "3"],
            ],
        );
        let report = Validator::schema_report(&ds);

        assert_eq!(report.unparseable_cells, 3);
        assert!(report.has_missing_values);

        // the same row is scored with absent fields
        let records = ds.records();
        assert_eq!(records[0].date, None);
        assert_eq!(records[0].social_media_hours, None);
        assert_eq!(records[1].work_or_study_hours, None);
    }

    #[test]
    fn test_single_bad_date_is_reported() {
        let ds = dataset(
            &full_columns(),
            &[&["not-a-date", "u1", "18-24", "Mobile", "WiFi", "2", "2", "2", "6"]],
        );
        let report = Validator::schema_report(&ds);
        assert_eq!(report.unparseable_cells, 1);
        assert!(report.has_missing_values);
    }

    #[test]
    fn test_identity_within_tolerance() {
        let ds = dataset(
            &full_columns(),
            &[&["2024-01-01", "u1", "a", "d", "n", "4", "3", "2.999999999", "10"]],
        );
        let report = Validator::identity_report(&ds, 1e-9);

        assert!(report.identity_check_run);
        assert!((report.max_abs_diff.unwrap() - 1e-9).abs() < 1e-12);
        assert_eq!(report.rows_failing, Some(0));
    }

    #[test]
    fn test_identity_failing_row() {
        let ds = dataset(
            &full_columns(),
            &[
                &["2024-01-01", "u1", "a", "d", "n", "4", "3", "2.5", "10"],
                &["2024-01-01", "u2", "a", "d", "n", "x", "3", "2", "10"],
            ],
        );
        let report = Validator::identity_report(&ds, 1e-9);

        assert_eq!(report.max_abs_diff, Some(0.5));
        assert_eq!(report.rows_failing, Some(1));
    }

    #[test]
    fn test_identity_not_run_without_hour_columns() {
        let ds = dataset(&["date", "total_screen_time"], &[&["2024-01-01", "5"]]);
        let report = Validator::identity_report(&ds, 1e-9);
        assert_eq!(report, IdentityReport::not_run());
    }

    #[test]
    fn test_exceeds_tolerance_ignores_rounding() {
        let diff = (10.0_f64 - 9.999999999).abs();
        assert!(diff > 1e-9);
        assert!(!exceeds_tolerance(diff, 1e-9, 10.0));
        assert!(exceeds_tolerance(2e-9, 1e-9, 10.0));
        assert!(exceeds_tolerance(0.5, 1e-9, 10.0));
    }

    #[test]
    fn test_count_duplicates_includes_missing_ids() {
        let ids = vec![None, Some("a".to_string()), None, Some("a".to_string())];
        assert_eq!(count_duplicates(ids), 2);
    }
}
