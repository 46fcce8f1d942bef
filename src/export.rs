//! Output persistence
//!
//! Writes the scored rows and summary tables as CSV and the metric cards and
//! chart series as pretty JSON.

use crate::breakdown::ChartData;
use crate::error::DbiError;
use crate::types::MetricCards;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SCORED_ROWS_FILE: &str = "scored_rows.csv";
pub const SEGMENT_SUMMARY_FILE: &str = "segment_summary.csv";
pub const DAILY_SUMMARY_FILE: &str = "daily_summary.csv";
pub const METRIC_CARDS_FILE: &str = "metric_cards.json";
pub const CHART_DATA_FILE: &str = "chart_data.json";

/// Serialize rows as CSV with a header line into any writer
pub fn write_csv<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<(), DbiError> {
    let mut csv_writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Serialize rows as a CSV string
pub fn to_csv_string<T: Serialize>(rows: &[T]) -> Result<String, DbiError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, rows)?;
    String::from_utf8(buffer).map_err(|e| DbiError::Io(std::io::Error::other(e)))
}

/// Write rows to a CSV file, replacing any existing file
pub fn write_csv_file<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), DbiError> {
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV");
    let file = fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), rows)
}

/// Write a value as pretty JSON, replacing any existing file
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), DbiError> {
    debug!(path = %path.display(), "Writing JSON");
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json + "\n")?;
    Ok(())
}

/// Paths of every file produced by one export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedFiles {
    pub scored_rows: PathBuf,
    pub segment_summary: PathBuf,
    pub daily_summary: PathBuf,
    pub metric_cards: PathBuf,
    pub chart_data: PathBuf,
}

impl ExportedFiles {
    /// Standard file layout under an output directory
    pub fn in_dir(out_dir: &Path) -> Self {
        Self {
            scored_rows: out_dir.join(SCORED_ROWS_FILE),
            segment_summary: out_dir.join(SEGMENT_SUMMARY_FILE),
            daily_summary: out_dir.join(DAILY_SUMMARY_FILE),
            metric_cards: out_dir.join(METRIC_CARDS_FILE),
            chart_data: out_dir.join(CHART_DATA_FILE),
        }
    }
}

/// Write every pipeline output into `out_dir`, creating it if needed
pub fn export_all(
    out_dir: &Path,
    output: &crate::pipeline::PipelineOutput,
    charts: &ChartData,
) -> Result<ExportedFiles, DbiError> {
    fs::create_dir_all(out_dir)?;
    let files = ExportedFiles::in_dir(out_dir);

    write_csv_file(&files.scored_rows, &output.scored.rows)?;
    write_csv_file(&files.segment_summary, &output.segments)?;
    write_csv_file(&files.daily_summary, &output.daily)?;
    write_json_file::<MetricCards>(&files.metric_cards, &output.cards)?;
    write_json_file(&files.chart_data, charts)?;

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DbiProcessor;
    use crate::types::DailySummary;
    use chrono::NaiveDate;
    use std::env;

    fn temp_dir(name: &str) -> PathBuf {
        env::temp_dir().join(format!("dbi-export-{}-{}", name, std::process::id()))
    }

    fn daily() -> Vec<DailySummary> {
        vec![
            DailySummary {
                date: NaiveDate::from_ymd_opt(2024, 1, 1),
                n: 2,
                total_mean: Some(5.5),
                dbi_mean: Some(0.5),
                balanced_rate: 50.0,
                skewed_rate: 50.0,
            },
            DailySummary {
                date: None,
                n: 1,
                total_mean: None,
                dbi_mean: None,
                balanced_rate: 0.0,
                skewed_rate: 0.0,
            },
        ]
    }

    #[test]
    fn test_csv_string_layout() {
        let csv = to_csv_string(&daily()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "date,n,total_mean,dbi_mean,balanced_rate,skewed_rate"
        );
        assert_eq!(lines[1], "2024-01-01,2,5.5,0.5,50.0,50.0");
        assert_eq!(lines[2], ",1,,,0.0,0.0");
    }

    #[test]
    fn test_write_files() {
        let dir = temp_dir("files");
        fs::create_dir_all(&dir).unwrap();

        let csv_path = dir.join(DAILY_SUMMARY_FILE);
        write_csv_file(&csv_path, &daily()).unwrap();
        assert!(fs::read_to_string(&csv_path).unwrap().starts_with("date,n"));

        let json_path = dir.join("value.json");
        write_json_file(&json_path, &serde_json::json!({ "n_rows": 3 })).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed["n_rows"], 3);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_export_all_writes_every_file() {
        let csv = "\
date,user_id,age_group,primary_device,internet_type,social_media_hours,work_or_study_hours,entertainment_hours,total_screen_time
2024-01-01,u1,18-24,Mobile,WiFi,0,6,0,6
bad,u2,25-34,Laptop,,0,0,0,0
";
        let output = DbiProcessor::new().process_reader(csv.as_bytes()).unwrap();
        let charts = ChartData::from_scored(&output.scored.rows);

        let dir = temp_dir("all");
        let files = export_all(&dir, &output, &charts).unwrap();
        assert_eq!(files, ExportedFiles::in_dir(&dir));

        for path in [
            &files.scored_rows,
            &files.segment_summary,
            &files.daily_summary,
            &files.metric_cards,
            &files.chart_data,
        ] {
            assert!(path.is_file(), "{} not written", path.display());
        }

        let scored = fs::read_to_string(&files.scored_rows).unwrap();
        let lines: Vec<&str> = scored.lines().collect();
        assert_eq!(
            lines,
            vec![
                "user_id,date,age_group,primary_device,internet_type,\
social_media_hours,work_or_study_hours,entertainment_hours,total_screen_time,\
p_social,p_work,p_entertainment,entropy,dbi,dominance,dominant_category,\
dbi_tier,load_tier,flag_highload_skewed",
                "u1,2024-01-01,18-24,Mobile,WiFi,0.0,6.0,0.0,6.0,\
0.0,1.0,0.0,0.0,0.0,1.0,Work/Study,Skewed,High,true",
                "u2,,25-34,Laptop,,0.0,0.0,0.0,0.0,,,,,,,,Unknown,Low,false",
            ]
        );

        let cards: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files.metric_cards).unwrap()).unwrap();
        assert_eq!(cards["n_rows"], 2);
        assert_eq!(cards["n_days"], 1);

        let chart_json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files.chart_data).unwrap()).unwrap();
        assert_eq!(chart_json["overview"]["n_rows"], 2);
        assert_eq!(chart_json["total_vs_dbi"][0]["dbi_tier"], "Skewed");
        assert_eq!(
            chart_json["dbi_histogram"].as_array().map(Vec::len),
            Some(crate::breakdown::DBI_HISTOGRAM_BINS)
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_exported_files_layout() {
        let files = ExportedFiles::in_dir(Path::new("out"));
        assert_eq!(files.scored_rows, Path::new("out").join("scored_rows.csv"));
        assert_eq!(files.metric_cards, Path::new("out").join("metric_cards.json"));
    }
}
