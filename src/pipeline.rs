//! Pipeline orchestration
//!
//! This module provides the public API for the DBI pipeline.
//! It sequences validation, scoring, aggregation and metric-card encoding over
//! one in-memory dataset. Every stage returns a new value; nothing is shared
//! between runs, so load quantiles are always recomputed from the input.

use crate::aggregate::Aggregator;
use crate::config::ScoringConfig;
use crate::dataset::Dataset;
use crate::encoder::MetricCardEncoder;
use crate::error::DbiError;
use crate::scoring::Scorer;
use crate::types::{DailySummary, MetricCards, ScoredBatch, SegmentSummary, ValidationReport};
use crate::validate::Validator;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Everything one pipeline run produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub validation: ValidationReport,
    pub scored: ScoredBatch,
    pub segments: Vec<SegmentSummary>,
    pub daily: Vec<DailySummary>,
    pub cards: MetricCards,
}

/// Score a CSV file with the default configuration.
///
/// # Example
/// ```ignore
/// let output = score_csv_file(Path::new("data/daily_usage.csv"))?;
/// println!("{} rows over {} days", output.cards.n_rows, output.cards.n_days);
/// ```
pub fn score_csv_file(path: &Path) -> Result<PipelineOutput, DbiError> {
    DbiProcessor::new().process_path(path)
}

/// Score an already-loaded dataset with the default configuration
pub fn score_dataset(dataset: &Dataset) -> Result<PipelineOutput, DbiError> {
    DbiProcessor::new().process(dataset)
}

/// Processor bound to one configuration.
///
/// Holds no per-run state: processing the same dataset twice yields equal
/// outputs.
pub struct DbiProcessor {
    config: ScoringConfig,
    encoder: MetricCardEncoder,
}

impl Default for DbiProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DbiProcessor {
    /// Create a processor with default settings
    pub fn new() -> Self {
        Self {
            config: ScoringConfig::default(),
            encoder: MetricCardEncoder::new(),
        }
    }

    /// Create a processor with a validated configuration
    pub fn with_config(config: ScoringConfig) -> Result<Self, DbiError> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: MetricCardEncoder::new(),
        })
    }

    /// Load the configuration from JSON
    pub fn load_config(&mut self, json: &str) -> Result<(), DbiError> {
        self.config = ScoringConfig::from_json(json)?;
        Ok(())
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Read a CSV file and process it
    pub fn process_path(&self, path: &Path) -> Result<PipelineOutput, DbiError> {
        let dataset = Dataset::from_path(path)?;
        self.process(&dataset)
    }

    /// Read CSV from any reader and process it
    pub fn process_reader<R: Read>(&self, reader: R) -> Result<PipelineOutput, DbiError> {
        let dataset = Dataset::from_reader(reader)?;
        self.process(&dataset)
    }

    /// Run the full pipeline.
    ///
    /// Pipeline stages:
    /// 1. Validator - schema and identity reports
    /// 2. Scorer - shares, DBI, dominance, tiers
    /// 3. Aggregator - segment and daily summaries
    /// 4. MetricCardEncoder - dataset-wide metric cards
    ///
    /// Fails only when required columns are missing.
    pub fn process(&self, dataset: &Dataset) -> Result<PipelineOutput, DbiError> {
        // Stage 1: Validate
        let validation = Validator::validate(dataset, self.config.identity_tolerance);
        if !validation.schema.missing_required_cols.is_empty() {
            return Err(DbiError::MissingColumns(
                validation.schema.missing_required_cols.clone(),
            ));
        }

        // Stage 2: Score
        let records = dataset.records();
        let scored = Scorer::score(&records, &self.config);
        debug!(rows = scored.rows.len(), "Scored records");

        // Stage 3: Aggregate
        let segments = Aggregator::segment_summary(&scored.rows);
        let daily = Aggregator::daily_summary(&scored.rows, self.config.date_policy);

        // Stage 4: Encode metric cards
        let cards = self.encoder.encode(&scored, &validation);

        info!(
            rows = cards.n_rows,
            days = cards.n_days,
            segments = segments.len(),
            avg_dbi = ?cards.avg_dbi,
            "DBI pipeline complete"
        );

        Ok(PipelineOutput {
            validation,
            scored,
            segments,
            daily,
            cards,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatePolicy;
    use crate::export::to_csv_string;
    use crate::types::{DbiTier, LoadTier};

    fn sample_csv() -> &'static str {
        "\
date,user_id,age_group,primary_device,internet_type,social_media_hours,work_or_study_hours,entertainment_hours,total_screen_time
2024-01-01,u1,18-24,Mobile,WiFi,2,2,2,6
2024-01-01,u2,18-24,Mobile,WiFi,6,0,0,6
2024-01-02,u3,25-34,Laptop,Fiber,0,0,0,0
2024-01-02,u4,25-34,Laptop,Fiber,1,4,1,6
bad-date,u5,35-44,Tablet,Mobile Data,8,1,1,10
2024-01-03,u5,35-44,Tablet,Mobile Data,x,1,1,10
"
    }

    #[test]
    fn test_process_sample() {
        let output = DbiProcessor::new()
            .process_reader(sample_csv().as_bytes())
            .unwrap();

        assert_eq!(output.scored.rows.len(), 6);
        assert_eq!(output.validation.schema.duplicate_user_id, Some(1));
        assert_eq!(output.validation.identity.rows_failing, Some(0));
        assert_eq!(output.cards.n_rows, 6);
        assert_eq!(output.cards.n_days, 3);

        let rows = &output.scored.rows;
        assert_eq!(rows[0].dbi_tier, DbiTier::Balanced);
        assert_eq!(rows[1].dbi_tier, DbiTier::Skewed);
        assert_eq!(rows[2].dbi_tier, DbiTier::Unknown);
        assert_eq!(rows[2].load_tier, LoadTier::Low);
        assert_eq!(rows[5].p_social, None);
        assert_eq!(rows[5].dbi_tier, DbiTier::Unknown);
        assert_eq!(rows[4].date, None);
    }

    #[test]
    fn test_segment_counts_match_rows() {
        let dataset = Dataset::from_reader(sample_csv().as_bytes()).unwrap();
        let output = score_dataset(&dataset).unwrap();
        let total: usize = output.segments.iter().map(|s| s.n).sum();
        assert_eq!(total, output.scored.rows.len());
    }

    #[test]
    fn test_undated_rows_follow_policy() {
        let bucket = DbiProcessor::new()
            .process_reader(sample_csv().as_bytes())
            .unwrap();
        assert_eq!(bucket.daily.len(), 4);
        assert_eq!(bucket.daily.last().unwrap().date, None);

        let dropped = DbiProcessor::with_config(ScoringConfig {
            date_policy: DatePolicy::Drop,
            ..Default::default()
        })
        .unwrap()
        .process_reader(sample_csv().as_bytes())
        .unwrap();
        assert_eq!(dropped.daily.len(), 3);
        // dropped rows still count everywhere else
        assert_eq!(dropped.cards.n_rows, 6);
    }

    #[test]
    fn test_missing_columns_abort() {
        let csv = "date,user_id,total_screen_time\n2024-01-01,u1,5\n";
        let result = DbiProcessor::new().process_reader(csv.as_bytes());

        match result {
            Err(DbiError::MissingColumns(cols)) => {
                assert!(cols.contains(&"age_group".to_string()));
                assert!(cols.contains(&"social_media_hours".to_string()));
                assert!(!cols.contains(&"date".to_string()));
            }
            other => panic!("expected MissingColumns, got {:?}", other.map(|o| o.cards)),
        }
    }

    #[test]
    fn test_outputs_are_byte_identical_across_runs() {
        let processor = DbiProcessor::new();
        let a = processor.process_reader(sample_csv().as_bytes()).unwrap();
        let b = processor.process_reader(sample_csv().as_bytes()).unwrap();

        assert_eq!(
            to_csv_string(&a.scored.rows).unwrap(),
            to_csv_string(&b.scored.rows).unwrap()
        );
        assert_eq!(
            to_csv_string(&a.segments).unwrap(),
            to_csv_string(&b.segments).unwrap()
        );
        assert_eq!(
            to_csv_string(&a.daily).unwrap(),
            to_csv_string(&b.daily).unwrap()
        );
    }

    #[test]
    fn test_load_config() {
        let mut processor = DbiProcessor::new();
        processor
            .load_config(r#"{ "dbi_balanced_ge": 0.95, "dbi_mixed_ge": 0.5 }"#)
            .unwrap();
        assert_eq!(processor.config().dbi_balanced_ge, 0.95);

        let output = processor.process_reader(sample_csv().as_bytes()).unwrap();
        assert_eq!(output.cards.thresholds.dbi_thresholds.balanced_ge, 0.95);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = DbiProcessor::with_config(ScoringConfig {
            dbi_balanced_ge: 1.5,
            ..Default::default()
        });
        assert!(matches!(result, Err(DbiError::InvalidConfig(_))));
    }
}
