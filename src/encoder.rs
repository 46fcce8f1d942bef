//! Metric card encoder
//!
//! Encodes a scored batch and its validation reports into the flat metric-card
//! document consumed by dashboards and report generators.

use crate::error::DbiError;
use crate::stats::{mean, percent_where};
use crate::types::{CardProducer, DbiTier, MetricCards, ScoredBatch, ValidationReport};
use crate::{DBI_VERSION, PRODUCER_NAME};
use std::collections::BTreeSet;

/// Metric card encoder
pub struct MetricCardEncoder {
    producer: CardProducer,
}

impl Default for MetricCardEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricCardEncoder {
    /// Create an encoder stamped with this crate's name and version
    pub fn new() -> Self {
        Self {
            producer: CardProducer {
                name: PRODUCER_NAME.to_string(),
                version: DBI_VERSION.to_string(),
            },
        }
    }

    /// Create an encoder with a specific producer name
    pub fn with_producer_name(name: String) -> Self {
        Self {
            producer: CardProducer {
                name,
                version: DBI_VERSION.to_string(),
            },
        }
    }

    /// Encode dataset-wide statistics.
    ///
    /// Percentages are over every scored row, so rows with an Unknown tier
    /// count in the denominator. `n_days` counts distinct parsed dates.
    pub fn encode(&self, batch: &ScoredBatch, validation: &ValidationReport) -> MetricCards {
        let rows = &batch.rows;
        let n_days = rows
            .iter()
            .filter_map(|r| r.date)
            .collect::<BTreeSet<_>>()
            .len();

        MetricCards {
            producer: self.producer.clone(),
            n_rows: rows.len(),
            n_days,
            avg_total_screen_time: mean(rows.iter().map(|r| r.total_screen_time)),
            avg_dbi: mean(rows.iter().map(|r| r.dbi)),
            balanced_rate_pct: percent_where(rows, |r| r.dbi_tier == DbiTier::Balanced),
            skewed_rate_pct: percent_where(rows, |r| r.dbi_tier == DbiTier::Skewed),
            highload_skewed_rate_pct: percent_where(rows, |r| r.flag_highload_skewed),
            thresholds: batch.thresholds,
            validation: validation.clone(),
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        batch: &ScoredBatch,
        validation: &ValidationReport,
    ) -> Result<String, DbiError> {
        let cards = self.encode(batch, validation);
        Ok(serde_json::to_string_pretty(&cards)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::scoring::Scorer;
    use crate::types::{IdentityReport, Record, SchemaReport};
    use chrono::NaiveDate;

    fn validation() -> ValidationReport {
        ValidationReport {
            schema: SchemaReport {
                n_rows: 3,
                n_cols: 9,
                missing_required_cols: vec![],
                has_missing_values: true,
                unparseable_cells: 0,
                duplicate_user_id: Some(0),
            },
            identity: IdentityReport {
                identity_check_run: true,
                max_abs_diff: Some(0.0),
                rows_failing: Some(0),
            },
        }
    }

    fn batch() -> ScoredBatch {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d);
        let record = |date, s: f64, w: f64, e: f64| Record {
            date,
            social_media_hours: Some(s),
            work_or_study_hours: Some(w),
            entertainment_hours: Some(e),
            total_screen_time: Some(s + w + e),
            ..Default::default()
        };
        Scorer::score(
            &[
                record(day(1), 2.0, 2.0, 2.0),
                record(day(1), 6.0, 0.0, 0.0),
                record(day(2), 0.0, 0.0, 0.0),
                record(None, 1.0, 1.0, 1.0),
            ],
            &ScoringConfig::default(),
        )
    }

    #[test]
    fn test_encode_metric_cards() {
        let encoder = MetricCardEncoder::with_producer_name("test-producer".to_string());
        let cards = encoder.encode(&batch(), &validation());

        assert_eq!(cards.producer.name, "test-producer");
        assert_eq!(cards.producer.version, DBI_VERSION);
        assert_eq!(cards.n_rows, 4);
        assert_eq!(cards.n_days, 2);
        assert_eq!(cards.avg_total_screen_time, Some(3.75));
        assert_eq!(cards.balanced_rate_pct, 50.0);
        assert_eq!(cards.skewed_rate_pct, 25.0);
        assert!(cards.validation.schema.has_missing_values);
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = MetricCardEncoder::new();
        let json = encoder.encode_to_json(&batch(), &validation()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["producer"]["name"], PRODUCER_NAME);
        assert_eq!(parsed["n_rows"], 4);
        assert_eq!(parsed["thresholds"]["dbi_thresholds"]["balanced_ge"], 0.8);
        assert!(parsed["thresholds"]["load_quantiles"]["q33"].is_number());
        assert_eq!(parsed["validation"]["identity"]["rows_failing"], 0);
    }

    #[test]
    fn test_encoding_is_reproducible() {
        let encoder = MetricCardEncoder::new();
        let a = encoder.encode_to_json(&batch(), &validation()).unwrap();
        let b = encoder.encode_to_json(&batch(), &validation()).unwrap();
        assert_eq!(a, b);
    }
}
