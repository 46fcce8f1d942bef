//! Core types for the DBI pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: typed records, scored records, tier metadata, validation reports and
//! the aggregate tables handed to the export layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Screen-time category tracked per record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(alias = "social")]
    Social,
    #[serde(rename = "Work/Study", alias = "work")]
    Work,
    #[serde(alias = "entertainment")]
    Entertainment,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Social, Category::Work, Category::Entertainment];

    /// Display label used in exported tables and charts
    pub fn label(&self) -> &'static str {
        match self {
            Category::Social => "Social",
            Category::Work => "Work/Study",
            Category::Entertainment => "Entertainment",
        }
    }
}

/// Balance tier derived from fixed DBI thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbiTier {
    Balanced,
    Mixed,
    Skewed,
    Unknown,
}

/// Load tier derived from batch quantiles of total screen time.
///
/// These labels are relative to the batch being scored. "High" means "in the
/// top third of this dataset", not an absolute amount of screen time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadTier {
    Low,
    Medium,
    High,
    Unknown,
}

/// One user-day row with typed, possibly absent fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub user_id: Option<String>,
    /// Calendar date; absent when missing or unparseable
    pub date: Option<NaiveDate>,
    pub age_group: Option<String>,
    pub primary_device: Option<String>,
    pub internet_type: Option<String>,
    /// Social media hours
    pub social_media_hours: Option<f64>,
    /// Work or study hours
    pub work_or_study_hours: Option<f64>,
    /// Entertainment hours
    pub entertainment_hours: Option<f64>,
    /// Total screen time (hours)
    pub total_screen_time: Option<f64>,
}

impl Record {
    /// Component hours for a category
    pub fn hours(&self, category: Category) -> Option<f64> {
        match category {
            Category::Social => self.social_media_hours,
            Category::Work => self.work_or_study_hours,
            Category::Entertainment => self.entertainment_hours,
        }
    }
}

/// Record plus every field derived by the scorer.
///
/// Field order matches the exported `scored_rows.csv` column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub user_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub age_group: Option<String>,
    pub primary_device: Option<String>,
    pub internet_type: Option<String>,
    pub social_media_hours: Option<f64>,
    pub work_or_study_hours: Option<f64>,
    pub entertainment_hours: Option<f64>,
    pub total_screen_time: Option<f64>,
    pub p_social: Option<f64>,
    pub p_work: Option<f64>,
    pub p_entertainment: Option<f64>,
    /// Shannon entropy (natural log) over the three shares
    pub entropy: Option<f64>,
    /// Entropy normalized by ln(3), 0-1
    pub dbi: Option<f64>,
    /// Largest present share
    pub dominance: Option<f64>,
    pub dominant_category: Option<Category>,
    pub dbi_tier: DbiTier,
    pub load_tier: LoadTier,
    pub flag_highload_skewed: bool,
}

impl ScoredRecord {
    /// Share for a category
    pub fn share(&self, category: Category) -> Option<f64> {
        match category {
            Category::Social => self.p_social,
            Category::Work => self.p_work,
            Category::Entertainment => self.p_entertainment,
        }
    }
}

/// Fixed DBI cut points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbiThresholds {
    pub balanced_ge: f64,
    pub mixed_ge: f64,
}

/// Quantile cut points of total screen time computed from the scored batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadQuantiles {
    pub q33: Option<f64>,
    pub q66: Option<f64>,
}

/// Thresholds actually applied during one scoring run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub dbi_thresholds: DbiThresholds,
    pub load_quantiles: LoadQuantiles,
}

/// Output of the scoring stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBatch {
    pub rows: Vec<ScoredRecord>,
    pub thresholds: TierThresholds,
}

/// Structural checks over the raw table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub n_rows: usize,
    pub n_cols: usize,
    pub missing_required_cols: Vec<String>,
    /// True when any cell is missing or could not be parsed
    pub has_missing_values: bool,
    /// Present date or hour cells that could not be parsed (bad dates,
    /// non-numeric or negative hours); these become absent when scored
    pub unparseable_cells: usize,
    /// Count of repeated user identifiers; `None` when the column is absent
    pub duplicate_user_id: Option<usize>,
}

/// Result of checking `total == social + work + entertainment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityReport {
    pub identity_check_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_abs_diff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_failing: Option<usize>,
}

impl IdentityReport {
    pub fn not_run() -> Self {
        Self {
            identity_check_run: false,
            max_abs_diff: None,
            rows_failing: None,
        }
    }
}

/// Both validation reports, as embedded in the metric cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub schema: SchemaReport,
    pub identity: IdentityReport,
}

/// One row of the segment summary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub age_group: Option<String>,
    pub primary_device: Option<String>,
    pub internet_type: Option<String>,
    pub n: usize,
    pub total_mean: Option<f64>,
    pub total_median: Option<f64>,
    pub dbi_mean: Option<f64>,
    pub dbi_median: Option<f64>,
    pub dominance_mean: Option<f64>,
    /// Percentage (0-100) of rows flagged high-load and skewed
    pub highload_skewed_rate: f64,
    pub social_share_mean: Option<f64>,
    pub work_share_mean: Option<f64>,
    pub entertainment_share_mean: Option<f64>,
}

/// One row of the daily summary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// `None` is the bucket for rows whose date could not be parsed
    pub date: Option<NaiveDate>,
    pub n: usize,
    pub total_mean: Option<f64>,
    pub dbi_mean: Option<f64>,
    pub balanced_rate: f64,
    pub skewed_rate: f64,
}

/// Producer block embedded in the metric cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardProducer {
    pub name: String,
    pub version: String,
}

/// Flat dataset-wide summary consumed by dashboards and report generators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCards {
    pub producer: CardProducer,
    pub n_rows: usize,
    pub n_days: usize,
    pub avg_total_screen_time: Option<f64>,
    pub avg_dbi: Option<f64>,
    pub balanced_rate_pct: f64,
    pub skewed_rate_pct: f64,
    pub highload_skewed_rate_pct: f64,
    pub thresholds: TierThresholds,
    pub validation: ValidationReport,
}
