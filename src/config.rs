//! Scoring configuration
//!
//! Every tunable used by the validator, scorer and aggregator lives here so a
//! run is fully described by its input plus one `ScoringConfig`.

use crate::error::DbiError;
use crate::types::Category;
use serde::{Deserialize, Serialize};

/// Default DBI cut point for the Balanced tier
pub const DEFAULT_DBI_BALANCED_GE: f64 = 0.80;

/// Default DBI cut point for the Mixed tier
pub const DEFAULT_DBI_MIXED_GE: f64 = 0.60;

/// Default lower load quantile
pub const DEFAULT_LOAD_LOW_QUANTILE: f64 = 0.33;

/// Default upper load quantile
pub const DEFAULT_LOAD_HIGH_QUANTILE: f64 = 0.66;

/// Default tolerance for the total/components identity check
pub const DEFAULT_IDENTITY_TOLERANCE: f64 = 1e-9;

/// What the daily summary does with rows whose date could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// Group them into a trailing row with an absent date
    #[default]
    Bucket,
    /// Leave them out of the daily table
    Drop,
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub dbi_balanced_ge: f64,
    pub dbi_mixed_ge: f64,
    pub load_low_quantile: f64,
    pub load_high_quantile: f64,
    pub identity_tolerance: f64,
    /// Priority order used when two or more shares tie for the maximum
    pub tie_break: [Category; 3],
    pub date_policy: DatePolicy,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            dbi_balanced_ge: DEFAULT_DBI_BALANCED_GE,
            dbi_mixed_ge: DEFAULT_DBI_MIXED_GE,
            load_low_quantile: DEFAULT_LOAD_LOW_QUANTILE,
            load_high_quantile: DEFAULT_LOAD_HIGH_QUANTILE,
            identity_tolerance: DEFAULT_IDENTITY_TOLERANCE,
            tie_break: Category::ALL,
            date_policy: DatePolicy::Bucket,
        }
    }
}

impl ScoringConfig {
    /// Load a configuration from JSON; omitted fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, DbiError> {
        let config: ScoringConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, DbiError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check thresholds, quantiles and tie-break order for consistency
    pub fn validate(&self) -> Result<(), DbiError> {
        let unit = 0.0..=1.0;

        if !unit.contains(&self.dbi_balanced_ge) || !unit.contains(&self.dbi_mixed_ge) {
            return Err(DbiError::InvalidConfig(
                "DBI thresholds must lie in [0, 1]".to_string(),
            ));
        }
        if self.dbi_mixed_ge > self.dbi_balanced_ge {
            return Err(DbiError::InvalidConfig(format!(
                "dbi_mixed_ge ({}) must not exceed dbi_balanced_ge ({})",
                self.dbi_mixed_ge, self.dbi_balanced_ge
            )));
        }
        if !unit.contains(&self.load_low_quantile) || !unit.contains(&self.load_high_quantile) {
            return Err(DbiError::InvalidConfig(
                "load quantiles must lie in [0, 1]".to_string(),
            ));
        }
        if self.load_low_quantile > self.load_high_quantile {
            return Err(DbiError::InvalidConfig(format!(
                "load_low_quantile ({}) must not exceed load_high_quantile ({})",
                self.load_low_quantile, self.load_high_quantile
            )));
        }
        if self.identity_tolerance.is_nan() || self.identity_tolerance < 0.0 {
            return Err(DbiError::InvalidConfig(
                "identity_tolerance must be non-negative".to_string(),
            ));
        }
        if Category::ALL.iter().any(|c| !self.tie_break.contains(c)) {
            return Err(DbiError::InvalidConfig(
                "tie_break must list each category exactly once".to_string(),
            ));
        }

        Ok(())
    }
}
