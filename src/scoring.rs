//! DBI scoring
//!
//! Turns typed records into scored records: category shares, Shannon entropy,
//! the normalized Digital Balance Index, dominance and tier labels.
//!
//! Load tiers use cut points computed from the batch being scored, so the same
//! record can land in a different load tier when scored alongside different
//! data. The cut points actually applied are returned with the rows.

use crate::config::ScoringConfig;
use crate::stats::quantile;
use crate::types::{
    Category, DbiThresholds, DbiTier, LoadQuantiles, LoadTier, Record, ScoredBatch, ScoredRecord,
    TierThresholds,
};
use tracing::debug;

/// Scorer for record batches
pub struct Scorer;

impl Scorer {
    /// Score a whole batch.
    ///
    /// Quantiles are taken over every present `total_screen_time` in `records`
    /// before any row is tiered.
    pub fn score(records: &[Record], config: &ScoringConfig) -> ScoredBatch {
        let totals = || records.iter().map(|r| r.total_screen_time);
        let thresholds = TierThresholds {
            dbi_thresholds: DbiThresholds {
                balanced_ge: config.dbi_balanced_ge,
                mixed_ge: config.dbi_mixed_ge,
            },
            load_quantiles: LoadQuantiles {
                q33: quantile(totals(), config.load_low_quantile),
                q66: quantile(totals(), config.load_high_quantile),
            },
        };

        debug!(
            rows = records.len(),
            q33 = ?thresholds.load_quantiles.q33,
            q66 = ?thresholds.load_quantiles.q66,
            "Computed load quantiles"
        );

        let rows = records
            .iter()
            .map(|record| Self::score_record(record, &thresholds, &config.tie_break))
            .collect();

        ScoredBatch { rows, thresholds }
    }

    /// Score one record against already-computed thresholds
    pub fn score_record(
        record: &Record,
        thresholds: &TierThresholds,
        tie_break: &[Category; 3],
    ) -> ScoredRecord {
        let total = record.total_screen_time;
        let shares = Category::ALL.map(|category| compute_share(record.hours(category), total));
        let [p_social, p_work, p_entertainment] = shares;

        let entropy = compute_entropy(&shares);
        let dbi = entropy.map(normalize_entropy);
        let (dominance, dominant_category) = compute_dominance(&shares, tie_break);

        let dbi_tier = classify_dbi(dbi, &thresholds.dbi_thresholds);
        let load_tier = classify_load(total, &thresholds.load_quantiles);
        let flag_highload_skewed = load_tier == LoadTier::High && dbi_tier == DbiTier::Skewed;

        ScoredRecord {
            user_id: record.user_id.clone(),
            date: record.date,
            age_group: record.age_group.clone(),
            primary_device: record.primary_device.clone(),
            internet_type: record.internet_type.clone(),
            social_media_hours: record.social_media_hours,
            work_or_study_hours: record.work_or_study_hours,
            entertainment_hours: record.entertainment_hours,
            total_screen_time: total,
            p_social,
            p_work,
            p_entertainment,
            entropy,
            dbi,
            dominance,
            dominant_category,
            dbi_tier,
            load_tier,
            flag_highload_skewed,
        }
    }
}

/// Share of total for one component.
///
/// Absent when either operand is absent or the total is exactly zero. A zero
/// share and an absent share are different things downstream.
pub fn compute_share(hours: Option<f64>, total: Option<f64>) -> Option<f64> {
    match (hours, total) {
        (Some(h), Some(t)) if t != 0.0 => Some(h / t),
        _ => None,
    }
}

/// Shannon entropy (natural log) over the shares.
///
/// Formula: `-Σ p·ln(p)` with `0·ln(0) = 0`. Any absent share makes the
/// entropy absent. Shares are expected in [0, 1]; the loader turns negative
/// hours into absent values before they get here.
pub fn compute_entropy(shares: &[Option<f64>; 3]) -> Option<f64> {
    let mut entropy = 0.0;
    for share in shares {
        let p = (*share)?;
        if p > 0.0 {
            entropy -= p * p.ln();
        }
    }
    Some(entropy)
}

/// Normalize entropy by `ln(3)` into the 0-1 DBI range
pub fn normalize_entropy(entropy: f64) -> f64 {
    (entropy / 3f64.ln()).clamp(0.0, 1.0)
}

/// Largest present share and the category that holds it.
///
/// Ties go to whichever category comes first in `tie_break`.
pub fn compute_dominance(
    shares: &[Option<f64>; 3],
    tie_break: &[Category; 3],
) -> (Option<f64>, Option<Category>) {
    let share_of = |category: Category| match category {
        Category::Social => shares[0],
        Category::Work => shares[1],
        Category::Entertainment => shares[2],
    };

    let mut best: Option<(f64, Category)> = None;
    for &category in tie_break {
        if let Some(p) = share_of(category) {
            match best {
                Some((max, _)) if p <= max => {}
                _ => best = Some((p, category)),
            }
        }
    }

    (best.map(|(p, _)| p), best.map(|(_, c)| c))
}

/// DBI tier from fixed cut points
pub fn classify_dbi(dbi: Option<f64>, thresholds: &DbiThresholds) -> DbiTier {
    match dbi {
        None => DbiTier::Unknown,
        Some(d) if d >= thresholds.balanced_ge => DbiTier::Balanced,
        Some(d) if d >= thresholds.mixed_ge => DbiTier::Mixed,
        Some(_) => DbiTier::Skewed,
    }
}

/// Load tier from the batch quantiles: below q33 is Low, below q66 is Medium
pub fn classify_load(total: Option<f64>, quantiles: &LoadQuantiles) -> LoadTier {
    match (total, quantiles.q33, quantiles.q66) {
        (Some(t), Some(q33), _) if t < q33 => LoadTier::Low,
        (Some(t), _, Some(q66)) if t < q66 => LoadTier::Medium,
        (Some(_), Some(_), Some(_)) => LoadTier::High,
        _ => LoadTier::Unknown,
    }
}
