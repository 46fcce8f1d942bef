//! Segment and daily aggregation
//!
//! Both summaries are grouped with ordered maps and then sorted with a total
//! order, so the same scored rows always produce the same tables.

use crate::config::DatePolicy;
use crate::stats::{mean, median, percent_where};
use crate::types::{DailySummary, DbiTier, ScoredRecord, SegmentSummary};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Grouping key for the segment summary
type SegmentKey = (Option<String>, Option<String>, Option<String>);

/// Aggregator for scored rows
pub struct Aggregator;

impl Aggregator {
    /// Summarize rows per (age group, device, internet type).
    ///
    /// Output is ordered by flagged percentage descending, then mean DBI
    /// ascending, then by segment keys. Absent values sort last.
    pub fn segment_summary(rows: &[ScoredRecord]) -> Vec<SegmentSummary> {
        let mut groups: BTreeMap<SegmentKey, Vec<&ScoredRecord>> = BTreeMap::new();
        for row in rows {
            let key = (
                row.age_group.clone(),
                row.primary_device.clone(),
                row.internet_type.clone(),
            );
            groups.entry(key).or_default().push(row);
        }

        let mut summaries: Vec<SegmentSummary> = groups
            .into_iter()
            .map(|((age_group, primary_device, internet_type), members)| SegmentSummary {
                age_group,
                primary_device,
                internet_type,
                n: members.len(),
                total_mean: mean(members.iter().map(|r| r.total_screen_time)),
                total_median: median(members.iter().map(|r| r.total_screen_time)),
                dbi_mean: mean(members.iter().map(|r| r.dbi)),
                dbi_median: median(members.iter().map(|r| r.dbi)),
                dominance_mean: mean(members.iter().map(|r| r.dominance)),
                highload_skewed_rate: percent_where(&members, |r| r.flag_highload_skewed),
                social_share_mean: mean(members.iter().map(|r| r.p_social)),
                work_share_mean: mean(members.iter().map(|r| r.p_work)),
                entertainment_share_mean: mean(members.iter().map(|r| r.p_entertainment)),
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.highload_skewed_rate
                .total_cmp(&a.highload_skewed_rate)
                .then_with(|| cmp_f64_absent_last(a.dbi_mean, b.dbi_mean))
                .then_with(|| cmp_absent_last(&a.age_group, &b.age_group))
                .then_with(|| cmp_absent_last(&a.primary_device, &b.primary_device))
                .then_with(|| cmp_absent_last(&a.internet_type, &b.internet_type))
        });

        debug!(segments = summaries.len(), "Built segment summary");
        summaries
    }

    /// Summarize rows per calendar date, ascending.
    ///
    /// Rows without a parsed date form a trailing `None` row under
    /// [`DatePolicy::Bucket`] and are left out under [`DatePolicy::Drop`].
    pub fn daily_summary(rows: &[ScoredRecord], policy: DatePolicy) -> Vec<DailySummary> {
        let mut dated: BTreeMap<NaiveDate, Vec<&ScoredRecord>> = BTreeMap::new();
        let mut undated: Vec<&ScoredRecord> = Vec::new();

        for row in rows {
            match row.date {
                Some(date) => dated.entry(date).or_default().push(row),
                None => undated.push(row),
            }
        }

        let mut summaries: Vec<DailySummary> = dated
            .into_iter()
            .map(|(date, members)| summarize_day(Some(date), &members))
            .collect();

        if !undated.is_empty() {
            match policy {
                DatePolicy::Bucket => summaries.push(summarize_day(None, &undated)),
                DatePolicy::Drop => {
                    debug!(rows = undated.len(), "Dropped undated rows from daily summary")
                }
            }
        }

        debug!(days = summaries.len(), "Built daily summary");
        summaries
    }
}

fn summarize_day(date: Option<NaiveDate>, members: &[&ScoredRecord]) -> DailySummary {
    DailySummary {
        date,
        n: members.len(),
        total_mean: mean(members.iter().map(|r| r.total_screen_time)),
        dbi_mean: mean(members.iter().map(|r| r.dbi)),
        balanced_rate: percent_where(members, |r| r.dbi_tier == DbiTier::Balanced),
        skewed_rate: percent_where(members, |r| r.dbi_tier == DbiTier::Skewed),
    }
}

fn cmp_f64_absent_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_absent_last(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
