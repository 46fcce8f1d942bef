//! Chart-ready breakdowns and row filtering
//!
//! Data series behind the standard DBI charts, plus the allow-list filter a
//! dashboard applies before recomputing them. Nothing here draws anything.

use crate::stats::{mean, percent_where};
use crate::types::{Category, DbiTier, ScoredRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Number of equal-width DBI histogram bins on [0, 1]
pub const DBI_HISTOGRAM_BINS: usize = 30;

/// Label used for absent grouping keys in chart series
pub const ABSENT_LABEL: &str = "(missing)";

/// Allow-list filter over scored rows. `None` means "allow everything".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub age_groups: Option<Vec<String>>,
    pub devices: Option<Vec<String>>,
    pub internet_types: Option<Vec<String>>,
    pub tiers: Option<Vec<DbiTier>>,
}

impl RecordFilter {
    pub fn matches(&self, row: &ScoredRecord) -> bool {
        allows(&self.age_groups, row.age_group.as_deref())
            && allows(&self.devices, row.primary_device.as_deref())
            && allows(&self.internet_types, row.internet_type.as_deref())
            && self
                .tiers
                .as_ref()
                .map_or(true, |tiers| tiers.contains(&row.dbi_tier))
    }

    /// Rows passing the filter, in input order
    pub fn apply<'a>(&self, rows: &'a [ScoredRecord]) -> Vec<&'a ScoredRecord> {
        rows.iter().filter(|row| self.matches(row)).collect()
    }
}

fn allows(list: &Option<Vec<String>>, value: Option<&str>) -> bool {
    match (list, value) {
        (None, _) => true,
        (Some(allowed), Some(v)) => allowed.iter().any(|a| a == v),
        (Some(_), None) => false,
    }
}

/// One histogram bin `[lower, upper)`; the last bin also holds 1.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Mean shares for one age group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionRow {
    pub age_group: String,
    pub social: Option<f64>,
    pub work: Option<f64>,
    pub entertainment: Option<f64>,
}

/// Mean DBI for one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledMean {
    pub label: String,
    pub mean_dbi: Option<f64>,
    pub n: usize,
}

/// Mean DBI grid, `values[row][col]` for `rows[row]` × `cols[col]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// Row count per dominant category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// One point of the total screen time vs DBI scatter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub total_screen_time: f64,
    pub dbi: f64,
    pub dbi_tier: DbiTier,
}

/// Mean DBI for one (device, internet type) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInternetMean {
    pub primary_device: String,
    pub internet_type: String,
    pub mean_dbi: Option<f64>,
    pub n: usize,
}

/// Headline figures for the charted rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub n_rows: usize,
    pub avg_total_screen_time: Option<f64>,
    pub avg_dbi: Option<f64>,
    pub balanced_pct: f64,
    pub highload_skewed_pct: f64,
}

/// Every chart series for one set of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub overview: Overview,
    pub total_vs_dbi: Vec<ScatterPoint>,
    pub dbi_histogram: Vec<HistogramBin>,
    pub composition_by_age_group: Vec<CompositionRow>,
    pub dbi_by_device: Vec<LabeledMean>,
    pub dbi_by_internet_type: Vec<LabeledMean>,
    pub dbi_by_device_internet: Vec<DeviceInternetMean>,
    pub dbi_heatmap_age_device: Heatmap,
    pub dominant_category_counts: Vec<CategoryCount>,
}

impl ChartData {
    pub fn from_scored<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a ScoredRecord>,
    {
        let rows: Vec<&ScoredRecord> = rows.into_iter().collect();
        Self {
            overview: overview(&rows),
            total_vs_dbi: total_vs_dbi(&rows),
            dbi_histogram: dbi_histogram(&rows, DBI_HISTOGRAM_BINS),
            composition_by_age_group: composition_by_age_group(&rows),
            dbi_by_device: mean_dbi_by(&rows, |r| r.primary_device.as_deref()),
            dbi_by_internet_type: mean_dbi_by(&rows, |r| r.internet_type.as_deref()),
            dbi_by_device_internet: mean_dbi_by_device_internet(&rows),
            dbi_heatmap_age_device: dbi_heatmap(&rows),
            dominant_category_counts: dominant_category_counts(&rows),
        }
    }
}

fn label(value: Option<&str>) -> String {
    value.unwrap_or(ABSENT_LABEL).to_string()
}

/// Row count, averages and tier rates over the given rows.
///
/// Rates are percentages of all rows, so Unknown tiers count in the
/// denominator.
pub fn overview(rows: &[&ScoredRecord]) -> Overview {
    Overview {
        n_rows: rows.len(),
        avg_total_screen_time: mean(rows.iter().map(|r| r.total_screen_time)),
        avg_dbi: mean(rows.iter().map(|r| r.dbi)),
        balanced_pct: percent_where(rows, |r| r.dbi_tier == DbiTier::Balanced),
        highload_skewed_pct: percent_where(rows, |r| r.flag_highload_skewed),
    }
}

/// Rows with both a total and a DBI, in input order
pub fn total_vs_dbi(rows: &[&ScoredRecord]) -> Vec<ScatterPoint> {
    rows.iter()
        .filter_map(|r| {
            Some(ScatterPoint {
                total_screen_time: r.total_screen_time?,
                dbi: r.dbi?,
                dbi_tier: r.dbi_tier,
            })
        })
        .collect()
}

/// Equal-width histogram of present DBI values over [0, 1]
pub fn dbi_histogram(rows: &[&ScoredRecord], bins: usize) -> Vec<HistogramBin> {
    if bins == 0 {
        return Vec::new();
    }
    let width = 1.0 / bins as f64;
    let mut counts = vec![0usize; bins];
    for dbi in rows.iter().filter_map(|r| r.dbi) {
        let idx = ((dbi / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: i as f64 * width,
            upper: (i + 1) as f64 * width,
            count,
        })
        .collect()
}

/// Mean shares per age group, ascending by age group
pub fn composition_by_age_group(rows: &[&ScoredRecord]) -> Vec<CompositionRow> {
    let mut groups: BTreeMap<String, Vec<&ScoredRecord>> = BTreeMap::new();
    for &row in rows {
        groups.entry(label(row.age_group.as_deref())).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(age_group, members)| CompositionRow {
            age_group,
            social: mean(members.iter().map(|r| r.share(Category::Social))),
            work: mean(members.iter().map(|r| r.share(Category::Work))),
            entertainment: mean(members.iter().map(|r| r.share(Category::Entertainment))),
        })
        .collect()
}

/// Mean DBI per label, highest first; groups without any DBI sort last
pub fn mean_dbi_by<F>(rows: &[&ScoredRecord], key: F) -> Vec<LabeledMean>
where
    F: Fn(&ScoredRecord) -> Option<&str>,
{
    let mut groups: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    for &row in rows {
        groups.entry(label(key(row))).or_default().push(row.dbi);
    }

    let mut means: Vec<LabeledMean> = groups
        .into_iter()
        .map(|(label, values)| LabeledMean {
            label,
            n: values.len(),
            mean_dbi: mean(values),
        })
        .collect();

    // stable sort keeps label order among equal means
    means.sort_by(|a, b| match (a.mean_dbi, b.mean_dbi) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    means
}

/// Mean DBI per (device, internet type), ascending by device then internet type
pub fn mean_dbi_by_device_internet(rows: &[&ScoredRecord]) -> Vec<DeviceInternetMean> {
    let mut groups: BTreeMap<(String, String), Vec<Option<f64>>> = BTreeMap::new();
    for &row in rows {
        let key = (
            label(row.primary_device.as_deref()),
            label(row.internet_type.as_deref()),
        );
        groups.entry(key).or_default().push(row.dbi);
    }

    groups
        .into_iter()
        .map(|((primary_device, internet_type), values)| DeviceInternetMean {
            primary_device,
            internet_type,
            n: values.len(),
            mean_dbi: mean(values),
        })
        .collect()
}

/// Mean DBI by age group (rows) and device (columns)
pub fn dbi_heatmap(rows: &[&ScoredRecord]) -> Heatmap {
    let mut cells: BTreeMap<(String, String), Vec<Option<f64>>> = BTreeMap::new();
    for &row in rows {
        let key = (
            label(row.age_group.as_deref()),
            label(row.primary_device.as_deref()),
        );
        cells.entry(key).or_default().push(row.dbi);
    }

    let row_labels: Vec<String> = cells
        .keys()
        .map(|(age, _)| age.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let col_labels: Vec<String> = cells
        .keys()
        .map(|(_, device)| device.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let values = row_labels
        .iter()
        .map(|age| {
            col_labels
                .iter()
                .map(|device| {
                    cells
                        .get(&(age.clone(), device.clone()))
                        .and_then(|values| mean(values.iter().copied()))
                })
                .collect()
        })
        .collect();

    Heatmap {
        rows: row_labels,
        cols: col_labels,
        values,
    }
}

/// Rows per dominant category, most frequent first
pub fn dominant_category_counts(rows: &[&ScoredRecord]) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
    for category in rows.iter().filter_map(|r| r.dominant_category) {
        *counts.entry(category).or_default() += 1;
    }

    let mut counts: Vec<(Category, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.label().to_string(),
            count,
        })
        .collect()
}
