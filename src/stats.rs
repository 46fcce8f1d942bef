//! Descriptive statistics over optional values
//!
//! Absent entries are skipped, and every function returns `None` when nothing
//! is left to summarize.

/// Arithmetic mean of the present values
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Median of the present values (mean of the two middle values for even counts)
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    quantile(values, 0.5)
}

/// Quantile with linear interpolation between order statistics.
///
/// For `n` sorted values the position is `q * (n - 1)`; fractional positions
/// interpolate between the two neighbours.
pub fn quantile<I>(values: I, q: f64) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sorted: Vec<f64> = values.into_iter().flatten().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Percentage (0-100) of items matching a predicate; 0 for empty input
pub fn percent_where<T, F>(items: &[T], predicate: F) -> f64
where
    F: Fn(&T) -> bool,
{
    if items.is_empty() {
        return 0.0;
    }
    let hits = items.iter().filter(|item| predicate(item)).count();
    hits as f64 / items.len() as f64 * 100.0
}
