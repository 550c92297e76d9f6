use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use crate::analyzers::types::LinkId;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the population standard deviation given a pre-computed mean.
/// Returns 0.0 for empty input.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// Largest value of a slice, `None` when empty.
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Quantile `q` (0.0–1.0) with linear interpolation between the two closest
/// ranks, i.e. the value at position `q * (n - 1)` of the sorted series.
///
/// Returns `None` for empty input or `q` outside `[0, 1]`.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Pearson correlation coefficient of two equally long series.
///
/// Undefined (fewer than two points, mismatched lengths, or a series with no
/// variance) yields `None`.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let mx = mean(xs);
    let my = mean(ys);
    let sx = stddev(xs, mx);
    let sy = stddev(ys, my);
    if sx == 0.0 || sy == 0.0 {
        return None;
    }

    let cov = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / xs.len() as f64;

    Some(cov / (sx * sy))
}

/// Indexes rows by link id for joining. The first row of a duplicated id wins.
pub fn index_by_link<T>(rows: &[T], id: impl Fn(&T) -> LinkId) -> HashMap<LinkId, &T> {
    let mut index = HashMap::with_capacity(rows.len());
    let mut duplicates = 0usize;

    for row in rows {
        match index.entry(id(row)) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(_) => duplicates += 1,
        }
    }

    if duplicates > 0 {
        debug!(duplicates, "Duplicate link ids ignored while joining");
    }

    index
}
