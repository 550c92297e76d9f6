use std::array;
use std::collections::HashMap;

use crate::analyzers::types::{DailyAggregate, GroupMean, Hourly, HourlySeries};
use crate::analyzers::utility::mean;
use crate::schema::HOURS;

/// Mean of each link's 24 hourly values.
pub fn daily_aggregates(series: &[HourlySeries]) -> Vec<DailyAggregate> {
    series
        .iter()
        .map(|s| DailyAggregate {
            link_id: s.link_id,
            daily_mean: mean(&s.values),
        })
        .collect()
}

/// Sorts descending by `key`. The sort is stable, so ties keep their input
/// order.
pub fn rank_descending<T>(mut items: Vec<T>, key: impl Fn(&T) -> f64) -> Vec<T> {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
    items
}

/// The `n` highest items by `key`, highest first.
pub fn top_n<T: Clone>(items: &[T], n: usize, key: impl Fn(&T) -> f64) -> Vec<T> {
    let mut ranked = rank_descending(items.to_vec(), key);
    ranked.truncate(n);
    ranked
}

/// Network-wide mean for each hour across all given series.
pub fn hourly_profile<'a>(series: impl IntoIterator<Item = &'a Hourly>) -> Hourly {
    let mut sums = [0.0; HOURS];
    let mut count = 0usize;

    for values in series {
        for (sum, value) in sums.iter_mut().zip(values) {
            *sum += value;
        }
        count += 1;
    }

    if count == 0 {
        return sums;
    }
    array::from_fn(|h| sums[h] / count as f64)
}

/// Means of `value` grouped by `group`, ranked highest first. Groups appear in
/// first-seen order before ranking; items `group` maps to `None` are left out.
pub fn group_means<T>(
    items: &[T],
    group: impl Fn(&T) -> Option<String>,
    value: impl Fn(&T) -> f64,
) -> Vec<GroupMean> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, (f64, usize)> = HashMap::new();

    for item in items {
        let Some(key) = group(item) else {
            continue;
        };
        let entry = totals.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0.0, 0)
        });
        entry.0 += value(item);
        entry.1 += 1;
    }

    let groups = order
        .into_iter()
        .filter_map(|key| {
            let (sum, links) = *totals.get(&key)?;
            Some(GroupMean {
                group: key,
                mean: sum / links as f64,
                links,
            })
        })
        .collect();

    rank_descending(groups, |g| g.mean)
}
