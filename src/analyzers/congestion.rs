//! Hourly congestion indices.
//!
//! Three different metrics live here and are never mixed:
//! - weighted congestion: volume over the link's weighted practical capacity,
//! - peak-ratio congestion: volume over the link's own busiest hour,
//! - speed congestion: relative drop from the link's free-flow speed.

use std::array;

use tracing::warn;

use crate::analyzers::types::{
    CapacityEstimate, Hourly, HourlySeries, PeakCongestion, SpeedCongestion, SpeedRecord,
};
use crate::analyzers::utility::{max, mean};

/// `volume[h] / final_capacity` for every hour. Values above 1.0 mean the
/// link ran over its estimated capacity and are kept as is.
pub fn weighted_congestion(estimates: &[CapacityEstimate]) -> Vec<HourlySeries> {
    estimates
        .iter()
        .map(|e| HourlySeries {
            link_id: e.link_id,
            values: array::from_fn(|h| e.hourly_volume[h] / e.final_capacity),
        })
        .collect()
}

/// `volume[h] / max(volume)` for every hour, dropping links that saw no
/// traffic at all.
pub fn peak_ratio_congestion(volumes: &[HourlySeries]) -> Vec<PeakCongestion> {
    let scored: Vec<PeakCongestion> = volumes
        .iter()
        .filter_map(|series| {
            let max_volume = max(&series.values).filter(|m| *m > 0.0)?;
            let hourly: Hourly = array::from_fn(|h| series.values[h] / max_volume);

            Some(PeakCongestion {
                link_id: series.link_id,
                avg_congestion_score: mean(&hourly),
                max_volume,
                total_volume: series.values.iter().sum(),
                hourly,
            })
        })
        .collect();

    if scored.len() < volumes.len() {
        warn!(
            excluded = volumes.len() - scored.len(),
            "Links with no traffic excluded from peak-ratio congestion"
        );
    }
    scored
}

/// `(max_speed - speed[h]) / max_speed` for every hour.
///
/// Links whose highest hourly speed does not exceed `min_free_flow_speed`
/// have no meaningful free-flow reference and are dropped.
pub fn speed_congestion(records: &[SpeedRecord], min_free_flow_speed: f64) -> Vec<SpeedCongestion> {
    let scored: Vec<SpeedCongestion> = records
        .iter()
        .filter_map(|record| {
            let max_speed = max(&record.hourly_speed).filter(|m| *m > min_free_flow_speed)?;
            let hourly: Hourly = array::from_fn(|h| (max_speed - record.hourly_speed[h]) / max_speed);

            Some(SpeedCongestion {
                link_id: record.link_id,
                road_name: record.road_name.clone(),
                road_class: record.road_class.clone(),
                max_speed,
                avg_speed: mean(&record.hourly_speed),
                avg_congestion: mean(&hourly),
                hourly,
            })
        })
        .collect();

    if scored.len() < records.len() {
        warn!(
            excluded = records.len() - scored.len(),
            min_free_flow_speed, "Links below the free-flow speed floor excluded"
        );
    }
    scored
}
