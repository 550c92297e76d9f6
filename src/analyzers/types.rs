//! Data types shared by the analysis pipelines.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::schema::HOURS;

/// Identifier of a directed road link.
pub type LinkId = i64;

/// One value per hour of day, index 0 = 00:00–01:00.
pub type Hourly = [f64; HOURS];

/// Daily bus and truck totals for a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeavyVolume {
    pub bus: f64,
    pub truck: f64,
}

impl HeavyVolume {
    pub fn total(&self) -> f64 {
        self.bus + self.truck
    }
}

/// A road link with geometry and all-vehicle hourly volumes.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub link_id: LinkId,
    pub road_class: String,
    pub road_name: String,
    pub length_km: f64,
    pub lane_count: u32,
    pub hourly_volume: Hourly,
    pub heavy: Option<HeavyVolume>,
}

impl LinkRecord {
    pub fn total_volume(&self) -> f64 {
        self.hourly_volume.iter().sum()
    }
}

/// Daily and hourly volume of one vehicle class on a link.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassVolume {
    pub link_id: LinkId,
    pub daily: f64,
    pub hourly: Hourly,
}

/// Daily CO₂ per vehicle class on a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassEmissions {
    pub link_id: LinkId,
    pub car: f64,
    pub bus: f64,
    pub truck: f64,
}

/// A single daily figure keyed by link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyTotal {
    #[serde(rename = "LINK ID")]
    pub link_id: LinkId,
    pub value: f64,
}

/// A link from the average-speed export.
///
/// Only the id and the hourly speeds are guaranteed; the descriptive cells
/// are often blank in the export. Blank names are kept as empty strings.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedRecord {
    pub link_id: LinkId,
    pub road_class: String,
    pub road_name: String,
    pub region: Option<String>,
    pub length_km: Option<f64>,
    pub lane_count: Option<u32>,
    pub hourly_speed: Hourly,
}

/// Hourly values of any per-link metric.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries {
    pub link_id: LinkId,
    pub values: Hourly,
}

/// Mean of a link's 24 hourly values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyAggregate {
    #[serde(rename = "LINK ID")]
    pub link_id: LinkId,
    pub daily_mean: f64,
}

/// Weighted practical capacity of a link and the factors it is built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityEstimate {
    #[serde(rename = "LINK ID")]
    pub link_id: LinkId,
    pub road_class: String,
    pub road_name: String,
    #[serde(rename = "Stat_Capacity")]
    pub stat_capacity: f64,
    #[serde(rename = "W_length")]
    pub w_length: f64,
    #[serde(rename = "W_lanes")]
    pub w_lanes: f64,
    #[serde(rename = "W_class")]
    pub w_class: f64,
    #[serde(rename = "W_heavy")]
    pub w_heavy: f64,
    #[serde(rename = "Final_Capacity")]
    pub final_capacity: f64,
    #[serde(skip)]
    pub hourly_volume: Hourly,
}

/// Congestion relative to the link's own busiest hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakCongestion {
    #[serde(rename = "LINK ID")]
    pub link_id: LinkId,
    pub avg_congestion_score: f64,
    pub max_volume: f64,
    pub total_volume: f64,
    #[serde(skip)]
    pub hourly: Hourly,
}

/// Speed-drop congestion of a link relative to its free-flow (maximum) speed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedCongestion {
    #[serde(rename = "LINK ID")]
    pub link_id: LinkId,
    pub road_name: String,
    pub road_class: String,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub avg_congestion: f64,
    #[serde(skip)]
    pub hourly: Hourly,
}

/// Mean of a metric over a group of links (a road name or a link id).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub group: String,
    pub mean: f64,
    pub links: usize,
}

/// Per-class and combined hourly CO₂ of a link.
#[derive(Debug, Clone, PartialEq)]
pub struct Co2Attribution {
    pub link_id: LinkId,
    pub car: Hourly,
    pub bus: Hourly,
    pub truck: Hourly,
    pub total: Hourly,
}

impl Co2Attribution {
    pub fn series(&self) -> HourlySeries {
        HourlySeries {
            link_id: self.link_id,
            values: self.total,
        }
    }
}

/// Daily volume and daily CO₂ of one link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeCo2Point {
    #[serde(rename = "LINK ID")]
    pub link_id: LinkId,
    #[serde(rename = "Total_Volume")]
    pub total_volume: f64,
    #[serde(rename = "CO2_Emissions")]
    pub co2_emissions: f64,
}

/// Rows kept and dropped while turning a raw table into typed records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub loaded: usize,
    pub dropped: usize,
}

/// Outcome of the speed-congestion analysis.
#[derive(Debug, Serialize)]
pub struct SpeedCongestionSummary {
    pub rows: RowCounts,
    pub links_analyzed: usize,
    pub top: Vec<GroupMean>,
    pub hourly_profile: Hourly,
    pub outputs: Vec<PathBuf>,
}

/// Outcome of the peak-ratio congestion analysis.
#[derive(Debug, Serialize)]
pub struct PeakCongestionSummary {
    pub rows: RowCounts,
    pub links_written: usize,
    pub top: Vec<DailyAggregate>,
    pub outputs: Vec<PathBuf>,
}

/// Outcome of the weighted-capacity congestion analysis.
#[derive(Debug, Serialize)]
pub struct CapacitySummary {
    pub rows: RowCounts,
    pub heavy_vehicle_policy: String,
    pub links_written: usize,
    pub top: Vec<DailyAggregate>,
    pub outputs: Vec<PathBuf>,
}

/// Outcome of the CO₂ attribution analysis.
#[derive(Debug, Serialize)]
pub struct Co2Summary {
    pub links_written: usize,
    pub top: Vec<DailyAggregate>,
    pub outputs: Vec<PathBuf>,
}

/// Outcome of the volume/CO₂ correlation analysis.
#[derive(Debug, Serialize)]
pub struct CorrelationSummary {
    pub links_joined: usize,
    pub correlation: Option<f64>,
    pub outputs: Vec<PathBuf>,
}

/// Outcome of the combined congestion/CO₂ quadrant analysis, also written as
/// `quadrant_summary.json`.
#[derive(Debug, Serialize)]
pub struct QuadrantSummary {
    pub generated_at: DateTime<Utc>,
    pub heavy_vehicle_policy: String,
    pub congestion_threshold: f64,
    pub co2_threshold: f64,
    pub links_classified: usize,
    pub counts: Vec<QuadrantCount>,
    pub top_congestion: Vec<DailyAggregate>,
    pub top_co2: Vec<DailyAggregate>,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuadrantCount {
    pub quadrant: String,
    pub links: usize,
}
