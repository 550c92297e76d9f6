use std::collections::{BTreeMap, HashMap};
use std::fmt;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyzers::types::{CapacityEstimate, HeavyVolume, LinkId, LinkRecord};
use crate::analyzers::utility::{mean, percentile};

/// Capacity multipliers per road class. Classes not listed here use
/// [`CapacityConfig::default_class_weight`].
static CLASS_WEIGHTS: &[(&str, f64)] = &[
    ("고속도로", 1.5),
    ("도시고속도로", 1.5),
    ("일반국도", 1.2),
    ("특별광역시도", 1.2),
    ("국가지원지방도", 1.0),
    ("지방도", 1.0),
    ("시군도", 1.0),
    ("연결로", 1.0),
];

/// How the share of buses and trucks reduces a link's capacity.
///
/// `P` is the daily bus + truck total divided by the sum of the link's hourly
/// all-vehicle volumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum HeavyVehiclePolicy {
    /// `1 / (1 + P * (pce - 1))`. A link with zero total volume gets 1.0.
    Pce { pce: f64 },
    /// `max(1 - P, floor)`. A link with zero total volume is rejected.
    LinearComplement { floor: f64 },
}

impl Default for HeavyVehiclePolicy {
    fn default() -> Self {
        HeavyVehiclePolicy::Pce { pce: 2.0 }
    }
}

impl fmt::Display for HeavyVehiclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeavyVehiclePolicy::Pce { pce } => write!(f, "pce(pce={pce})"),
            HeavyVehiclePolicy::LinearComplement { floor } => {
                write!(f, "linear_complement(floor={floor})")
            }
        }
    }
}

impl HeavyVehiclePolicy {
    /// Rejects a PCE below 1 and a floor outside (0, 1].
    pub fn validate(&self) -> Result<()> {
        match *self {
            HeavyVehiclePolicy::Pce { pce } => ensure!(
                pce.is_finite() && pce >= 1.0,
                "heavy_vehicle pce must be a finite number >= 1, got {pce}"
            ),
            HeavyVehiclePolicy::LinearComplement { floor } => ensure!(
                floor > 0.0 && floor <= 1.0,
                "heavy_vehicle floor must be in (0, 1], got {floor}"
            ),
        }
        Ok(())
    }

    /// Heavy-vehicle correction for a link. Links without heavy-vehicle data
    /// are left uncorrected (1.0). `None` means the weight is undefined and the
    /// link must be excluded.
    pub fn weight(&self, heavy: Option<HeavyVolume>, total_volume: f64) -> Option<f64> {
        let Some(heavy) = heavy else {
            return Some(1.0);
        };

        match *self {
            HeavyVehiclePolicy::Pce { pce } => {
                if total_volume <= 0.0 {
                    return Some(1.0);
                }
                let share = heavy.total() / total_volume;
                Some(1.0 / (1.0 + share * (pce - 1.0)))
            }
            HeavyVehiclePolicy::LinearComplement { floor } => {
                if total_volume <= 0.0 {
                    return None;
                }
                let share = heavy.total() / total_volume;
                Some((1.0 - share).max(floor))
            }
        }
    }
}

/// Settings of the weighted-capacity model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Quantile of the hourly volumes taken as the statistical capacity.
    pub percentile: f64,
    pub class_weights: BTreeMap<String, f64>,
    pub default_class_weight: f64,
    pub heavy_vehicle: HeavyVehiclePolicy,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            percentile: 0.95,
            class_weights: CLASS_WEIGHTS
                .iter()
                .map(|&(class, weight)| (class.to_string(), weight))
                .collect(),
            default_class_weight: 1.0,
            heavy_vehicle: HeavyVehiclePolicy::default(),
        }
    }
}

impl CapacityConfig {
    /// Checks the settings before any link is estimated. An out-of-range
    /// percentile would otherwise leave every link without a capacity.
    ///
    /// # Errors
    ///
    /// Names the first offending setting and its value.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.percentile),
            "capacity percentile must be a fraction in [0, 1], got {} (use 0.95, not 95)",
            self.percentile
        );
        ensure!(
            self.default_class_weight.is_finite() && self.default_class_weight > 0.0,
            "default_class_weight must be positive, got {}",
            self.default_class_weight
        );
        for (class, weight) in &self.class_weights {
            ensure!(
                weight.is_finite() && *weight > 0.0,
                "class weight for {class} must be positive, got {weight}"
            );
        }
        self.heavy_vehicle.validate()
    }

    pub fn class_weight(&self, road_class: &str) -> f64 {
        self.class_weights
            .get(road_class.trim())
            .copied()
            .unwrap_or(self.default_class_weight)
    }
}

/// Attaches daily bus/truck totals to link records, keeping only links
/// present in both tables.
pub fn attach_heavy_volumes(
    records: Vec<LinkRecord>,
    heavy: &[(LinkId, HeavyVolume)],
) -> Vec<LinkRecord> {
    let index: HashMap<LinkId, HeavyVolume> = heavy.iter().rev().copied().collect();
    let before = records.len();

    let joined: Vec<LinkRecord> = records
        .into_iter()
        .filter_map(|mut record| {
            record.heavy = Some(*index.get(&record.link_id)?);
            Some(record)
        })
        .collect();

    if joined.len() < before {
        warn!(
            unmatched = before - joined.len(),
            "Links without bus/truck volumes excluded"
        );
    }
    joined
}

/// Estimates the weighted practical capacity of every link.
///
/// Links without a positive length and lane count, links whose road has a
/// zero mean lane count, and links whose final capacity is not a positive
/// finite number are excluded from the result.
pub fn estimate_capacities(records: &[LinkRecord], config: &CapacityConfig) -> Vec<CapacityEstimate> {
    let eligible: Vec<&LinkRecord> = records
        .iter()
        .filter(|r| r.length_km > 0.0 && r.lane_count > 0)
        .collect();

    if eligible.len() < records.len() {
        warn!(
            excluded = records.len() - eligible.len(),
            "Links without positive length or lane count excluded"
        );
    }
    if eligible.is_empty() {
        return Vec::new();
    }

    let lengths: Vec<f64> = eligible.iter().map(|r| r.length_km).collect();
    let avg_length = mean(&lengths);
    let lane_means = lane_means_by_road(&eligible);

    let mut estimates = Vec::with_capacity(eligible.len());
    for record in &eligible {
        match estimate(record, avg_length, &lane_means, config) {
            Some(e) => estimates.push(e),
            None => debug!(link_id = record.link_id, "Capacity undefined, link excluded"),
        }
    }

    if estimates.len() < eligible.len() {
        warn!(
            excluded = eligible.len() - estimates.len(),
            policy = %config.heavy_vehicle,
            "Links with zero or undefined capacity excluded"
        );
    }

    estimates
}

fn lane_means_by_road<'a>(records: &[&'a LinkRecord]) -> HashMap<&'a str, f64> {
    let mut groups: HashMap<&'a str, (f64, usize)> = HashMap::new();
    for &record in records {
        let entry = groups.entry(record.road_name.as_str()).or_default();
        entry.0 += f64::from(record.lane_count);
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|(road, (sum, count))| (road, sum / count as f64))
        .collect()
}

fn estimate(
    record: &LinkRecord,
    avg_length: f64,
    lane_means: &HashMap<&str, f64>,
    config: &CapacityConfig,
) -> Option<CapacityEstimate> {
    let stat_capacity = percentile(&record.hourly_volume, config.percentile)?;

    let w_length = record.length_km / avg_length;

    let road_lanes = *lane_means.get(record.road_name.as_str())?;
    if !road_lanes.is_finite() || road_lanes <= 0.0 {
        return None;
    }
    let w_lanes = f64::from(record.lane_count) / road_lanes;

    let w_class = config.class_weight(&record.road_class);
    let w_heavy = config
        .heavy_vehicle
        .weight(record.heavy, record.total_volume())?;

    let final_capacity = stat_capacity * w_length * w_lanes * w_class * w_heavy;
    if !final_capacity.is_finite() || final_capacity <= 0.0 {
        return None;
    }

    Some(CapacityEstimate {
        link_id: record.link_id,
        road_class: record.road_class.clone(),
        road_name: record.road_name.clone(),
        stat_capacity,
        w_length,
        w_lanes,
        w_class,
        w_heavy,
        final_capacity,
        hourly_volume: record.hourly_volume,
    })
}
