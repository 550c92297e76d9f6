//! Column layouts for the traffic-survey exports.
//!
//! The per-link exports have no usable header row, so every field is addressed
//! by its 0-based column position. Each layout names the fields it reads so a
//! table that is narrower than expected can be rejected before any row is used.

use serde::{Deserialize, Serialize};

/// Number of hour-of-day buckets in every hourly block.
pub const HOURS: usize = 24;

/// A named column (or block of columns) at a fixed position.
///
/// Only the position and width are recorded; how a cell is parsed is up to
/// the extractor that reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub index: usize,
    /// Number of consecutive columns, 1 or [`HOURS`].
    pub width: usize,
}

impl Field {
    pub const fn cell(name: &'static str, index: usize) -> Self {
        Self { name, index, width: 1 }
    }

    /// [`HOURS`] consecutive columns starting at `index`.
    pub const fn hourly(name: &'static str, index: usize) -> Self {
        Self { name, index, width: HOURS }
    }

    /// Last column this field occupies.
    pub fn last_index(&self) -> usize {
        self.index + self.width - 1
    }
}

/// Returns the field reaching furthest to the right, i.e. the one that
/// decides how wide a row must be.
pub fn widest(fields: &[Field]) -> Option<Field> {
    fields.iter().copied().max_by_key(Field::last_index)
}

/// Columns of one vehicle class inside a volume table: daily total followed by
/// (not necessarily adjacent) hourly counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassColumns {
    pub link_id: usize,
    pub daily: usize,
    pub hourly_start: usize,
}

impl ClassColumns {
    pub fn fields(&self) -> Vec<Field> {
        vec![
            Field::cell("link_id", self.link_id),
            Field::cell("daily", self.daily),
            Field::hourly("hourly", self.hourly_start),
        ]
    }
}

/// Layout of the all-vehicle volume export (`volume.csv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSchema {
    pub link_id: usize,
    pub road_class: usize,
    pub road_name: usize,
    pub length_km: usize,
    pub lane_count: usize,
    pub daily_total: usize,
    pub hourly_start: usize,
    pub car_daily: usize,
    pub car_hourly_start: usize,
}

impl Default for VolumeSchema {
    fn default() -> Self {
        Self {
            link_id: 0,
            road_class: 2,
            road_name: 3,
            length_km: 5,
            lane_count: 6,
            daily_total: 7,
            hourly_start: 8,
            car_daily: 32,
            car_hourly_start: 33,
        }
    }
}

impl VolumeSchema {
    /// Fields needed to build a link record.
    pub fn link_fields(&self) -> Vec<Field> {
        vec![
            Field::cell("link_id", self.link_id),
            Field::cell("road_class", self.road_class),
            Field::cell("road_name", self.road_name),
            Field::cell("length_km", self.length_km),
            Field::cell("lane_count", self.lane_count),
            Field::hourly("hourly_volume", self.hourly_start),
        ]
    }

    /// Fields needed for the bare hourly series of every link.
    pub fn hourly_fields(&self) -> Vec<Field> {
        vec![
            Field::cell("link_id", self.link_id),
            Field::hourly("hourly_volume", self.hourly_start),
        ]
    }

    pub fn daily_fields(&self) -> Vec<Field> {
        vec![
            Field::cell("link_id", self.link_id),
            Field::cell("daily_total", self.daily_total),
        ]
    }

    pub fn car(&self) -> ClassColumns {
        ClassColumns {
            link_id: self.link_id,
            daily: self.car_daily,
            hourly_start: self.car_hourly_start,
        }
    }
}

/// Layout of the bus/truck volume export (`BUSVolume(LINK).csv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeavySchema {
    pub link_id: usize,
    pub bus_daily: usize,
    pub bus_hourly_start: usize,
    pub truck_daily: usize,
    pub truck_hourly_start: usize,
}

impl Default for HeavySchema {
    fn default() -> Self {
        Self {
            link_id: 0,
            bus_daily: 7,
            bus_hourly_start: 8,
            truck_daily: 32,
            truck_hourly_start: 33,
        }
    }
}

impl HeavySchema {
    /// Fields needed for the daily bus and truck totals only.
    pub fn daily_fields(&self) -> Vec<Field> {
        vec![
            Field::cell("link_id", self.link_id),
            Field::cell("bus_daily", self.bus_daily),
            Field::cell("truck_daily", self.truck_daily),
        ]
    }

    pub fn bus(&self) -> ClassColumns {
        ClassColumns {
            link_id: self.link_id,
            daily: self.bus_daily,
            hourly_start: self.bus_hourly_start,
        }
    }

    pub fn truck(&self) -> ClassColumns {
        ClassColumns {
            link_id: self.link_id,
            daily: self.truck_daily,
            hourly_start: self.truck_hourly_start,
        }
    }
}

/// Layout of the per-link CO₂ export (`CongestIndex(LINK).csv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionSchema {
    pub link_id: usize,
    pub co2_total: usize,
    pub co2_car: usize,
    pub co2_bus: usize,
    pub co2_truck: usize,
}

impl Default for EmissionSchema {
    fn default() -> Self {
        Self {
            link_id: 0,
            co2_total: 7,
            co2_car: 8,
            co2_bus: 9,
            co2_truck: 10,
        }
    }
}

impl EmissionSchema {
    pub fn class_fields(&self) -> Vec<Field> {
        vec![
            Field::cell("link_id", self.link_id),
            Field::cell("co2_car", self.co2_car),
            Field::cell("co2_bus", self.co2_bus),
            Field::cell("co2_truck", self.co2_truck),
        ]
    }

    pub fn total_fields(&self) -> Vec<Field> {
        vec![
            Field::cell("link_id", self.link_id),
            Field::cell("co2_total", self.co2_total),
        ]
    }
}

/// Layout of the average-speed export (`도로평균속도.csv`).
///
/// Unlike the volume exports this one keeps a header row; the hourly speed
/// columns are found by their `"{h}~{h+1}시"` labels rather than by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedSchema {
    pub link_id: usize,
    pub road_class: usize,
    pub road_name: usize,
    pub region: usize,
    pub length_km: usize,
    pub lane_count: usize,
}

impl Default for SpeedSchema {
    fn default() -> Self {
        Self {
            link_id: 0,
            road_class: 2,
            road_name: 3,
            region: 4,
            length_km: 5,
            lane_count: 6,
        }
    }
}

impl SpeedSchema {
    /// Columns every speed row must have: the link id and the road name used
    /// for grouping. The remaining descriptive columns may be absent.
    pub fn key_fields(&self) -> Vec<Field> {
        vec![
            Field::cell("link_id", self.link_id),
            Field::cell("road_name", self.road_name),
        ]
    }

    /// Header label of the speed column for `hour`.
    pub fn hour_label(hour: usize) -> String {
        format!("{}~{}시", hour, hour + 1)
    }
}
