use std::fmt;

use serde::Serialize;

use crate::analyzers::types::{DailyAggregate, LinkId, QuadrantCount};
use crate::analyzers::utility::{index_by_link, mean};

/// Joint position of a link relative to the network means of daily
/// congestion and daily CO₂.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Quadrant {
    /// High congestion, high CO₂.
    #[serde(rename = "Q1: worst segment")]
    Worst,
    /// High congestion, low CO₂.
    #[serde(rename = "Q2: hidden bottleneck")]
    HiddenBottleneck,
    /// Low congestion, high CO₂.
    #[serde(rename = "Q3: efficient arterial")]
    EfficientArterial,
    /// Low congestion, low CO₂.
    #[serde(rename = "Q4: good segment")]
    Good,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::Worst,
        Quadrant::HiddenBottleneck,
        Quadrant::EfficientArterial,
        Quadrant::Good,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::Worst => "Q1: worst segment",
            Quadrant::HiddenBottleneck => "Q2: hidden bottleneck",
            Quadrant::EfficientArterial => "Q3: efficient arterial",
            Quadrant::Good => "Q4: good segment",
        }
    }

    /// Chart colour of the quadrant.
    pub fn color(&self) -> [u8; 3] {
        match self {
            Quadrant::Worst => [220, 40, 40],
            Quadrant::HiddenBottleneck => [255, 150, 0],
            Quadrant::EfficientArterial => [120, 190, 235],
            Quadrant::Good => [50, 205, 50],
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies a link. "High" means strictly above the threshold.
///
/// | congestion | CO₂  | quadrant          |
/// |------------|------|-------------------|
/// | high       | high | Worst             |
/// | high       | low  | HiddenBottleneck  |
/// | low        | high | EfficientArterial |
/// | low        | low  | Good              |
pub fn classify(congestion: f64, co2: f64, congestion_threshold: f64, co2_threshold: f64) -> Quadrant {
    match (congestion > congestion_threshold, co2 > co2_threshold) {
        (true, true) => Quadrant::Worst,
        (true, false) => Quadrant::HiddenBottleneck,
        (false, true) => Quadrant::EfficientArterial,
        (false, false) => Quadrant::Good,
    }
}

/// One classified link, a row of `quadrant_analysis.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuadrantRow {
    #[serde(rename = "LINK ID")]
    pub link_id: LinkId,
    pub avg_daily_congestion: f64,
    pub avg_daily_co2: f64,
    pub quadrant: Quadrant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuadrantAnalysis {
    pub congestion_threshold: f64,
    pub co2_threshold: f64,
    pub rows: Vec<QuadrantRow>,
}

impl QuadrantAnalysis {
    /// Number of links per quadrant, all four quadrants listed.
    pub fn counts(&self) -> Vec<QuadrantCount> {
        Quadrant::ALL
            .iter()
            .map(|q| QuadrantCount {
                quadrant: q.label().to_string(),
                links: self.rows.iter().filter(|r| r.quadrant == *q).count(),
            })
            .collect()
    }
}

/// Joins daily congestion and daily CO₂ by link and labels every joined link.
/// Thresholds are the means over the joined links.
pub fn classify_links(congestion: &[DailyAggregate], co2: &[DailyAggregate]) -> QuadrantAnalysis {
    let co2_index = index_by_link(co2, |a| a.link_id);

    let joined: Vec<(LinkId, f64, f64)> = congestion
        .iter()
        .filter_map(|c| {
            let e = co2_index.get(&c.link_id)?;
            Some((c.link_id, c.daily_mean, e.daily_mean))
        })
        .collect();

    let congestion_values: Vec<f64> = joined.iter().map(|j| j.1).collect();
    let co2_values: Vec<f64> = joined.iter().map(|j| j.2).collect();
    let congestion_threshold = mean(&congestion_values);
    let co2_threshold = mean(&co2_values);

    let rows = joined
        .into_iter()
        .map(|(link_id, avg_daily_congestion, avg_daily_co2)| QuadrantRow {
            link_id,
            avg_daily_congestion,
            avg_daily_co2,
            quadrant: classify(
                avg_daily_congestion,
                avg_daily_co2,
                congestion_threshold,
                co2_threshold,
            ),
        })
        .collect();

    QuadrantAnalysis {
        congestion_threshold,
        co2_threshold,
        rows,
    }
}
