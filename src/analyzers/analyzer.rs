//! End-to-end analyses: load the configured tables, derive the metrics, write
//! result tables and charts into the output directory, and return a summary.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};

use crate::analyzers::capacity::{attach_heavy_volumes, estimate_capacities};
use crate::analyzers::congestion::{peak_ratio_congestion, speed_congestion, weighted_congestion};
use crate::analyzers::emissions::{attribute_co2, volume_co2_correlation};
use crate::analyzers::quadrant::{Quadrant, classify_links};
use crate::analyzers::ranking::{
    daily_aggregates, group_means, hourly_profile, rank_descending, top_n,
};
use crate::analyzers::types::{
    CapacityEstimate, CapacitySummary, Co2Summary, CorrelationSummary, DailyAggregate,
    HourlySeries, PeakCongestionSummary, QuadrantSummary, RowCounts, SpeedCongestion,
    SpeedCongestionSummary,
};
use crate::analyzers::utility::mean;
use crate::chart::{self, Scale, ScatterPoint};
use crate::config::{AnalysisConfig, TableConfig, TableLayout};
use crate::output::{write_hourly_table, write_json, write_records};
use crate::parser::{
    RawTable, extract_class_emissions, extract_class_volumes, extract_daily_volumes,
    extract_heavy_totals, extract_hourly_volumes, extract_link_records, extract_speed_records,
    extract_total_emissions, read_table,
};

const CONGESTION_PREFIX: &str = "Final_Congestion_Hour_";
const CO2_PREFIX: &str = "Final_CO2_Hour_";

/// How speed congestion is ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedGrouping {
    /// Mean over all links sharing a road name.
    #[default]
    Road,
    Link,
}

impl SpeedGrouping {
    /// Group of `link`; links with a blank road name have no road group.
    fn key(&self, link: &SpeedCongestion) -> Option<String> {
        match self {
            SpeedGrouping::Road => (!link.road_name.is_empty()).then(|| link.road_name.clone()),
            SpeedGrouping::Link => Some(link.link_id.to_string()),
        }
    }
}

/// Validates `config` and creates its output directory.
fn prepare_run(config: &AnalysisConfig) -> Result<()> {
    config.validate()?;
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })
}

fn load_table<S: TableLayout>(table: &TableConfig<S>) -> Result<RawTable> {
    let source = table.source();
    info!(table = source.name, path = %source.path.display(), "Loading table");
    Ok(read_table(&source)?)
}

/// Speed-drop congestion per link, ranked by road or by link.
#[tracing::instrument(skip(config), fields(output_dir = %config.output_dir.display()))]
pub fn run_speed_congestion(
    config: &AnalysisConfig,
    grouping: SpeedGrouping,
) -> Result<SpeedCongestionSummary> {
    prepare_run(config)?;

    let table = load_table(&config.speed)?;
    let records = extract_speed_records(&table, &config.speed.columns)?;

    let scored = speed_congestion(&records.rows, config.min_free_flow_speed);
    let ranked = rank_descending(scored, |s| s.avg_congestion);

    let mut outputs = Vec::new();

    let csv_path = config.output_path("speed_congestion.csv");
    write_records(&csv_path, &ranked)?;
    outputs.push(csv_path);

    let profile = hourly_profile(ranked.iter().map(|s| &s.hourly));
    let mut top = group_means(&ranked, |s| grouping.key(s), |s| s.avg_congestion);
    top.truncate(config.top_n);

    let top_profiles: Vec<Vec<f64>> = top
        .iter()
        .map(|group| {
            hourly_profile(
                ranked
                    .iter()
                    .filter(|s| grouping.key(s).as_deref() == Some(group.group.as_str()))
                    .map(|s| &s.hourly),
            )
            .to_vec()
        })
        .collect();

    let path = config.output_path("hourly_speed_congestion.png");
    chart::line_chart(&path, &profile, &config.chart)?;
    outputs.push(path);

    let means: Vec<f64> = top.iter().map(|g| g.mean).collect();
    let path = config.output_path("top_speed_congestion.png");
    chart::bar_chart(&path, &means, &config.chart)?;
    outputs.push(path);

    let lines: Vec<&[f64]> = top_profiles.iter().map(Vec::as_slice).collect();
    let path = config.output_path("top_links_hourly_speed_congestion.png");
    chart::multi_line_chart(&path, &lines, &config.chart)?;
    outputs.push(path);

    for (rank, group) in top.iter().enumerate() {
        debug!(
            rank = rank + 1,
            group = %group.group,
            mean = group.mean,
            links = group.links,
            "Speed congestion ranking"
        );
    }
    info!(
        links = ranked.len(),
        ?grouping,
        "Speed congestion analysis complete"
    );

    Ok(SpeedCongestionSummary {
        rows: records.counts,
        links_analyzed: ranked.len(),
        top,
        hourly_profile: profile,
        outputs,
    })
}

/// Congestion relative to each link's own peak hour.
#[tracing::instrument(skip(config), fields(output_dir = %config.output_dir.display()))]
pub fn run_peak_congestion(config: &AnalysisConfig) -> Result<PeakCongestionSummary> {
    prepare_run(config)?;

    let table = load_table(&config.volume)?;
    let volumes = extract_hourly_volumes(&table, &config.volume.columns)?;

    let ranked = rank_descending(peak_ratio_congestion(&volumes.rows), |p| {
        p.avg_congestion_score
    });

    let path = config.output_path("link_congestion_score.csv");
    write_records(&path, &ranked)?;

    let top: Vec<DailyAggregate> = ranked
        .iter()
        .take(config.top_n)
        .map(|p| DailyAggregate {
            link_id: p.link_id,
            daily_mean: p.avg_congestion_score,
        })
        .collect();

    info!(links = ranked.len(), "Peak-ratio congestion analysis complete");

    Ok(PeakCongestionSummary {
        rows: volumes.counts,
        links_written: ranked.len(),
        top,
        outputs: vec![path],
    })
}

/// Loads link records, optionally joins heavy-vehicle totals, and estimates
/// capacities.
fn capacity_estimates(
    config: &AnalysisConfig,
    with_heavy: bool,
) -> Result<(RowCounts, Vec<CapacityEstimate>)> {
    let table = load_table(&config.volume)?;
    let links = extract_link_records(&table, &config.volume.columns)?;

    let records = if with_heavy {
        let heavy_table = load_table(&config.heavy)?;
        let heavy = extract_heavy_totals(&heavy_table, &config.heavy.columns)?;
        attach_heavy_volumes(links.rows, &heavy.rows)
    } else {
        links.rows
    };

    Ok((links.counts, estimate_capacities(&records, &config.capacity)))
}

/// Writes `final_capacity.csv` and `final_hourly_congestion.csv` and returns
/// the hourly congestion series.
fn write_capacity_outputs(
    config: &AnalysisConfig,
    estimates: &[CapacityEstimate],
    outputs: &mut Vec<PathBuf>,
) -> Result<Vec<HourlySeries>> {
    let path = config.output_path("final_capacity.csv");
    write_records(&path, estimates)?;
    outputs.push(path);

    let congestion = weighted_congestion(estimates);
    let path = config.output_path("final_hourly_congestion.csv");
    write_hourly_table(&path, CONGESTION_PREFIX, &congestion)?;
    outputs.push(path);

    Ok(congestion)
}

fn heavy_policy_label(config: &AnalysisConfig, with_heavy: bool) -> String {
    if with_heavy {
        config.capacity.heavy_vehicle.to_string()
    } else {
        "none".to_string()
    }
}

/// Weighted-capacity congestion.
#[tracing::instrument(skip(config), fields(output_dir = %config.output_dir.display()))]
pub fn run_capacity_congestion(config: &AnalysisConfig, with_heavy: bool) -> Result<CapacitySummary> {
    prepare_run(config)?;

    let heavy_vehicle_policy = heavy_policy_label(config, with_heavy);
    info!(policy = %heavy_vehicle_policy, "Heavy-vehicle weighting");

    let (rows, estimates) = capacity_estimates(config, with_heavy)?;

    let mut outputs = Vec::new();
    let congestion = write_capacity_outputs(config, &estimates, &mut outputs)?;
    let top = top_n(&daily_aggregates(&congestion), config.top_n, |a| a.daily_mean);

    info!(
        links = estimates.len(),
        policy = %heavy_vehicle_policy,
        "Capacity congestion analysis complete"
    );

    Ok(CapacitySummary {
        rows,
        heavy_vehicle_policy,
        links_written: estimates.len(),
        top,
        outputs,
    })
}

/// Writes the hourly profile, top-N bar and top-N hourly charts of a set of
/// per-link series under `{stem}` file names.
fn write_series_charts(
    config: &AnalysisConfig,
    series: &[HourlySeries],
    stem: &str,
    outputs: &mut Vec<PathBuf>,
) -> Result<()> {
    let top = top_n(series, config.top_n, |s| mean(&s.values));

    let profile = hourly_profile(series.iter().map(|s| &s.values));
    let path = config.output_path(&format!("hourly_{stem}.png"));
    chart::line_chart(&path, &profile, &config.chart)?;
    outputs.push(path);

    let means: Vec<f64> = top.iter().map(|s| mean(&s.values)).collect();
    let path = config.output_path(&format!("top_{stem}.png"));
    chart::bar_chart(&path, &means, &config.chart)?;
    outputs.push(path);

    let lines: Vec<&[f64]> = top.iter().map(|s| s.values.as_slice()).collect();
    let path = config.output_path(&format!("top_links_hourly_{stem}.png"));
    chart::multi_line_chart(&path, &lines, &config.chart)?;
    outputs.push(path);

    Ok(())
}

/// Loads the class volumes and emissions and attributes CO₂ to each hour.
fn co2_series(config: &AnalysisConfig) -> Result<Vec<HourlySeries>> {
    let volume_table = load_table(&config.volume)?;
    let heavy_table = load_table(&config.heavy)?;
    let emission_table = load_table(&config.emissions)?;

    let car = extract_class_volumes(&volume_table, config.volume.columns.car())?;
    let bus = extract_class_volumes(&heavy_table, config.heavy.columns.bus())?;
    let truck = extract_class_volumes(&heavy_table, config.heavy.columns.truck())?;
    let emissions = extract_class_emissions(&emission_table, &config.emissions.columns)?;

    let attributed = attribute_co2(&car.rows, &bus.rows, &truck.rows, &emissions.rows);
    Ok(attributed.iter().map(|a| a.series()).collect())
}

fn write_co2_outputs(
    config: &AnalysisConfig,
    series: &[HourlySeries],
    outputs: &mut Vec<PathBuf>,
) -> Result<()> {
    let path = config.output_path("final_hourly_co2_emissions.csv");
    write_hourly_table(&path, CO2_PREFIX, series)?;
    outputs.push(path);

    write_series_charts(config, series, "co2", outputs)
}

/// Hourly CO₂ per link, attributed from the per-class daily totals.
#[tracing::instrument(skip(config), fields(output_dir = %config.output_dir.display()))]
pub fn run_co2(config: &AnalysisConfig) -> Result<Co2Summary> {
    prepare_run(config)?;

    let series = co2_series(config)?;

    let mut outputs = Vec::new();
    write_co2_outputs(config, &series, &mut outputs)?;
    let top = top_n(&daily_aggregates(&series), config.top_n, |a| a.daily_mean);

    info!(links = series.len(), "CO2 attribution complete");

    Ok(Co2Summary {
        links_written: series.len(),
        top,
        outputs,
    })
}

/// Pearson correlation between daily volume and daily CO₂.
#[tracing::instrument(skip(config), fields(output_dir = %config.output_dir.display()))]
pub fn run_correlation(config: &AnalysisConfig) -> Result<CorrelationSummary> {
    prepare_run(config)?;

    let volume_table = load_table(&config.volume)?;
    let emission_table = load_table(&config.emissions)?;
    let volumes = extract_daily_volumes(&volume_table, &config.volume.columns)?;
    let emissions = extract_total_emissions(&emission_table, &config.emissions.columns)?;

    let (points, correlation) = volume_co2_correlation(&volumes.rows, &emissions.rows);

    let mut outputs = Vec::new();
    let path = config.output_path("volume_vs_co2.csv");
    write_records(&path, &points)?;
    outputs.push(path);

    let scatter: Vec<ScatterPoint> = points
        .iter()
        .map(|p| ScatterPoint {
            x: p.total_volume,
            y: p.co2_emissions,
            color: chart::LINE_COLOR,
        })
        .collect();
    let path = config.output_path("volume_vs_co2.png");
    chart::scatter_chart(&path, &scatter, None, Scale::Linear, &config.chart)?;
    outputs.push(path);

    match correlation {
        Some(r) => info!(links = points.len(), correlation = r, "Volume/CO2 correlation"),
        None => info!(links = points.len(), "Volume/CO2 correlation undefined"),
    }

    Ok(CorrelationSummary {
        links_joined: points.len(),
        correlation,
        outputs,
    })
}

/// Weighted congestion and CO₂ combined into the four-quadrant classification.
#[tracing::instrument(skip(config), fields(output_dir = %config.output_dir.display()))]
pub fn run_quadrant(config: &AnalysisConfig) -> Result<QuadrantSummary> {
    prepare_run(config)?;

    let heavy_vehicle_policy = heavy_policy_label(config, true);
    let mut outputs = Vec::new();

    let (_, estimates) = capacity_estimates(config, true)?;
    let congestion = write_capacity_outputs(config, &estimates, &mut outputs)?;
    write_series_charts(config, &congestion, "congestion", &mut outputs)?;

    let co2 = co2_series(config)?;
    write_co2_outputs(config, &co2, &mut outputs)?;

    let congestion_daily = daily_aggregates(&congestion);
    let co2_daily = daily_aggregates(&co2);
    let analysis = classify_links(&congestion_daily, &co2_daily);

    let path = config.output_path("quadrant_analysis.csv");
    write_records(&path, &analysis.rows)?;
    outputs.push(path);

    let scatter: Vec<ScatterPoint> = analysis
        .rows
        .iter()
        .map(|r| ScatterPoint {
            x: r.avg_daily_congestion,
            y: r.avg_daily_co2,
            color: r.quadrant.color(),
        })
        .collect();
    let path = config.output_path("quadrant.png");
    chart::scatter_chart(
        &path,
        &scatter,
        Some((analysis.congestion_threshold, analysis.co2_threshold)),
        Scale::Log,
        &config.chart,
    )?;
    outputs.push(path);

    let counts = analysis.counts();
    for count in &counts {
        info!(quadrant = %count.quadrant, links = count.links, "Quadrant");
    }
    let worst: Vec<_> = analysis
        .rows
        .iter()
        .filter(|r| r.quadrant == Quadrant::Worst)
        .map(|r| r.link_id)
        .collect();
    debug!(?worst, "Worst segments");

    let summary_path = config.output_path("quadrant_summary.json");
    outputs.push(summary_path.clone());

    let summary = QuadrantSummary {
        generated_at: Utc::now(),
        heavy_vehicle_policy,
        congestion_threshold: analysis.congestion_threshold,
        co2_threshold: analysis.co2_threshold,
        links_classified: analysis.rows.len(),
        counts,
        top_congestion: top_n(&congestion_daily, config.top_n, |a| a.daily_mean),
        top_co2: top_n(&co2_daily, config.top_n, |a| a.daily_mean),
        outputs,
    };
    write_json(&summary_path, &summary)?;

    info!(
        links = summary.links_classified,
        congestion_threshold = summary.congestion_threshold,
        co2_threshold = summary.co2_threshold,
        "Quadrant analysis complete"
    );

    Ok(summary)
}
