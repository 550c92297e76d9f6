use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use traffic_congestion::analyzers::analyzer::{
    SpeedGrouping, run_capacity_congestion, run_co2, run_correlation, run_peak_congestion,
    run_quadrant, run_speed_congestion,
};
use traffic_congestion::analyzers::types::RowCounts;
use traffic_congestion::config::{AnalysisConfig, ChartConfig};
use traffic_congestion::schema::{HOURS, SpeedSchema};

/// Fresh input/output directories for one test.
struct Fixture {
    root: PathBuf,
    config: AnalysisConfig,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let root = env::temp_dir().join(format!("traffic_congestion_it_{name}"));
        let _ = fs::remove_dir_all(&root); // clean up any prior run
        fs::create_dir_all(&root).unwrap();

        let mut config = AnalysisConfig {
            output_dir: root.join("out"),
            chart: ChartConfig {
                width: 240,
                height: 160,
            },
            ..AnalysisConfig::default()
        };
        config.volume.path = root.join("volume.csv");
        config.heavy.path = root.join("heavy.csv");
        config.emissions.path = root.join("co2.csv");
        config.speed.path = root.join("speed.csv");

        Fixture { root, config }
    }

    fn with_traffic_tables(self) -> Self {
        write_table(&self.config.volume.path, 8, &volume_rows(), true);
        write_table(&self.config.heavy.path, 8, &heavy_rows(), false);
        write_table(&self.config.emissions.path, 8, &co2_rows(), false);
        self
    }

    fn with_speed_table(self) -> Self {
        write_table(&self.config.speed.path, 6, &speed_rows(), false);
        self
    }

    fn output(&self, name: &str) -> PathBuf {
        self.config.output_path(name)
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn write_table(path: &Path, preamble: usize, rows: &[String], bom: bool) {
    let mut content = String::new();
    if bom {
        content.push('\u{feff}');
    }
    for i in 0..preamble {
        content.push_str(&format!("survey metadata line {i}\n"));
    }
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(path, content).unwrap();
}

fn repeat(value: f64) -> Vec<String> {
    vec![value.to_string(); HOURS]
}

fn ramp() -> Vec<String> {
    (1..=HOURS).map(|h| h.to_string()).collect()
}

/// 57 columns: link info, all-vehicle daily/hourly, car daily/hourly.
#[allow(clippy::too_many_arguments)]
fn volume_row(
    id: &str,
    road_name: &str,
    length: f64,
    lanes: u32,
    daily: f64,
    hourly: Vec<String>,
    car_daily: f64,
    car_hourly: f64,
) -> String {
    let mut cells = vec![
        id.to_string(),
        "1000".into(),
        "시군도".into(),
        road_name.into(),
        "도심".into(),
        length.to_string(),
        lanes.to_string(),
        daily.to_string(),
    ];
    cells.extend(hourly);
    cells.push(car_daily.to_string());
    cells.extend(repeat(car_hourly));
    cells.join(",")
}

/// 57 columns with bus daily/hourly at 7/8.. and truck daily/hourly at 32/33..
fn heavy_row(id: &str, bus_daily: f64, bus_hourly: f64, truck_daily: f64, truck_hourly: f64) -> String {
    let mut cells = vec![id.to_string()];
    cells.extend(std::iter::repeat_n(String::new(), 6));
    cells.push(bus_daily.to_string());
    cells.extend(repeat(bus_hourly));
    cells.push(truck_daily.to_string());
    cells.extend(repeat(truck_hourly));
    cells.join(",")
}

fn co2_row(id: &str, total: f64, car: f64, bus: f64, truck: f64) -> String {
    let mut cells = vec![id.to_string()];
    cells.extend(std::iter::repeat_n("x".to_string(), 6));
    cells.extend([total, car, bus, truck].map(|v| v.to_string()));
    cells.join(",")
}

fn volume_rows() -> Vec<String> {
    vec![
        volume_row("101", "A로", 1.0, 2, 240.0, repeat(10.0), 240.0, 10.0),
        volume_row("102", "B로", 1.0, 2, 480.0, repeat(20.0), 480.0, 20.0),
        volume_row("103", "C로", 1.0, 0, 120.0, ramp(), 120.0, 5.0),
        volume_row("104", "D로", 3.0, 2, 480.0, repeat(20.0), 480.0, 20.0),
        volume_row("105", "E로", 0.0, 2, 0.0, repeat(0.0), 0.0, 0.0),
        volume_row("합계", "", 0.0, 0, 0.0, repeat(0.0), 0.0, 0.0),
    ]
}

fn heavy_rows() -> Vec<String> {
    vec![
        heavy_row("101", 12.0, 0.5, 12.0, 0.5),
        heavy_row("103", 0.0, 0.0, 12.0, 0.5),
        heavy_row("104", 12.0, 0.5, 12.0, 0.5),
    ]
}

fn co2_rows() -> Vec<String> {
    vec![
        co2_row("101", 540.0, 480.0, 24.0, 36.0),
        co2_row("102", 1020.0, 960.0, 24.0, 36.0),
        co2_row("103", 300.0, 100.0, 0.0, 36.0),
        co2_row("104", 1020.0, 960.0, 24.0, 36.0),
    ]
}

fn speed_rows() -> Vec<String> {
    let mut header: Vec<String> = ["LINK ID", "노드", "도로등급", "도로명", "권역", "연장", "차로수"]
        .map(String::from)
        .to_vec();
    header.extend((0..HOURS).map(SpeedSchema::hour_label));

    let row = |id: &str, road: &str, speeds: [f64; HOURS]| {
        let mut cells: Vec<String> = vec![
            id.into(),
            "".into(),
            "특별광역시도".into(),
            road.into(),
            "도심".into(),
            "1.2".into(),
            "3".into(),
        ];
        cells.extend(speeds.map(|s| s.to_string()));
        cells.join(",")
    };

    let mut s1 = [60.0; HOURS];
    s1[8] = 15.0;
    let mut s2 = [40.0; HOURS];
    s2[18] = 20.0;
    let mut s3 = [50.0; HOURS];
    s3[8] = 25.0;
    s3[18] = 25.0;

    vec![
        header.join(","),
        row("1", "강변북로", s1),
        row("2", "강변북로", s2),
        row("3", "세종대로", s3),
        row("4", "시골길", [8.0; HOURS]),
    ]
}

/// Data rows of an output CSV, BOM and header stripped.
fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let content = fs::read_to_string(path).unwrap();
    assert!(content.starts_with('\u{feff}'), "{} lacks a BOM", path.display());
    content
        .trim_start_matches('\u{feff}')
        .lines()
        .skip(1)
        .map(|line| line.split(',').map(String::from).collect())
        .collect()
}

#[test]
fn test_speed_congestion_by_road() {
    let fixture = Fixture::new("speed_road").with_speed_table();

    let summary = run_speed_congestion(&fixture.config, SpeedGrouping::Road).unwrap();

    assert_eq!(summary.rows, RowCounts { loaded: 4, dropped: 0 });
    assert_eq!(summary.links_analyzed, 3);
    assert_eq!(summary.top.len(), 2);
    assert_eq!(summary.top[0].group, "세종대로");
    assert_relative_eq!(summary.top[0].mean, 1.0 / 24.0, epsilon = 1e-9);
    assert_eq!(summary.top[1].group, "강변북로");
    assert_eq!(summary.top[1].links, 2);
    assert_relative_eq!(summary.top[1].mean, 0.625 / 24.0, epsilon = 1e-9);
    assert_relative_eq!(summary.hourly_profile[8], (0.75 + 0.5) / 3.0, epsilon = 1e-9);

    let rows = read_rows(&fixture.output("speed_congestion.csv"));
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], "3");

    for name in [
        "hourly_speed_congestion.png",
        "top_speed_congestion.png",
        "top_links_hourly_speed_congestion.png",
    ] {
        assert!(fixture.output(name).exists(), "{name} missing");
    }
}

#[test]
fn test_speed_congestion_by_link() {
    let fixture = Fixture::new("speed_link").with_speed_table();

    let summary = run_speed_congestion(&fixture.config, SpeedGrouping::Link).unwrap();

    let groups: Vec<&str> = summary.top.iter().map(|g| g.group.as_str()).collect();
    assert_eq!(groups, vec!["3", "1", "2"]);
    assert!(summary.top.iter().all(|g| g.links == 1));
}

#[test]
fn test_speed_rows_with_blank_info_cells_are_analyzed() {
    let fixture = Fixture::new("speed_sparse");
    let mut rows = speed_rows();
    rows.truncate(2);
    let mut speeds = [30.0; HOURS];
    speeds[8] = 15.0;
    let speeds: Vec<String> = speeds.iter().map(f64::to_string).collect();
    rows.push(format!("5,,,강변북로,,,,{}", speeds.join(",")));
    write_table(&fixture.config.speed.path, 6, &rows, false);

    let summary = run_speed_congestion(&fixture.config, SpeedGrouping::Road).unwrap();

    assert_eq!(summary.rows, RowCounts { loaded: 2, dropped: 0 });
    assert_eq!(summary.links_analyzed, 2);
    assert_eq!(summary.top.len(), 1);
    assert_eq!(summary.top[0].links, 2);
    assert_relative_eq!(summary.hourly_profile[8], (0.75 + 0.5) / 2.0, epsilon = 1e-9);
}

#[test]
fn test_peak_congestion() {
    let fixture = Fixture::new("peak").with_traffic_tables();

    let summary = run_peak_congestion(&fixture.config).unwrap();

    assert_eq!(summary.rows, RowCounts { loaded: 5, dropped: 1 });
    // The all-zero link has no peak.
    assert_eq!(summary.links_written, 4);
    let ids: Vec<i64> = summary.top.iter().map(|a| a.link_id).collect();
    assert_eq!(ids, vec![101, 102, 104, 103]);
    assert_eq!(summary.top[0].daily_mean, 1.0);
    assert_relative_eq!(summary.top[3].daily_mean, 12.5 / 24.0, epsilon = 1e-9);

    let rows = read_rows(&fixture.output("link_congestion_score.csv"));
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3][0], "103");
}

#[test]
fn test_capacity_congestion_without_heavy_vehicles() {
    let fixture = Fixture::new("capacity_no_heavy").with_traffic_tables();

    let summary = run_capacity_congestion(&fixture.config, false).unwrap();

    assert_eq!(summary.heavy_vehicle_policy, "none");
    assert_eq!(summary.rows, RowCounts { loaded: 5, dropped: 1 });
    // Zero-lane and zero-length links never get a capacity.
    assert_eq!(summary.links_written, 3);

    // Mean length over 101, 102 and 104 is 5/3 km.
    let mut ids: Vec<i64> = summary.top.iter().map(|a| a.link_id).collect();
    assert_eq!(ids[2], 104);
    ids.sort();
    assert_eq!(ids, vec![101, 102, 104]);
    assert_relative_eq!(summary.top[0].daily_mean, 5.0 / 3.0, epsilon = 1e-9);
    assert_relative_eq!(summary.top[1].daily_mean, 5.0 / 3.0, epsilon = 1e-9);
    assert_relative_eq!(summary.top[2].daily_mean, 1.0 / 1.8, epsilon = 1e-9);

    let capacities = read_rows(&fixture.output("final_capacity.csv"));
    assert_eq!(capacities.len(), 3);
    assert!(
        capacities
            .iter()
            .all(|row| row[8].parse::<f64>().unwrap() > 0.0)
    );

    let congestion = read_rows(&fixture.output("final_hourly_congestion.csv"));
    assert_eq!(congestion.len(), 3);
    assert_eq!(congestion[0].len(), HOURS + 1);
}

#[test]
fn test_capacity_congestion_with_heavy_vehicles() {
    let fixture = Fixture::new("capacity_heavy").with_traffic_tables();

    let summary = run_capacity_congestion(&fixture.config, true).unwrap();

    assert_eq!(summary.heavy_vehicle_policy, "pce(pce=2)");
    // 102 and 105 have no heavy-vehicle row; 103 has no lanes.
    assert_eq!(summary.links_written, 2);
    assert_eq!(summary.top[0].link_id, 101);
    assert_relative_eq!(summary.top[0].daily_mean, 2.2, epsilon = 1e-9);
    assert_eq!(summary.top[1].link_id, 104);
    assert_relative_eq!(summary.top[1].daily_mean, 0.7, epsilon = 1e-9);
}

#[test]
fn test_co2_attribution() {
    let fixture = Fixture::new("co2").with_traffic_tables();

    let summary = run_co2(&fixture.config).unwrap();

    // 102 has no bus/truck row, 103 saw no buses.
    assert_eq!(summary.links_written, 2);
    assert_eq!(summary.top[0].link_id, 104);
    assert_relative_eq!(summary.top[0].daily_mean, 42.5, epsilon = 1e-9);
    assert_relative_eq!(summary.top[1].daily_mean, 22.5, epsilon = 1e-9);

    let rows = read_rows(&fixture.output("final_hourly_co2_emissions.csv"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "101");
    assert!(rows[0][1..].iter().all(|v| v == "22.5"));

    for name in ["hourly_co2.png", "top_co2.png", "top_links_hourly_co2.png"] {
        assert!(fixture.output(name).exists(), "{name} missing");
    }
}

#[test]
fn test_volume_co2_correlation() {
    let fixture = Fixture::new("correlation").with_traffic_tables();

    let summary = run_correlation(&fixture.config).unwrap();

    assert_eq!(summary.links_joined, 4);
    assert_relative_eq!(summary.correlation.unwrap(), 1.0, epsilon = 1e-9);

    let rows = read_rows(&fixture.output("volume_vs_co2.csv"));
    assert_eq!(rows[0], vec!["101", "240.0", "540.0"]);
    assert!(fixture.output("volume_vs_co2.png").exists());
}

#[test]
fn test_quadrant_analysis() {
    let fixture = Fixture::new("quadrant").with_traffic_tables();

    let summary = run_quadrant(&fixture.config).unwrap();

    assert_eq!(summary.links_classified, 2);
    assert_relative_eq!(summary.congestion_threshold, 1.45, epsilon = 1e-9);
    assert_relative_eq!(summary.co2_threshold, 32.5, epsilon = 1e-9);
    assert_eq!(summary.counts.iter().map(|c| c.links).sum::<usize>(), 2);

    let rows = read_rows(&fixture.output("quadrant_analysis.csv"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "101");
    assert_eq!(rows[0][3], "Q2: hidden bottleneck");
    assert_eq!(rows[1][0], "104");
    assert_eq!(rows[1][3], "Q3: efficient arterial");

    let json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(fixture.output("quadrant_summary.json")).unwrap(),
    )
    .unwrap();
    assert!(json["generated_at"].is_string());
    assert_eq!(json["counts"].as_array().unwrap().len(), 4);
    assert_eq!(json["heavy_vehicle_policy"], "pce(pce=2)");

    for path in &summary.outputs {
        assert!(path.exists(), "{} missing", path.display());
    }
    for name in [
        "final_capacity.csv",
        "final_hourly_congestion.csv",
        "final_hourly_co2_emissions.csv",
        "hourly_congestion.png",
        "top_congestion.png",
        "quadrant.png",
    ] {
        assert!(fixture.output(name).exists(), "{name} missing");
    }
}

#[test]
fn test_percent_capacity_percentile_fails_before_any_output() {
    let mut fixture = Fixture::new("bad_percentile").with_traffic_tables();
    fixture.config.capacity.percentile = 95.0;

    let err = run_capacity_congestion(&fixture.config, true).unwrap_err();
    assert!(err.to_string().contains("percentile"), "{err}");
    assert!(!fixture.output("final_hourly_congestion.csv").exists());
}

#[test]
fn test_missing_table_is_a_descriptive_error() {
    let fixture = Fixture::new("missing");

    let err = run_peak_congestion(&fixture.config).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("volume table not found"), "{message}");
}

#[test]
fn test_narrow_table_fails_before_any_output() {
    let fixture = Fixture::new("narrow").with_traffic_tables();
    write_table(&fixture.config.emissions.path, 8, &["101,1,2".to_string()], false);

    let err = run_co2(&fixture.config).unwrap_err();
    assert!(err.to_string().contains("co2 table has 3 columns"), "{err}");
    assert!(!fixture.output("final_hourly_co2_emissions.csv").exists());
}
