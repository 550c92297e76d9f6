//! Run configuration.
//!
//! Everything is optional on disk; a missing field takes its default, so an
//! empty `{}` file is a valid configuration:
//! ```json
//! {
//!   "output_dir": "results",
//!   "volume": { "path": "data/volume.csv" },
//!   "capacity": { "heavy_vehicle": { "policy": "linear_complement", "floor": 0.01 } }
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::analyzers::capacity::CapacityConfig;
use crate::parser::TableSource;
use crate::schema::{EmissionSchema, HeavySchema, SpeedSchema, VolumeSchema};

/// Per-layout defaults of an input table.
pub trait TableLayout: Default {
    const NAME: &'static str;
    const PATH: &'static str;
    const SKIP_ROWS: usize;
    const HAS_HEADER: bool = false;
}

impl TableLayout for VolumeSchema {
    const NAME: &'static str = "volume";
    const PATH: &'static str = "volume.csv";
    const SKIP_ROWS: usize = 8;
}

impl TableLayout for HeavySchema {
    const NAME: &'static str = "heavy-vehicle";
    const PATH: &'static str = "BUSVolume(LINK).csv";
    const SKIP_ROWS: usize = 8;
}

impl TableLayout for EmissionSchema {
    const NAME: &'static str = "co2";
    const PATH: &'static str = "CongestIndex(LINK).csv";
    const SKIP_ROWS: usize = 8;
}

impl TableLayout for SpeedSchema {
    const NAME: &'static str = "speed";
    const PATH: &'static str = "도로평균속도.csv";
    const SKIP_ROWS: usize = 6;
    const HAS_HEADER: bool = true;
}

/// Location and preamble of one input table, plus its column layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "S: TableLayout + Deserialize<'de>"))]
pub struct TableConfig<S> {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub delimiter: char,
    pub columns: S,
}

impl<S: TableLayout> Default for TableConfig<S> {
    fn default() -> Self {
        Self {
            path: PathBuf::from(S::PATH),
            skip_rows: S::SKIP_ROWS,
            delimiter: ',',
            columns: S::default(),
        }
    }
}

impl<S: TableLayout> TableConfig<S> {
    pub fn source(&self) -> TableSource<'_> {
        TableSource {
            name: S::NAME,
            path: &self.path,
            skip_rows: self.skip_rows,
            delimiter: self.delimiter,
            has_header: S::HAS_HEADER,
        }
    }
}

/// Raster size of every chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub output_dir: PathBuf,
    /// How many links or roads the rankings keep.
    pub top_n: usize,
    pub volume: TableConfig<VolumeSchema>,
    pub heavy: TableConfig<HeavySchema>,
    pub emissions: TableConfig<EmissionSchema>,
    pub speed: TableConfig<SpeedSchema>,
    pub capacity: CapacityConfig,
    /// Links never faster than this (km/h) are left out of speed congestion.
    pub min_free_flow_speed: f64,
    pub chart: ChartConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            top_n: 10,
            volume: TableConfig::default(),
            heavy: TableConfig::default(),
            emissions: TableConfig::default(),
            speed: TableConfig::default(),
            capacity: CapacityConfig::default(),
            min_free_flow_speed: 10.0,
            chart: ChartConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path` and validates it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Range checks that deserialization cannot express.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.top_n > 0, "top_n must be at least 1");
        ensure!(
            self.min_free_flow_speed.is_finite() && self.min_free_flow_speed >= 0.0,
            "min_free_flow_speed must be a non-negative speed, got {}",
            self.min_free_flow_speed
        );
        ensure!(
            self.chart.width > 0 && self.chart.height > 0,
            "chart size must be non-zero, got {}x{}",
            self.chart.width,
            self.chart.height
        );
        self.capacity.validate()
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::capacity::HeavyVehiclePolicy;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.top_n, 10);
        assert_eq!(config.volume.skip_rows, 8);
        assert_eq!(config.speed.skip_rows, 6);
        assert_eq!(config.heavy.path, PathBuf::from("BUSVolume(LINK).csv"));
        assert_eq!(config.volume.columns, VolumeSchema::default());
        assert_eq!(config.capacity.heavy_vehicle, HeavyVehiclePolicy::Pce { pce: 2.0 });
    }

    #[test]
    fn test_empty_object_is_default() {
        let config: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let path = temp_path("traffic_congestion_test_config.json");
        fs::write(
            &path,
            r#"{
                "output_dir": "results",
                "top_n": 3,
                "volume": { "path": "data/v.csv", "delimiter": ";" },
                "capacity": { "heavy_vehicle": { "policy": "linear_complement", "floor": 0.05 } }
            }"#,
        )
        .unwrap();

        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.top_n, 3);
        assert_eq!(config.volume.path, PathBuf::from("data/v.csv"));
        assert_eq!(config.volume.delimiter, ';');
        // Unspecified table fields keep the table defaults.
        assert_eq!(config.volume.skip_rows, 8);
        assert_eq!(config.volume.columns.hourly_start, 8);
        assert_eq!(
            config.capacity.heavy_vehicle,
            HeavyVehiclePolicy::LinearComplement { floor: 0.05 }
        );
        assert_eq!(config.capacity.percentile, 0.95);
        assert_eq!(config.output_path("a.csv"), PathBuf::from("results/a.csv"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = AnalysisConfig::load(Path::new("/nonexistent/traffic.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_load_rejects_out_of_range_percentile() {
        let path = temp_path("traffic_congestion_test_config_percentile.json");
        fs::write(&path, r#"{ "capacity": { "percentile": 95 } }"#).unwrap();

        let err = AnalysisConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("percentile"), "{err:#}");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_validate_ranges() {
        assert!(AnalysisConfig::default().validate().is_ok());

        let zero_top = AnalysisConfig {
            top_n: 0,
            ..AnalysisConfig::default()
        };
        assert!(zero_top.validate().is_err());

        let mut bad_floor = AnalysisConfig::default();
        bad_floor.capacity.heavy_vehicle = HeavyVehiclePolicy::LinearComplement { floor: -0.1 };
        let err = bad_floor.validate().unwrap_err();
        assert!(err.to_string().contains("floor"), "{err}");

        let mut bad_pce = AnalysisConfig::default();
        bad_pce.capacity.heavy_vehicle = HeavyVehiclePolicy::Pce { pce: 0.5 };
        assert!(bad_pce.validate().is_err());
    }

    #[test]
    fn test_source_carries_table_settings() {
        let config = AnalysisConfig::default();
        let source = config.speed.source();
        assert_eq!(source.skip_rows, 6);
        assert!(source.has_header);
        assert_eq!(source.path, Path::new("도로평균속도.csv"));
        assert_eq!(source.name, "speed");
        assert!(!config.volume.source().has_header);
    }
}
