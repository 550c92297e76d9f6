//! CLI entry point for the traffic congestion tool.
//!
//! Provides one subcommand per analysis. Every subcommand reads the input
//! tables named in the configuration and writes its results into the output
//! directory.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use traffic_congestion::analyzers::analyzer::{
    SpeedGrouping, run_capacity_congestion, run_co2, run_correlation, run_peak_congestion,
    run_quadrant, run_speed_congestion,
};
use traffic_congestion::config::AnalysisConfig;
use traffic_congestion::output::{print_json, print_pretty};

#[derive(Parser)]
#[command(name = "traffic_congestion")]
#[command(about = "Congestion and CO2 analysis of road-link traffic surveys", long_about = None)]
struct Cli {
    /// JSON configuration file (input tables, column layouts, model settings)
    #[arg(short, long, global = true, env = "TRAFFIC_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for result tables and charts (overrides the configuration)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupBy {
    Road,
    Link,
}

impl From<GroupBy> for SpeedGrouping {
    fn from(group_by: GroupBy) -> Self {
        match group_by {
            GroupBy::Road => SpeedGrouping::Road,
            GroupBy::Link => SpeedGrouping::Link,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rank roads or links by the drop of their hourly speed below free flow
    SpeedCongestion {
        /// Rank by road name (mean of its links) or by individual link
        #[arg(long, value_enum, default_value_t = GroupBy::Road)]
        by: GroupBy,
    },
    /// Score links by hourly volume relative to their own busiest hour
    PeakCongestion,
    /// Estimate weighted link capacities and hourly volume/capacity congestion
    CapacityCongestion {
        /// Ignore the bus/truck table (heavy-vehicle weight fixed at 1.0)
        #[arg(long, default_value_t = false)]
        no_heavy: bool,
    },
    /// Attribute daily CO2 per vehicle class to each hour of the day
    Co2,
    /// Correlate daily traffic volume with daily CO2 across links
    Correlation,
    /// Classify links into congestion/CO2 quadrants
    Quadrant,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/traffic_congestion.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("traffic_congestion.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            AnalysisConfig::load(path)?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    print_pretty(&config);

    match cli.command {
        Commands::SpeedCongestion { by } => {
            let summary = run_speed_congestion(&config, by.into())?;
            print_json(&summary)?;
        }
        Commands::PeakCongestion => {
            let summary = run_peak_congestion(&config)?;
            print_json(&summary)?;
        }
        Commands::CapacityCongestion { no_heavy } => {
            let summary = run_capacity_congestion(&config, !no_heavy)?;
            print_json(&summary)?;
        }
        Commands::Co2 => {
            let summary = run_co2(&config)?;
            print_json(&summary)?;
        }
        Commands::Correlation => {
            let summary = run_correlation(&config)?;
            print_json(&summary)?;
        }
        Commands::Quadrant => {
            let summary = run_quadrant(&config)?;
            print_json(&summary)?;
        }
    }

    info!(output_dir = %config.output_dir.display(), "Done");
    Ok(())
}
