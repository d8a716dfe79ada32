use clap::{Args, Parser, Subcommand, ValueHint};
use evcs_core::ChargerType;
use std::path::PathBuf;

use crate::common::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "evcs", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and validate scenario specs
    Scenarios {
        #[command(subcommand)]
        command: ScenariosCommands,
    },
    /// Build the Stage 1 demand and capacity rasters
    Maps {
        #[command(subcommand)]
        command: MapsCommands,
    },
    /// Stage 2 candidate planning
    Candidates {
        #[command(subcommand)]
        command: CandidatesCommands,
    },
    /// Site and size stations for one scenario
    Optimize(OptimizeArgs),
    /// Run every scenario of a spec
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },
    /// Merge per-region station files into one GeoJSON
    Merge {
        /// Directory holding `<region>/<region>.geojson` files
        #[arg(long, value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        /// Merged output file
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScenariosCommands {
    /// List scenarios (the built-in seven without --spec)
    List {
        #[arg(long, value_hint = ValueHint::FilePath)]
        spec: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Check a spec, including its input paths
    Validate {
        #[arg(long, value_hint = ValueHint::FilePath)]
        spec: PathBuf,
    },
    /// Write the resolved scenarios as JSON
    Expand {
        #[arg(long, value_hint = ValueHint::FilePath)]
        spec: PathBuf,
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum MapsCommands {
    /// Weighted demand map from OD, POI and road layers
    Demand {
        /// Template grid; defaults to the OD raster
        #[arg(long, value_hint = ValueHint::FilePath)]
        grid: Option<PathBuf>,
        /// OD trip-end raster
        #[arg(long, value_hint = ValueHint::FilePath)]
        od: Option<PathBuf>,
        /// POIs counted per cell
        #[arg(long, value_hint = ValueHint::FilePath)]
        pois: Option<PathBuf>,
        /// Road points for the proximity layer
        #[arg(long, value_hint = ValueHint::FilePath)]
        roads: Option<PathBuf>,
        #[arg(long, default_value_t = 0.5)]
        od_weight: f64,
        #[arg(long, default_value_t = 0.3)]
        poi_weight: f64,
        #[arg(long, default_value_t = 0.2)]
        road_weight: f64,
        /// Road proximity decay distance in metres
        #[arg(long, default_value_t = 1000.0)]
        road_scale: f64,
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
    },
    /// Projected ports per cell from vehicle registrations
    Capacity {
        #[arg(long, value_hint = ValueHint::FilePath)]
        registrations: PathBuf,
        /// lv2 or dcfc
        #[arg(long)]
        charger: ChargerType,
        #[arg(long, default_value_t = 1.0)]
        growth: f64,
        /// EV share of registrations
        #[arg(long, default_value_t = 1.0)]
        penetration: f64,
        /// Defaults to 20 for lv2 and 100 for dcfc
        #[arg(long)]
        vehicles_per_port: Option<f64>,
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
    },
}

/// Scenario selection and input overrides shared by `candidates plan` and
/// `optimize`.
#[derive(Args, Debug, Clone)]
pub struct ScenarioArgs {
    /// Scenario id, e.g. `urban-lv2`
    #[arg(long)]
    pub scenario: String,
    /// Scenario spec; the built-in scenarios are used without it
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub spec: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub demand: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub capacity: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub regions: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub pois: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub roads: Option<PathBuf>,
    #[arg(long)]
    pub site_threshold: Option<f64>,
    #[arg(long)]
    pub max_candidates: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum CandidatesCommands {
    /// Filter, rank and budget candidates per region
    Plan {
        #[command(flatten)]
        scenario: ScenarioArgs,
        #[arg(long, value_hint = ValueHint::DirPath)]
        out_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    /// Smallest accepted drop in A_hat per step
    #[arg(long)]
    pub min_improvement: Option<f64>,
    /// Write supply/Ai snapshots for every step
    #[arg(long)]
    pub save_intermediate: bool,
    /// Worker threads (0 = all CPUs)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub out_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum BatchCommands {
    /// Plan and optimize every scenario of a spec
    Run {
        #[arg(long, value_hint = ValueHint::FilePath)]
        spec: PathBuf,
        #[arg(long, value_hint = ValueHint::DirPath)]
        out_dir: PathBuf,
        /// Worker threads (0 = all CPUs)
        #[arg(long, default_value_t = 0)]
        threads: usize,
        /// Skip merging station files per scenario
        #[arg(long)]
        no_merge: bool,
    },
}
