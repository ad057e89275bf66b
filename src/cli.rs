use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "irrigo",
    version,
    about = "Fuzzy-logic irrigation controller"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Consume telemetry and publish pump commands (the default)
    Run(RunArgs),
    /// Run a single decision for the given readings
    Decide(DecideArgs),
    /// Show recent decisions
    History {
        /// Number of decisions to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Only show this device
        #[arg(long)]
        device: Option<String>,
    },
    /// Re-run interactive setup
    Init,
    /// Validate config, rule set and forecast connection
    Check,
}

#[derive(Args)]
pub struct RunArgs {
    /// Accept telemetry over TCP at this address instead of stdin/stdout
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Device id for telemetry lines that carry no topic
    #[arg(long, default_value = "default")]
    pub device: String,
}

#[derive(Args)]
pub struct DecideArgs {
    /// Air temperature, °C
    #[arg(long, allow_hyphen_values = true)]
    pub temperature: f64,

    /// Relative humidity, %
    #[arg(long)]
    pub humidity: f64,

    /// Soil moisture, %
    #[arg(long)]
    pub soil_moisture: f64,

    /// Rain sensor is wet
    #[arg(long)]
    pub raining: bool,

    /// Rain probability, %; fetched from the configured forecast if omitted
    #[arg(long)]
    pub rain_probability: Option<f64>,

    /// Print each rule's firing strength
    #[arg(long)]
    pub explain: bool,
}
