//! plateblur CLI: detect, track and blur license plates in video files.
//!
//! Usage:
//!   plateblur run <PATHS>...     Redact plates in files or directories
//!   plateblur config show        Print the effective configuration
//!   plateblur config init        Write the default configuration file
//!   plateblur check              Check codecs, model and tracker backends

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use plateblur_common::config::AppConfig;
use plateblur_common::logging::init_logging;

mod commands;
mod paths;

#[derive(Parser)]
#[command(
    name = "plateblur",
    about = "Detect, track and blur license plates in videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Redact license plates in video files
    Run(RunArgs),

    /// Show or initialize the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check encoders, detector model and tracker backends
    Check,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Options for `plateblur run`. Unset values fall back to the config file.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Video files or directories containing videos
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Tracker algorithm: CSRT, KCF, MIL, MOSSE or TEMPLATE
    #[arg(long)]
    pub tracker: Option<String>,

    /// Run detection every N frames
    #[arg(long)]
    pub interval: Option<u32>,

    /// Detection confidence threshold [0, 1]
    #[arg(long)]
    pub conf_threshold: Option<f32>,

    /// IoU threshold for non-max suppression [0, 1]
    #[arg(long)]
    pub iou_threshold: Option<f32>,

    /// Fraction trimmed from each side of a box before blurring [0, 1]
    #[arg(long)]
    pub shrink_factor: Option<f64>,

    /// Detect on every frame instead of tracking between detections
    #[arg(long)]
    pub no_tracking: bool,

    /// Redaction method: blur or pixelate
    #[arg(long)]
    pub method: Option<String>,

    /// Blur kernel size or pixelation grid cells
    #[arg(long)]
    pub strength: Option<u32>,

    /// Path to the YOLO ONNX plate model
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Write outputs into this directory, keeping file names
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of files processed in parallel
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,

    /// Run the pipeline without a detector model
    #[arg(long)]
    pub dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Run(args) => commands::run::run(args, config, cli.verbose).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config),
            ConfigAction::Init { force } => commands::config::init(force),
        },
        Commands::Check => commands::check::run(&config),
    }
}
