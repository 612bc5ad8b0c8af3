use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::DetectorKind;

#[derive(Parser, Debug)]
#[command(name = "pest-analyzer")]
#[command(about = "Multi-scale pest detection for crop monitoring")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP analysis server
    Serve(ServeArgs),
    /// Analyze a single image file
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long, env = "PEST_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PEST_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 25MB)
    #[arg(long, env = "PEST_MAX_FILE_SIZE", default_value = "26214400")]
    pub max_file_size: usize,

    /// Deadline for one analysis request, in seconds
    #[arg(long, env = "PEST_ANALYSIS_TIMEOUT_SECS", default_value = "120")]
    pub analysis_timeout_secs: u64,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Image to analyze
    pub image: PathBuf,

    /// Where to write the annotated image (default: <image>_analyzed.png)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetArg {
    None,
    Default,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Detector backend
    #[arg(long, env = "PEST_DETECTOR", value_enum, default_value = "remote")]
    pub detector: DetectorKind,

    /// JSON file of normalized detections for the fixture backend
    #[arg(long, env = "PEST_FIXTURE_PATH")]
    pub fixture_path: Option<PathBuf>,

    /// Inference endpoint for the remote backend
    #[arg(long, env = "PEST_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Font used for label text (labels are drawn without text if unset)
    #[arg(long, env = "PEST_FONT_PATH")]
    pub font_path: Option<PathBuf>,

    /// Enhancement preset
    #[arg(long, env = "PEST_PRESET", value_enum, default_value = "default")]
    pub preset: PresetArg,

    /// IoU above which same-class detections are merged
    #[arg(long, env = "PEST_DEDUP_IOU", default_value = "0.7")]
    pub dedup_iou: f32,

    /// Detections at or below this confidence are dropped
    #[arg(long, env = "PEST_CONFIDENCE_FLOOR", default_value = "0.1")]
    pub confidence_floor: f32,

    /// Disable test-time augmentation in the detector
    #[arg(long, env = "PEST_NO_AUGMENT")]
    pub no_augment: bool,
}
