use crate::analysis::AnalysisConfig;
use crate::cli::{PipelineArgs, PresetArg, ServeArgs};
use crate::detector::DetectorParams;
use crate::preprocessing::Preset;
use clap::ValueEnum;
use std::path::PathBuf;

/// Detector backend selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    Fixture,
    Remote,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub kind: DetectorKind,
    pub fixture_path: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub params: DetectorParams,
}

/// Everything needed to build an analyzer
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub font_path: Option<PathBuf>,
    pub analysis: AnalysisConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub analysis_timeout_secs: u64,
    pub pipeline: PipelineConfig,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::None => Preset::None,
            PresetArg::Default => Preset::Default,
        }
    }
}

impl From<PipelineArgs> for PipelineConfig {
    fn from(args: PipelineArgs) -> Self {
        Self {
            detector: DetectorConfig {
                kind: args.detector,
                fixture_path: args.fixture_path,
                remote_url: args.remote_url,
                params: DetectorParams::default(),
            },
            font_path: args.font_path,
            analysis: AnalysisConfig {
                augment: !args.no_augment,
                dedup_iou: args.dedup_iou,
                confidence_floor: args.confidence_floor,
                preset: args.preset.into(),
                ..AnalysisConfig::default()
            },
        }
    }
}

impl From<ServeArgs> for Config {
    fn from(args: ServeArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            analysis_timeout_secs: args.analysis_timeout_secs,
            pipeline: args.pipeline.into(),
        }
    }
}
