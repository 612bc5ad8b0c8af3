//! Pest detection post-processing pipeline
//!
//! enhance -> multi-scale detection -> scoring/filtering -> dedup ->
//! confidence floor -> render, all on the calling thread.

pub mod dedup;
pub mod multi_scale;
pub mod scoring;

use crate::config::PipelineConfig;
use crate::detection::Detection;
use crate::detector::Detector;
use crate::detectors;
use crate::error::AnalysisError;
use crate::preprocessing::{EnhancementResult, Enhancer, Preset};
use crate::render::Renderer;
use image::{DynamicImage, RgbImage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use self::dedup::Deduplicator;
use self::scoring::ScoreOutcome;

/// IoU threshold used when merging detections across passes
pub const PIPELINE_IOU_THRESHOLD: f32 = 0.7;
/// Detections at or below this confidence are dropped after dedup
pub const CONFIDENCE_FLOOR: f32 = 0.1;

/// Pipeline knobs
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub scales: Vec<f32>,
    pub sizes: Vec<u32>,
    pub augment: bool,
    pub dedup_iou: f32,
    pub confidence_floor: f32,
    pub preset: Preset,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            scales: multi_scale::SCALES.to_vec(),
            sizes: multi_scale::SIZES.to_vec(),
            augment: true,
            dedup_iou: PIPELINE_IOU_THRESHOLD,
            confidence_floor: CONFIDENCE_FLOOR,
            preset: Preset::Default,
        }
    }
}

/// Counters describing what happened to each raw detection
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisStats {
    pub passes_attempted: usize,
    pub passes_failed: usize,
    pub raw_detections: usize,
    pub empty_regions: usize,
    pub rejected: usize,
    pub scoring_errors: usize,
    pub removed_by_dedup: usize,
    pub below_floor: usize,
    pub processing_time_ms: u64,
}

/// Surviving detections plus the annotated image
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Ordered by confidence, highest first
    pub detections: Vec<Detection>,
    #[serde(skip)]
    pub annotated: RgbImage,
    pub stats: AnalysisStats,
    pub preprocessing: EnhancementResult,
}

/// A detection together with the treatment advice for its label
#[derive(Debug, Serialize)]
pub struct ReportedDetection<'a> {
    #[serde(flatten)]
    pub detection: &'a Detection,
    pub recommendations: &'static [&'static str],
}

/// Serializable view of an analysis, as returned to API and CLI users
#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    pub detections: Vec<ReportedDetection<'a>>,
    /// Advice for each distinct label found
    pub recommendations: BTreeMap<&'static str, &'static [&'static str]>,
    pub stats: &'a AnalysisStats,
    pub preprocessing: &'a EnhancementResult,
}

impl AnalysisResult {
    pub fn report(&self) -> AnalysisReport<'_> {
        AnalysisReport {
            detections: self
                .detections
                .iter()
                .map(|d| ReportedDetection {
                    detection: d,
                    recommendations: d.label.recommendations(),
                })
                .collect(),
            recommendations: self
                .detections
                .iter()
                .map(|d| (d.label.name(), d.label.recommendations()))
                .collect(),
            stats: &self.stats,
            preprocessing: &self.preprocessing,
        }
    }
}

/// Reject anything that is not a non-empty 3-channel raster
pub fn validate_input(image: &DynamicImage) -> Result<RgbImage, AnalysisError> {
    let channels = image.color().channel_count();
    if channels != 3 {
        return Err(AnalysisError::InvalidInput(format!(
            "expected 3 color channels, got {} ({:?})",
            channels,
            image.color()
        )));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(image.to_rgb8())
}

pub struct Analyzer {
    detector: Result<Arc<dyn Detector>, String>,
    renderer: Renderer,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(detector: Arc<dyn Detector>, renderer: Renderer, config: AnalysisConfig) -> Self {
        Self {
            detector: Ok(detector),
            renderer,
            config,
        }
    }

    /// Build an analyzer from configuration. A detector that fails to load
    /// leaves the analyzer in the unavailable state; a bad font is fatal.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AnalysisError> {
        let renderer = Renderer::from_config(config.font_path.as_deref())?;
        match detectors::load(&config.detector) {
            Ok(detector) => {
                tracing::info!("Detector '{}' ready", detector.name());
                Ok(Self::new(detector, renderer, config.analysis.clone()))
            }
            Err(e) => {
                tracing::error!("Detector failed to load: {}", e);
                Ok(Self::unavailable(e.to_string(), renderer, config.analysis.clone()))
            }
        }
    }

    /// Analyzer whose detector failed to load; every analysis reports why
    pub fn unavailable(reason: impl Into<String>, renderer: Renderer, config: AnalysisConfig) -> Self {
        Self {
            detector: Err(reason.into()),
            renderer,
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn detector(&self) -> Option<&Arc<dyn Detector>> {
        self.detector.as_ref().ok()
    }

    /// Why the detector is unavailable, if it is
    pub fn unavailable_reason(&self) -> Option<&str> {
        self.detector.as_ref().err().map(String::as_str)
    }

    /// Analyze with the configured preset
    pub fn analyze(&self, image: &DynamicImage) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_with_preset(image, self.config.preset)
    }

    pub fn analyze_with_preset(
        &self,
        image: &DynamicImage,
        preset: Preset,
    ) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();
        let original = validate_input(image)?;
        let detector = self
            .detector
            .as_ref()
            .map_err(|reason| AnalysisError::DetectorUnavailable(reason.clone()))?;

        let preprocessing = Enhancer::new(preset).enhance(&original);

        let passes = multi_scale::run_passes(
            detector.as_ref(),
            &preprocessing.image,
            &self.config.scales,
            &self.config.sizes,
            self.config.augment,
        );

        let mut stats = AnalysisStats {
            passes_attempted: passes.attempted,
            passes_failed: passes.failed,
            raw_detections: passes.detections.len(),
            ..Default::default()
        };

        let mut accepted = Vec::new();
        for raw in &passes.detections {
            match scoring::score(raw, &original) {
                Ok(ScoreOutcome::Accepted(detection)) => accepted.push(detection),
                Ok(ScoreOutcome::Rejected(reason)) => {
                    tracing::debug!("Rejected {:?} at {:?}: {:?}", raw.bbox, raw.provenance, reason);
                    stats.rejected += 1;
                }
                Ok(ScoreOutcome::EmptyRegion) => stats.empty_regions += 1,
                Err(e) => {
                    tracing::warn!("Skipping detection: {}", e);
                    stats.scoring_errors += 1;
                }
            }
        }

        let before_dedup = accepted.len();
        let deduped = Deduplicator::new(self.config.dedup_iou).deduplicate(accepted);
        stats.removed_by_dedup = before_dedup - deduped.len();

        let before_floor = deduped.len();
        let detections: Vec<Detection> = deduped
            .into_iter()
            .filter(|d| d.confidence > self.config.confidence_floor)
            .collect();
        stats.below_floor = before_floor - detections.len();

        let annotated = self.renderer.render(&original, &detections)?;
        stats.processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "Analysis finished in {}ms: {} raw, {} rejected, {} kept ({} passes failed)",
            stats.processing_time_ms,
            stats.raw_detections,
            stats.rejected,
            detections.len(),
            stats.passes_failed
        );

        Ok(AnalysisResult {
            detections,
            annotated,
            stats,
            preprocessing,
        })
    }
}
