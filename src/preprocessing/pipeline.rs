use crate::error::AnalysisError;
use image::{Rgb, RgbImage};
use serde::Serialize;
use std::time::Instant;

use super::steps;
use super::steps::normalize::RgbF32Image;

/// Blend factor of each variant, in variant order. The first variant is the
/// base; its weight is informational.
pub const BLEND_WEIGHTS: [f32; 5] = [0.3, 0.2, 0.2, 0.15, 0.15];

/// Enhancement preset names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Skip enhancement, the detector sees the original image
    None,
    /// Five-variant blend
    #[default]
    Default,
}

impl Preset {
    /// Parse from query parameter string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "default" => Some(Self::Default),
            _ => None,
        }
    }

    /// Get the preset name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Default => "default",
        }
    }
}

/// Timing information for a single enhancement step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of enhancement including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct EnhancementResult {
    /// Enhanced image (not serialized)
    #[serde(skip)]
    pub image: RgbImage,
    /// Total enhancement time in milliseconds
    pub total_time_ms: u64,
    /// Preset used
    pub preset: String,
    /// False when a step failed and the original image was passed through
    pub enhanced: bool,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

type VariantFn = fn(&RgbImage) -> Result<RgbImage, AnalysisError>;

const VARIANTS: [(&str, VariantFn); 5] = [
    ("segmentation", steps::threshold::apply),
    ("dark_regions", steps::dark_regions::apply),
    ("edges", steps::edges::apply),
    ("clahe", steps::clahe::apply),
    ("color_mask", steps::color_mask::apply),
];

/// Builds the enhanced raster fed to the detector
pub struct Enhancer {
    preset: Preset,
}

impl Enhancer {
    pub fn new(preset: Preset) -> Self {
        Self { preset }
    }

    /// Enhance an image. Never fails: on any internal error the original
    /// image is returned unmodified.
    pub fn enhance(&self, image: &RgbImage) -> EnhancementResult {
        let start = Instant::now();

        if self.preset == Preset::None {
            return EnhancementResult {
                image: image.clone(),
                total_time_ms: 0,
                preset: self.preset.as_str().to_string(),
                enhanced: false,
                steps: vec![],
            };
        }

        let mut steps_timing = Vec::new();
        let (result, enhanced) = match self.try_enhance(image, &mut steps_timing) {
            Ok(result) => (result, true),
            Err(e) => {
                tracing::warn!("Enhancement failed, using original image: {}", e);
                (image.clone(), false)
            }
        };

        EnhancementResult {
            image: result,
            total_time_ms: start.elapsed().as_millis() as u64,
            preset: self.preset.as_str().to_string(),
            enhanced,
            steps: steps_timing,
        }
    }

    fn try_enhance(
        &self,
        image: &RgbImage,
        timings: &mut Vec<StepTiming>,
    ) -> Result<RgbImage, AnalysisError> {
        let mut variants = Vec::with_capacity(VARIANTS.len());
        for (name, step_fn) in VARIANTS {
            variants.push(self.run_step(name, image, timings, step_fn)?);
        }

        let step_start = Instant::now();
        let blended = blend(&variants, &BLEND_WEIGHTS)?;
        let normalized = steps::normalize::apply(&blended)?;
        timings.push(StepTiming {
            name: "blend".to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });

        Ok(normalized)
    }

    fn run_step(
        &self,
        name: &str,
        img: &RgbImage,
        timings: &mut Vec<StepTiming>,
        step_fn: VariantFn,
    ) -> Result<RgbImage, AnalysisError> {
        let step_start = Instant::now();
        let result = step_fn(img)?;
        if result.dimensions() != img.dimensions() {
            return Err(AnalysisError::PreprocessingError(format!(
                "step {} changed dimensions from {:?} to {:?}",
                name,
                img.dimensions(),
                result.dimensions()
            )));
        }
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        Ok(result)
    }
}

/// Successive alpha blending: `acc = acc * (1 - w) + variant * w` for every
/// variant after the first
pub fn blend(variants: &[RgbImage], weights: &[f32]) -> Result<RgbF32Image, AnalysisError> {
    let (base, rest) = variants.split_first().ok_or_else(|| {
        AnalysisError::PreprocessingError("no variants to blend".to_string())
    })?;
    if weights.len() != variants.len() {
        return Err(AnalysisError::PreprocessingError(format!(
            "{} variants but {} weights",
            variants.len(),
            weights.len()
        )));
    }

    let mut acc = RgbF32Image::from_fn(base.width(), base.height(), |x, y| {
        Rgb(base.get_pixel(x, y).0.map(|c| c as f32))
    });

    for (variant, &w) in rest.iter().zip(&weights[1..]) {
        for (a, v) in acc.pixels_mut().zip(variant.pixels()) {
            for c in 0..3 {
                a.0[c] = a.0[c] * (1.0 - w) + v.0[c] as f32 * w;
            }
        }
    }

    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (20..60).contains(&x) && (25..35).contains(&y) {
                Rgb([120, 80, 20])
            } else {
                Rgb([60, 140, 50])
            }
        })
    }

    #[test]
    fn test_enhance_preserves_dimensions() {
        let img = textured(80, 60);
        let result = Enhancer::new(Preset::Default).enhance(&img);
        assert!(result.enhanced);
        assert_eq!(result.image.dimensions(), (80, 60));
        assert_eq!(result.steps.len(), VARIANTS.len() + 1);
    }

    #[test]
    fn test_enhance_uses_full_range() {
        let result = Enhancer::new(Preset::Default).enhance(&textured(80, 60));
        let raw = result.image.as_raw();
        assert_eq!(raw.iter().min(), Some(&0));
        assert_eq!(raw.iter().max(), Some(&255));
    }

    #[test]
    fn test_all_black_image_does_not_fail() {
        let img = RgbImage::new(100, 100);
        let result = Enhancer::new(Preset::Default).enhance(&img);
        assert_eq!(result.image.dimensions(), (100, 100));
    }

    #[test]
    fn test_failure_returns_original() {
        let img = RgbImage::new(0, 0);
        let result = Enhancer::new(Preset::Default).enhance(&img);
        assert!(!result.enhanced);
        assert_eq!(result.image, img);
    }

    #[test]
    fn test_none_preset_passes_through() {
        let img = textured(10, 10);
        let result = Enhancer::new(Preset::None).enhance(&img);
        assert_eq!(result.image, img);
        assert!(result.steps.is_empty());
    }

    #[test]
    fn test_blend_applies_weights_in_order() {
        let a = RgbImage::from_pixel(1, 1, Rgb([100, 100, 100]));
        let b = RgbImage::from_pixel(1, 1, Rgb([200, 200, 200]));
        let blended = blend(&[a, b], &[0.3, 0.5]).unwrap();
        assert!((blended.get_pixel(0, 0).0[0] - 150.0).abs() < 1e-4);
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!(Preset::parse("NONE"), Some(Preset::None));
        assert_eq!(Preset::parse("default"), Some(Preset::Default));
        assert_eq!(Preset::parse("aggressive"), None);
    }
}
