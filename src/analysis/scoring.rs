//! Per-region statistics, false-positive rejection and confidence re-weighting

use crate::detection::{BoundingBox, DerivedMetrics, Detection, RawDetection};
use crate::error::AnalysisError;
use crate::preprocessing::steps::color::rgb_to_hsv;
use crate::taxonomy::PestClass;
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use serde::Serialize;

/// Canny hysteresis thresholds
const CANNY_LOW: f32 = 100.0;
const CANNY_HIGH: f32 = 200.0;

/// Applied once per satisfied morphology condition
const BONUS: f32 = 1.2;

/// Statistics of the cropped region behind one raw detection
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStats {
    pub mean_brightness: f32,
    /// Standard deviation of grayscale intensity
    pub contrast: f32,
    pub channel_mean: [f32; 3],
    pub channel_std: [f32; 3],
    pub width: u32,
    pub height: u32,
    /// Longer side over shorter side
    pub aspect_ratio: f32,
    pub area_ratio: f32,
    pub edge_density: f32,
    pub mean_hue: f32,
}

impl RegionStats {
    pub fn metrics(&self) -> DerivedMetrics {
        DerivedMetrics {
            aspect_ratio: self.aspect_ratio,
            contrast: self.contrast,
            area_ratio: self.area_ratio,
            edge_density: self.edge_density,
        }
    }
}

/// Why a region was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Uniformly dark, most likely a hole in the leaf
    DarkUniform,
    BadAspectRatio,
    UniformColor,
    LowTexture,
}

/// Result of scoring one raw detection
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Accepted(Detection),
    Rejected(RejectReason),
    /// The box does not cover any pixel of the image
    EmptyRegion,
}

/// Integer pixel bounds of `bbox` clipped to the image, or `None` when empty
fn crop_bounds(bbox: &BoundingBox, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let clamp = |v: f32, max: u32| (v as i64).clamp(0, max as i64) as u32;
    let x1 = clamp(bbox.x1, width);
    let y1 = clamp(bbox.y1, height);
    let x2 = clamp(bbox.x2, width);
    let y2 = clamp(bbox.y2, height);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some((x1, y1, x2 - x1, y2 - y1))
}

/// Population mean and standard deviation
fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    (mean as f32, var.sqrt() as f32)
}

/// Compute region statistics, or `Ok(None)` when the crop is empty
pub fn region_stats(
    image: &RgbImage,
    bbox: &BoundingBox,
) -> Result<Option<RegionStats>, AnalysisError> {
    if !bbox.is_finite() {
        return Err(AnalysisError::ScoringError(format!(
            "non-finite box {:?}",
            bbox
        )));
    }
    let (img_w, img_h) = image.dimensions();
    let Some((x, y, w, h)) = crop_bounds(bbox, img_w, img_h) else {
        return Ok(None);
    };

    let region = image::imageops::crop_imm(image, x, y, w, h).to_image();
    let gray: GrayImage = image::imageops::grayscale(&region);

    let intensities: Vec<f32> = gray.pixels().map(|p| p.0[0] as f32).collect();
    let (mean_brightness, contrast) = mean_std(&intensities);

    let mut channel_mean = [0.0f32; 3];
    let mut channel_std = [0.0f32; 3];
    for c in 0..3 {
        let channel: Vec<f32> = region.pixels().map(|p| p.0[c] as f32).collect();
        (channel_mean[c], channel_std[c]) = mean_std(&channel);
    }

    let pixel_count = (w * h) as f32;
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count();

    let hues: Vec<f32> = region.pixels().map(|p| rgb_to_hsv(*p).0).collect();
    let (mean_hue, _) = mean_std(&hues);

    Ok(Some(RegionStats {
        mean_brightness,
        contrast,
        channel_mean,
        channel_std,
        width: w,
        height: h,
        aspect_ratio: w.max(h) as f32 / w.min(h) as f32,
        area_ratio: pixel_count / (img_w as f32 * img_h as f32),
        edge_density: edge_pixels as f32 / pixel_count,
        mean_hue,
    }))
}

/// First rejection rule the region trips, if any
pub fn rejection(stats: &RegionStats) -> Option<RejectReason> {
    if stats.mean_brightness < 30.0 && stats.contrast < 15.0 {
        return Some(RejectReason::DarkUniform);
    }
    if stats.aspect_ratio < 1.2 || stats.aspect_ratio > 8.0 {
        return Some(RejectReason::BadAspectRatio);
    }
    if stats.channel_std.iter().all(|&s| s < 10.0) {
        return Some(RejectReason::UniformColor);
    }
    if stats.edge_density < 0.01 {
        return Some(RejectReason::LowTexture);
    }
    None
}

/// 1.2 for every morphology condition the region satisfies, compounded
pub fn confidence_multiplier(stats: &RegionStats) -> f32 {
    let within = |v: f32, lo: f32, hi: f32| v > lo && v < hi;
    [
        within(stats.aspect_ratio, 2.0, 6.0),
        within(stats.contrast, 20.0, 120.0),
        within(stats.area_ratio, 0.005, 0.3),
        within(stats.edge_density, 0.02, 0.2),
        within(stats.mean_hue, 20.0, 100.0),
    ]
    .into_iter()
    .filter(|&ok| ok)
    .fold(1.0, |m, _| m * BONUS)
}

/// Score one raw detection against the original image
pub fn score(raw: &RawDetection, image: &RgbImage) -> Result<ScoreOutcome, AnalysisError> {
    let label = PestClass::from_id(raw.class_id).ok_or_else(|| {
        AnalysisError::ScoringError(format!("class id {} outside taxonomy", raw.class_id))
    })?;

    let Some(stats) = region_stats(image, &raw.bbox)? else {
        return Ok(ScoreOutcome::EmptyRegion);
    };

    if let Some(reason) = rejection(&stats) {
        return Ok(ScoreOutcome::Rejected(reason));
    }

    Ok(ScoreOutcome::Accepted(Detection {
        bbox: raw.bbox,
        label,
        confidence: raw.confidence * confidence_multiplier(&stats),
        metrics: stats.metrics(),
        provenance: raw.provenance,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Provenance;
    use image::Rgb;

    fn raw(bbox: BoundingBox, confidence: f32) -> RawDetection {
        RawDetection {
            bbox,
            confidence,
            class_id: 0,
            provenance: Provenance {
                scale: 1.0,
                size: 640,
            },
        }
    }

    /// Green leaf with a striped brown caterpillar lying horizontally
    fn leaf_with_caterpillar() -> RgbImage {
        RgbImage::from_fn(200, 200, |x, y| {
            if (40..120).contains(&x) && (90..110).contains(&y) {
                if (x / 8) % 2 == 0 {
                    Rgb([200, 140, 60])
                } else {
                    Rgb([20, 10, 5])
                }
            } else {
                Rgb([60, 140, 50])
            }
        })
    }

    fn neutral_stats() -> RegionStats {
        RegionStats {
            mean_brightness: 100.0,
            contrast: 10.0,
            channel_mean: [100.0; 3],
            channel_std: [30.0; 3],
            width: 30,
            height: 20,
            aspect_ratio: 1.5,
            area_ratio: 0.5,
            edge_density: 0.5,
            mean_hue: 150.0,
        }
    }

    #[test]
    fn test_textured_elongated_region_is_accepted() {
        let img = leaf_with_caterpillar();
        let outcome = score(&raw(BoundingBox::new(40.0, 90.0, 120.0, 110.0), 0.5), &img).unwrap();

        let ScoreOutcome::Accepted(det) = outcome else {
            panic!("expected acceptance, got {:?}", outcome);
        };
        assert_eq!(det.label, PestClass::Lagarta);
        assert!((det.metrics.aspect_ratio - 4.0).abs() < 1e-6);
        assert!(det.metrics.edge_density > 0.01);
        assert!(det.confidence >= 0.5);
    }

    #[test]
    fn test_vertical_box_has_same_aspect_as_horizontal() {
        let img = leaf_with_caterpillar();
        let horizontal = region_stats(&img, &BoundingBox::new(40.0, 90.0, 120.0, 110.0))
            .unwrap()
            .unwrap();
        let vertical = region_stats(&img, &BoundingBox::new(90.0, 40.0, 110.0, 120.0))
            .unwrap()
            .unwrap();

        assert_eq!((vertical.width, vertical.height), (20, 80));
        assert!((vertical.aspect_ratio - 4.0).abs() < 1e-6);
        assert_eq!(vertical.aspect_ratio, horizontal.aspect_ratio);
        assert_ne!(rejection(&vertical), Some(RejectReason::BadAspectRatio));
    }

    #[test]
    fn test_black_image_region_is_dark_uniform() {
        let img = RgbImage::new(100, 100);
        let outcome = score(&raw(BoundingBox::new(10.0, 10.0, 60.0, 30.0), 0.9), &img).unwrap();
        assert_eq!(outcome, ScoreOutcome::Rejected(RejectReason::DarkUniform));
    }

    #[test]
    fn test_uniform_color_is_always_rejected() {
        let mut stats = neutral_stats();
        stats.channel_std = [0.0; 3];
        assert_eq!(rejection(&stats), Some(RejectReason::UniformColor));

        // Ideal otherwise
        stats.contrast = 50.0;
        stats.aspect_ratio = 3.0;
        stats.area_ratio = 0.05;
        stats.edge_density = 0.1;
        stats.mean_hue = 40.0;
        assert!(rejection(&stats).is_some());
    }

    #[test]
    fn test_square_and_needle_shapes_are_rejected() {
        let mut stats = neutral_stats();
        stats.aspect_ratio = 1.0;
        assert_eq!(rejection(&stats), Some(RejectReason::BadAspectRatio));
        stats.aspect_ratio = 9.0;
        assert_eq!(rejection(&stats), Some(RejectReason::BadAspectRatio));
    }

    #[test]
    fn test_low_texture_is_rejected() {
        let mut stats = neutral_stats();
        stats.edge_density = 0.005;
        assert_eq!(rejection(&stats), Some(RejectReason::LowTexture));
    }

    #[test]
    fn test_multiplier_is_one_without_bonuses() {
        assert_eq!(confidence_multiplier(&neutral_stats()), 1.0);
    }

    #[test]
    fn test_multiplier_grows_with_each_condition() {
        let mut stats = neutral_stats();
        let mut previous = confidence_multiplier(&stats);

        let steps: [fn(&mut RegionStats); 5] = [
            |s| s.aspect_ratio = 3.0,
            |s| s.contrast = 50.0,
            |s| s.area_ratio = 0.05,
            |s| s.edge_density = 0.1,
            |s| s.mean_hue = 40.0,
        ];
        for step in steps {
            step(&mut stats);
            let current = confidence_multiplier(&stats);
            assert!(current > previous);
            previous = current;
        }
        assert!((previous - 1.2f32.powi(5)).abs() < 1e-5);
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let mut stats = neutral_stats();
        stats.aspect_ratio = 2.0;
        stats.contrast = 120.0;
        assert_eq!(confidence_multiplier(&stats), 1.0);
    }

    #[test]
    fn test_box_outside_image_is_empty() {
        let img = leaf_with_caterpillar();
        let outcome = score(&raw(BoundingBox::new(250.0, 250.0, 300.0, 300.0), 0.5), &img).unwrap();
        assert_eq!(outcome, ScoreOutcome::EmptyRegion);
    }

    #[test]
    fn test_unknown_class_and_nan_box_are_errors() {
        let img = leaf_with_caterpillar();
        let mut bad_class = raw(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.5);
        bad_class.class_id = 42;
        assert!(score(&bad_class, &img).is_err());

        let nan = raw(BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0), 0.5);
        assert!(score(&nan, &img).is_err());
    }
}
