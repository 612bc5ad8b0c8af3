//! Multi-scale, multi-size detector driver

use crate::detection::{Provenance, RawDetection};
use crate::detector::Detector;
use crate::error::AnalysisError;
use image::imageops::FilterType;
use image::RgbImage;

pub const SCALES: [f32; 5] = [0.5, 0.75, 1.0, 1.25, 1.5];
pub const SIZES: [u32; 4] = [640, 832, 1024, 1280];

/// Collected output of every pass
#[derive(Debug, Default)]
pub struct PassOutcome {
    pub detections: Vec<RawDetection>,
    pub attempted: usize,
    pub failed: usize,
}

/// Resize `image` by `scale`, rounding dimensions and keeping at least one pixel
fn rescale(image: &RgbImage, scale: f32) -> Result<RgbImage, AnalysisError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(AnalysisError::InferenceError(format!("invalid scale {}", scale)));
    }
    if scale == 1.0 {
        return Ok(image.clone());
    }
    let width = ((image.width() as f32 * scale).round() as u32).max(1);
    let height = ((image.height() as f32 * scale).round() as u32).max(1);
    Ok(image::imageops::resize(image, width, height, FilterType::Triangle))
}

/// Run one pass and map its boxes back to original-image coordinates
fn run_pass(
    detector: &dyn Detector,
    scaled: &RgbImage,
    scale: f32,
    size: u32,
    augment: bool,
) -> Result<Vec<RawDetection>, AnalysisError> {
    let outputs = detector.detect(scaled, size, augment)?;
    Ok(outputs
        .into_iter()
        .map(|o| RawDetection {
            bbox: o.bbox.unscale(scale),
            confidence: o.confidence,
            class_id: o.class_id,
            provenance: Provenance { scale, size },
        })
        .collect())
}

/// Invoke the detector over the cross product of `scales` and `sizes`.
///
/// A failing pass is logged and skipped; it never aborts the sweep.
pub fn run_passes(
    detector: &dyn Detector,
    enhanced: &RgbImage,
    scales: &[f32],
    sizes: &[u32],
    augment: bool,
) -> PassOutcome {
    let mut outcome = PassOutcome::default();

    for &scale in scales {
        let scaled = match rescale(enhanced, scale) {
            Ok(img) => Some(img),
            Err(e) => {
                tracing::warn!("Skipping scale {}: {}", scale, e);
                None
            }
        };

        for &size in sizes {
            outcome.attempted += 1;
            let Some(scaled) = scaled.as_ref() else {
                outcome.failed += 1;
                continue;
            };

            match run_pass(detector, scaled, scale, size, augment) {
                Ok(found) => {
                    tracing::debug!(
                        "Pass scale={} size={} produced {} detections",
                        scale,
                        size,
                        found.len()
                    );
                    outcome.detections.extend(found);
                }
                Err(e) => {
                    tracing::warn!("Pass scale={} size={} failed: {}", scale, size, e);
                    outcome.failed += 1;
                }
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, DetectorOutput};
    use std::sync::Mutex;

    /// Reports one box covering the left half of whatever it is given,
    /// failing on the configured size
    struct HalfBoxDetector {
        fail_size: Option<u32>,
        seen: Mutex<Vec<(u32, u32, u32, bool)>>,
    }

    impl Detector for HalfBoxDetector {
        fn name(&self) -> &'static str {
            "half-box"
        }

        fn description(&self) -> &'static str {
            "test detector"
        }

        fn detect(
            &self,
            image: &RgbImage,
            size: u32,
            augment: bool,
        ) -> Result<Vec<DetectorOutput>, AnalysisError> {
            self.seen
                .lock()
                .unwrap()
                .push((image.width(), image.height(), size, augment));
            if Some(size) == self.fail_size {
                return Err(AnalysisError::InferenceError("boom".into()));
            }
            Ok(vec![DetectorOutput {
                bbox: BoundingBox::new(0.0, 0.0, image.width() as f32 / 2.0, image.height() as f32),
                confidence: 0.6,
                class_id: 0,
            }])
        }
    }

    fn detector(fail_size: Option<u32>) -> HalfBoxDetector {
        HalfBoxDetector {
            fail_size,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_runs_full_cross_product() {
        let det = detector(None);
        let img = RgbImage::new(100, 80);
        let outcome = run_passes(&det, &img, &SCALES, &SIZES, true);

        assert_eq!(outcome.attempted, 20);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.detections.len(), 20);

        let seen = det.seen.lock().unwrap();
        assert!(seen.contains(&(50, 40, 640, true)));
        assert!(seen.contains(&(150, 120, 1280, true)));
        assert!(seen.iter().all(|s| s.3));
    }

    #[test]
    fn test_boxes_map_back_to_original_coordinates() {
        let det = detector(None);
        let img = RgbImage::new(100, 80);
        let outcome = run_passes(&det, &img, &SCALES, &[640], false);

        for raw in &outcome.detections {
            assert!((raw.bbox.x2 - 50.0).abs() < 1e-3, "{:?}", raw);
            assert!((raw.bbox.y2 - 80.0).abs() < 1e-3, "{:?}", raw);
        }
    }

    #[test]
    fn test_failed_pass_is_skipped() {
        let det = detector(Some(832));
        let img = RgbImage::new(40, 40);
        let outcome = run_passes(&det, &img, &SCALES, &SIZES, true);

        assert_eq!(outcome.attempted, 20);
        assert_eq!(outcome.failed, 5);
        assert_eq!(outcome.detections.len(), 15);
        assert!(outcome.detections.iter().all(|d| d.provenance.size != 832));
    }

    #[test]
    fn test_invalid_scale_fails_its_passes_only() {
        let det = detector(None);
        let img = RgbImage::new(40, 40);
        let outcome = run_passes(&det, &img, &[0.0, 1.0], &SIZES, true);
        assert_eq!(outcome.failed, 4);
        assert_eq!(outcome.detections.len(), 4);
    }
}
