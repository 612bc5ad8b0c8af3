//! Fixture detector
//!
//! Replays detections recorded in a JSON file. Boxes are stored normalized to
//! `[0, 1]` and scaled to whatever raster the detector is handed, so the same
//! fixture answers consistently at every scale and size.

use crate::detection::{BoundingBox, DetectorOutput};
use crate::detector::{Detector, DetectorParams};
use crate::error::AnalysisError;
use image::RgbImage;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureEntry {
    /// Normalized `[x1, y1, x2, y2]`
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: u32,
}

pub struct FixtureDetector {
    entries: Vec<FixtureEntry>,
    params: DetectorParams,
}

impl FixtureDetector {
    pub fn new(entries: Vec<FixtureEntry>, params: DetectorParams) -> Self {
        Self { entries, params }
    }

    /// Load a fixture file. A missing or malformed file leaves the detector
    /// unavailable.
    pub fn load(path: &Path, params: DetectorParams) -> Result<Self, AnalysisError> {
        tracing::info!("Loading fixture detections from {}", path.display());

        let data = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::DetectorUnavailable(format!(
                "Failed to read fixture {}: {}",
                path.display(),
                e
            ))
        })?;
        let entries: Vec<FixtureEntry> = serde_json::from_str(&data).map_err(|e| {
            AnalysisError::DetectorUnavailable(format!(
                "Invalid fixture {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::info!("Fixture detector ready with {} entries", entries.len());
        Ok(Self::new(entries, params))
    }
}

impl Detector for FixtureDetector {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn description(&self) -> &'static str {
        "Replays recorded detections from a JSON fixture"
    }

    fn detect(
        &self,
        image: &RgbImage,
        size: u32,
        _augment: bool,
    ) -> Result<Vec<DetectorOutput>, AnalysisError> {
        if size == 0 {
            return Err(AnalysisError::InferenceError(
                "model input size must be positive".to_string(),
            ));
        }

        let (w, h) = (image.width() as f32, image.height() as f32);
        let outputs = self
            .entries
            .iter()
            .map(|e| DetectorOutput {
                bbox: BoundingBox::new(e.bbox[0] * w, e.bbox[1] * h, e.bbox[2] * w, e.bbox[3] * h),
                confidence: e.confidence,
                class_id: e.class_id,
            })
            .collect();

        Ok(self.params.filter(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_boxes_follow_raster_size() {
        let det = FixtureDetector::new(
            vec![FixtureEntry {
                bbox: [0.1, 0.2, 0.5, 0.4],
                confidence: 0.8,
                class_id: 0,
            }],
            DetectorParams::default(),
        );

        let out = det.detect(&RgbImage::new(200, 100), 640, true).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bbox, BoundingBox::new(20.0, 20.0, 100.0, 40.0));
    }

    #[test]
    fn test_params_filter_fixture_output() {
        let det = FixtureDetector::new(
            vec![
                FixtureEntry {
                    bbox: [0.0, 0.0, 0.5, 0.5],
                    confidence: 0.8,
                    class_id: 4,
                },
                FixtureEntry {
                    bbox: [0.0, 0.0, 0.5, 0.5],
                    confidence: 0.001,
                    class_id: 0,
                },
            ],
            DetectorParams::default(),
        );
        assert!(det.detect(&RgbImage::new(10, 10), 640, false).unwrap().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"box": [0.2, 0.45, 0.6, 0.55], "confidence": 0.7, "class_id": 0}}]"#
        )
        .unwrap();

        let det = FixtureDetector::load(file.path(), DetectorParams::default()).unwrap();
        let out = det.detect(&RgbImage::new(100, 100), 832, true).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 0);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = FixtureDetector::load(Path::new("/nonexistent.json"), DetectorParams::default());
        assert!(matches!(err, Err(AnalysisError::DetectorUnavailable(_))));
    }

    #[test]
    fn test_zero_size_fails_the_pass() {
        let det = FixtureDetector::new(vec![], DetectorParams::default());
        assert!(matches!(
            det.detect(&RgbImage::new(10, 10), 0, true),
            Err(AnalysisError::InferenceError(_))
        ));
    }
}
