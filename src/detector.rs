use crate::detection::DetectorOutput;
use crate::error::AnalysisError;
use image::RgbImage;
use serde::Serialize;

/// Inference parameters a detector backend is configured with
#[derive(Debug, Clone, Serialize)]
pub struct DetectorParams {
    /// Minimum raw score kept by the backend
    pub confidence: f32,
    /// NMS IoU threshold applied inside the backend
    pub iou: f32,
    pub max_detections: usize,
    /// Class-agnostic NMS
    pub agnostic: bool,
    /// Restrict output to these class ids (empty = all classes)
    pub classes: Vec<u32>,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            confidence: 0.01,
            iou: 0.7,
            max_detections: 100,
            agnostic: true,
            classes: vec![0],
        }
    }
}

impl DetectorParams {
    /// Apply the confidence floor, class filter and detection cap to
    /// backend output that did not honor them itself
    pub fn filter(&self, mut outputs: Vec<DetectorOutput>) -> Vec<DetectorOutput> {
        outputs.retain(|o| {
            o.confidence >= self.confidence
                && (self.classes.is_empty() || self.classes.contains(&o.class_id))
        });
        outputs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        outputs.truncate(self.max_detections);
        outputs
    }
}

/// Trait that all detector backends must implement
///
/// A detector is a black box: raster in, boxes out. Boxes are expressed in
/// the coordinates of the raster passed to `detect`.
pub trait Detector: Send + Sync {
    /// Returns the backend identifier (e.g., "fixture", "remote")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the backend
    fn description(&self) -> &'static str;

    /// Run one inference pass at the given model input size
    fn detect(
        &self,
        image: &RgbImage,
        size: u32,
        augment: bool,
    ) -> Result<Vec<DetectorOutput>, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn output(confidence: f32, class_id: u32) -> DetectorOutput {
        DetectorOutput {
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            confidence,
            class_id,
        }
    }

    #[test]
    fn test_filter_applies_floor_and_class_filter() {
        let params = DetectorParams::default();
        let kept = params.filter(vec![output(0.5, 0), output(0.005, 0), output(0.9, 3)]);
        assert_eq!(kept, vec![output(0.5, 0)]);
    }

    #[test]
    fn test_filter_caps_to_highest_scores() {
        let params = DetectorParams {
            max_detections: 2,
            classes: vec![],
            ..Default::default()
        };
        let kept = params.filter(vec![output(0.2, 1), output(0.8, 2), output(0.5, 0)]);
        assert_eq!(kept, vec![output(0.8, 2), output(0.5, 0)]);
    }
}
