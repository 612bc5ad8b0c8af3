use crate::taxonomy::PestClass;
use serde::{Deserialize, Serialize};

/// Axis-aligned box `(x1, y1, x2, y2)` in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Divide every coordinate by `scale`, mapping a box found on a resized
    /// raster back onto the original one
    pub fn unscale(&self, scale: f32) -> Self {
        Self {
            x1: self.x1 / scale,
            y1: self.y1 / scale,
            x2: self.x2 / scale,
            y2: self.y2 / scale,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Output of one detector call, in the coordinates of the raster it saw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorOutput {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: u32,
}

/// Which scale/size pass produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Provenance {
    pub scale: f32,
    pub size: u32,
}

/// Detector output mapped back to original-image coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: u32,
    pub provenance: Provenance,
}

/// Region statistics reported alongside an accepted detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub aspect_ratio: f32,
    pub contrast: f32,
    pub area_ratio: f32,
    pub edge_density: f32,
}

/// An accepted pest sighting. Never mutated after scoring; the deduplicator
/// replaces whole values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub label: PestClass,
    pub confidence: f32,
    pub metrics: DerivedMetrics,
    pub provenance: Provenance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscale_maps_back_to_original_coordinates() {
        let found = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        let original = found.unscale(0.5);
        assert_eq!(original, BoundingBox::new(20.0, 40.0, 60.0, 80.0));
    }

    #[test]
    fn test_inverted_box_has_zero_area() {
        let b = BoundingBox::new(10.0, 10.0, 5.0, 20.0);
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.area(), 0.0);
    }

    #[test]
    fn test_detector_output_uses_box_array_on_the_wire() {
        let parsed: DetectorOutput =
            serde_json::from_str(r#"{"box":[1,2,3,4],"confidence":0.5,"class_id":0}"#).unwrap();
        assert_eq!(parsed.bbox, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(parsed.class_id, 0);
    }
}
