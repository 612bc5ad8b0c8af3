//! Same-class duplicate suppression across passes

use crate::detection::{BoundingBox, Detection};

/// General-purpose IoU threshold
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.4;
/// A candidate must beat an overlapping kept detection by more than this
/// factor to replace it
pub const DOMINANCE_RATIO: f32 = 1.2;

/// Intersection over union of two axis-aligned boxes
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    pub iou_threshold: f32,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl Deduplicator {
    pub fn new(iou_threshold: f32) -> Self {
        Self { iou_threshold }
    }

    /// Merge overlapping same-label detections, strongest first.
    ///
    /// Output keeps the order in which detections were first kept.
    ///
    /// Because candidates arrive in descending confidence, a kept detection is
    /// never weaker than a later candidate, so the dominance replacement does
    /// not fire for positive confidences. A dominant box wins by being sorted
    /// first. The replacement branch only matters if the sort is removed.
    pub fn deduplicate(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
        for candidate in detections {
            let overlapping = kept.iter().position(|k| {
                k.label == candidate.label && iou(&k.bbox, &candidate.bbox) > self.iou_threshold
            });

            match overlapping {
                Some(i) => {
                    if candidate.confidence > kept[i].confidence * DOMINANCE_RATIO {
                        kept[i] = candidate;
                    }
                }
                None => kept.push(candidate),
            }
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DerivedMetrics, Provenance};
    use crate::taxonomy::PestClass;

    fn det(label: PestClass, bbox: [f32; 4], confidence: f32) -> Detection {
        Detection {
            bbox: bbox.into(),
            label,
            confidence,
            metrics: DerivedMetrics {
                aspect_ratio: 3.0,
                contrast: 40.0,
                area_ratio: 0.01,
                edge_density: 0.05,
            },
            provenance: Provenance {
                scale: 1.0,
                size: 640,
            },
        }
    }

    #[test]
    fn test_iou_identity_and_disjoint() {
        let a = BoundingBox::new(3.0, 4.0, 20.0, 9.0);
        assert_eq!(iou(&a, &a), 1.0);

        let b = BoundingBox::new(30.0, 40.0, 50.0, 60.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_of_degenerate_boxes_is_zero() {
        let point = BoundingBox::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(iou(&point, &point), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(1.0, 1.0, 11.0, 11.0);
        // 81 / (100 + 100 - 81)
        assert!((iou(&a, &b) - 81.0 / 119.0).abs() < 1e-6);
    }

    #[test]
    fn test_weaker_overlap_is_discarded() {
        let dedup = Deduplicator::default();
        let out = dedup.deduplicate(vec![
            det(PestClass::Lagarta, [1.0, 1.0, 11.0, 11.0], 0.5),
            det(PestClass::Lagarta, [0.0, 0.0, 10.0, 10.0], 0.9),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.9);
    }

    #[test]
    fn test_dominant_candidate_wins() {
        let dedup = Deduplicator::default();
        let out = dedup.deduplicate(vec![
            det(PestClass::Lagarta, [0.0, 0.0, 10.0, 10.0], 0.5),
            det(PestClass::Lagarta, [1.0, 1.0, 11.0, 11.0], 0.7),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.7);
        assert_eq!(out[0].bbox, BoundingBox::new(1.0, 1.0, 11.0, 11.0));
    }

    #[test]
    fn test_pipeline_threshold_merges_near_identical_boxes() {
        let dedup = Deduplicator::new(0.7);
        let out = dedup.deduplicate(vec![
            det(PestClass::Lagarta, [0.0, 0.0, 10.0, 10.0], 0.9),
            det(PestClass::Lagarta, [0.5, 0.5, 10.5, 10.5], 0.5),
            det(PestClass::Lagarta, [3.0, 3.0, 13.0, 13.0], 0.4),
        ]);
        // 0.82 overlap merges, 0.32 overlap does not
        let confidences: Vec<f32> = out.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.4]);
    }

    #[test]
    fn test_different_labels_never_merge() {
        let dedup = Deduplicator::default();
        let out = dedup.deduplicate(vec![
            det(PestClass::Lagarta, [0.0, 0.0, 10.0, 10.0], 0.9),
            det(PestClass::Broca, [0.0, 0.0, 10.0, 10.0], 0.8),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_output_sorted_by_confidence() {
        let dedup = Deduplicator::default();
        let out = dedup.deduplicate(vec![
            det(PestClass::Lagarta, [0.0, 0.0, 10.0, 10.0], 0.3),
            det(PestClass::Lagarta, [50.0, 50.0, 60.0, 60.0], 0.8),
            det(PestClass::Trips, [0.0, 0.0, 4.0, 4.0], 0.5),
        ]);
        let confidences: Vec<f32> = out.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.8, 0.5, 0.3]);
    }

    #[test]
    fn test_deduplication_is_idempotent() {
        let dedup = Deduplicator::default();
        let input = vec![
            det(PestClass::Lagarta, [0.0, 0.0, 10.0, 10.0], 0.9),
            det(PestClass::Lagarta, [2.0, 0.0, 12.0, 10.0], 0.85),
            det(PestClass::Lagarta, [8.0, 0.0, 18.0, 10.0], 0.7),
            det(PestClass::Lagarta, [40.0, 40.0, 50.0, 52.0], 0.6),
            det(PestClass::Acaro, [1.0, 1.0, 9.0, 9.0], 0.4),
            det(PestClass::Acaro, [1.0, 1.0, 9.5, 9.0], 0.35),
        ];

        let once = dedup.deduplicate(input);
        let twice = dedup.deduplicate(once.clone());
        assert_eq!(once, twice);

        for (i, a) in once.iter().enumerate() {
            for b in &once[i + 1..] {
                assert!(a.label != b.label || iou(&a.bbox, &b.bbox) <= dedup.iou_threshold);
            }
        }
    }
}
