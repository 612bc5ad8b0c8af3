//! Multi-scale pest detection for crop monitoring.
//!
//! An external detector proposes candidate boxes on an enhanced copy of the
//! image at several scales and input sizes. Every candidate is re-scored
//! against the original pixels, filtered by heuristics, merged across passes
//! and drawn onto the original image.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detection;
pub mod detector;
pub mod detectors;
pub mod error;
pub mod preprocessing;
pub mod render;
pub mod server;
pub mod taxonomy;

pub use analysis::{AnalysisConfig, AnalysisResult, Analyzer};
pub use detection::{BoundingBox, Detection, DetectorOutput};
pub use detector::{Detector, DetectorParams};
pub use error::AnalysisError;
pub use taxonomy::PestClass;
