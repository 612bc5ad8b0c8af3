//! Image enhancement for small and camouflaged pests
//!
//! Blends several cheap image-processing signals into one raster that the
//! detector sees instead of the raw photo.

pub mod pipeline;
pub mod steps;

pub use pipeline::{EnhancementResult, Enhancer, Preset, StepTiming};
