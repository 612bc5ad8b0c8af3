//! Individual enhancement variants

pub mod clahe;
pub mod color;
pub mod color_mask;
pub mod dark_regions;
pub mod edges;
pub mod normalize;
pub mod threshold;
