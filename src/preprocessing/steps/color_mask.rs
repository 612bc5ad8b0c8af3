use crate::error::AnalysisError;
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use super::color::{gray_to_rgb, rgb_to_hsv};

/// Hue bands (inclusive) typical of pest bodies
const BROWN_HUE: (f32, f32) = (10.0, 30.0);
const GREEN_HUE: (f32, f32) = (35.0, 85.0);
const MIN_SATURATION: f32 = 50.0;
const MIN_VALUE: f32 = 50.0;
const DILATE_RADIUS: u8 = 2;

/// Binary mask of brown and green pixels, grown by two 3x3 dilations
pub fn apply(image: &RgbImage) -> Result<RgbImage, AnalysisError> {
    let mask = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let (h, s, v) = rgb_to_hsv(*image.get_pixel(x, y));
        let in_band = |(lo, hi): (f32, f32)| h >= lo && h <= hi;
        if s >= MIN_SATURATION && v >= MIN_VALUE && (in_band(BROWN_HUE) || in_band(GREEN_HUE)) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    Ok(gray_to_rgb(&dilate(&mask, Norm::LInf, DILATE_RADIUS)))
}
