use crate::error::AnalysisError;
use image::{GrayImage, Luma, RgbImage};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use super::color::gray_to_rgb;

/// Horizontal gradients dominate to favor elongated horizontal bodies
const HORIZONTAL_WEIGHT: f32 = 0.7;
const VERTICAL_WEIGHT: f32 = 0.3;

/// Weighted Sobel magnitude
pub fn apply(image: &RgbImage) -> Result<RgbImage, AnalysisError> {
    let gray = image::imageops::grayscale(image);
    let gx = horizontal_sobel(&gray);
    let gy = vertical_sobel(&gray);

    let combined = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let h = saturate_abs(gx.get_pixel(x, y).0[0]);
        let v = saturate_abs(gy.get_pixel(x, y).0[0]);
        let value = HORIZONTAL_WEIGHT * h + VERTICAL_WEIGHT * v;
        Luma([value.round().min(255.0) as u8])
    });

    Ok(gray_to_rgb(&combined))
}

fn saturate_abs(v: i16) -> f32 {
    (v as i32).abs().min(255) as f32
}
