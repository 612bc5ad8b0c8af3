use crate::error::AnalysisError;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use super::color::luminance_channel;

/// Luminance below which a pixel counts as dark
const DARK_LUMINANCE: u8 = 100;
/// Two iterations of a 3x3 dilation
const DILATE_RADIUS: u8 = 2;
const GAIN: f32 = 1.5;

/// Amplify pixels that fall inside (slightly grown) dark regions
pub fn apply(image: &RgbImage) -> Result<RgbImage, AnalysisError> {
    let mask = dark_mask(image);

    Ok(RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = *image.get_pixel(x, y);
        if mask.get_pixel(x, y).0[0] > 0 {
            Rgb(pixel.0.map(|c| (c as f32 * GAIN).min(255.0) as u8))
        } else {
            pixel
        }
    }))
}

fn dark_mask(image: &RgbImage) -> GrayImage {
    let luminance = luminance_channel(image);
    let mask = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if luminance.get_pixel(x, y).0[0] < DARK_LUMINANCE {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    dilate(&mask, Norm::LInf, DILATE_RADIUS)
}
