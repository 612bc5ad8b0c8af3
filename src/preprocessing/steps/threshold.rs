use crate::error::AnalysisError;
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};

use super::color::gray_to_rgb;

/// Adaptive mean threshold parameters
const WINDOW_SIZE: u32 = 21;
const C: f32 = 2.0;

/// Binary segmentation mask: inverted adaptive threshold cleaned up with a
/// 3x3 close followed by a 3x3 open
pub fn apply(image: &RgbImage) -> Result<RgbImage, AnalysisError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(AnalysisError::PreprocessingError(
            "cannot segment an empty image".to_string(),
        ));
    }

    let gray = image::imageops::grayscale(image);
    let binary = adaptive_threshold_inv(&gray, WINDOW_SIZE, C);
    let cleaned = open(&close(&binary, Norm::LInf, 1), Norm::LInf, 1);
    Ok(gray_to_rgb(&cleaned))
}

/// Inverted adaptive mean thresholding
///
/// A pixel becomes foreground (255) when it is not brighter than the mean of
/// its window minus `c`, i.e. locally dark structure is kept.
pub fn adaptive_threshold_inv(img: &GrayImage, window_size: u32, c: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let half_window = window_size as i32 / 2;

    let integral = compute_integral_image(img);

    GrayImage::from_fn(width, height, |x, y| {
        let x1 = (x as i32 - half_window).max(0) as u32;
        let y1 = (y as i32 - half_window).max(0) as u32;
        let x2 = (x as i32 + half_window).min(width as i32 - 1) as u32;
        let y2 = (y as i32 + half_window).min(height as i32 - 1) as u32;

        let threshold = window_mean(&integral, x1, y1, x2, y2) - c;

        let pixel = img.get_pixel(x, y).0[0] as f32;
        if pixel > threshold {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    })
}

/// Compute integral image
fn compute_integral_image(img: &GrayImage) -> Vec<Vec<f64>> {
    let (width, height) = img.dimensions();
    let mut integral = vec![vec![0.0f64; width as usize + 1]; height as usize + 1];

    for y in 0..height as usize {
        for x in 0..width as usize {
            let val = img.get_pixel(x as u32, y as u32).0[0] as f64;
            integral[y + 1][x + 1] =
                val + integral[y][x + 1] + integral[y + 1][x] - integral[y][x];
        }
    }

    integral
}

/// Mean of an inclusive window using the integral image
fn window_mean(integral: &[Vec<f64>], x1: u32, y1: u32, x2: u32, y2: u32) -> f32 {
    let (x1, y1, x2, y2) = (x1 as usize, y1 as usize, x2 as usize + 1, y2 as usize + 1);
    let area = ((x2 - x1) * (y2 - y1)) as f64;
    let sum = integral[y2][x2] - integral[y1][x2] - integral[y2][x1] + integral[y1][x1];
    (sum / area) as f32
}
