use crate::error::AnalysisError;
use image::{ImageBuffer, Rgb, RgbImage};

/// Floating point RGB accumulator used while blending variants
pub type RgbF32Image = ImageBuffer<Rgb<f32>, Vec<f32>>;

/// Min-max stretch of all channels to the full 0-255 range
pub fn apply(image: &RgbF32Image) -> Result<RgbImage, AnalysisError> {
    let (min_val, max_val) = find_min_max(image).ok_or_else(|| {
        AnalysisError::PreprocessingError("cannot normalize an empty image".to_string())
    })?;

    // Avoid division by zero
    if max_val <= min_val {
        return Ok(to_u8(image, |v| v));
    }

    let range = max_val - min_val;
    Ok(to_u8(image, |v| (v - min_val) / range * 255.0))
}

fn to_u8(image: &RgbF32Image, f: impl Fn(f32) -> f32) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb(image
            .get_pixel(x, y)
            .0
            .map(|c| f(c).round().clamp(0.0, 255.0) as u8))
    })
}

fn find_min_max(img: &RgbF32Image) -> Option<(f32, f32)> {
    img.as_raw().iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((min, max)) => Some((min.min(v), max.max(v))),
    })
}
