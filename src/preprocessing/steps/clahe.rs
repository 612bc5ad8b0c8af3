use crate::error::AnalysisError;
use image::{GrayImage, Luma, RgbImage};

use super::color::gray_to_rgb;

const CLIP_LIMIT: f32 = 3.0;
const TILE_GRID: u32 = 8;

/// Contrast-limited adaptive histogram equalization of the grayscale image
pub fn apply(image: &RgbImage) -> Result<RgbImage, AnalysisError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(AnalysisError::PreprocessingError(
            "cannot equalize an empty image".to_string(),
        ));
    }

    let gray = image::imageops::grayscale(image);
    let equalized = clahe(&gray, CLIP_LIMIT, TILE_GRID);
    Ok(gray_to_rgb(&equalized))
}

/// Tile layout along one axis: `count` tiles covering `len` pixels
struct Axis {
    len: u32,
    count: u32,
}

impl Axis {
    fn new(len: u32, grid: u32) -> Self {
        Self {
            len,
            count: grid.min(len).max(1),
        }
    }

    fn bounds(&self, tile: u32) -> (u32, u32) {
        (tile * self.len / self.count, (tile + 1) * self.len / self.count)
    }

    /// Neighbouring tiles and interpolation weight for pixel coordinate `p`
    fn locate(&self, p: u32) -> (usize, usize, f32) {
        let tile_size = self.len as f32 / self.count as f32;
        let pos = (p as f32 + 0.5) / tile_size - 0.5;
        let last = (self.count - 1) as f32;
        let t0 = pos.floor().clamp(0.0, last);
        let t1 = (t0 + 1.0).min(last);
        let weight = (pos - t0).clamp(0.0, 1.0);
        (t0 as usize, t1 as usize, weight)
    }
}

pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let xs = Axis::new(width, grid);
    let ys = Axis::new(height, grid);

    // One lookup table per tile
    let mut luts = vec![[0u8; 256]; (xs.count * ys.count) as usize];
    for ty in 0..ys.count {
        for tx in 0..xs.count {
            let (x0, x1) = xs.bounds(tx);
            let (y0, y1) = ys.bounds(ty);
            luts[(ty * xs.count + tx) as usize] = tile_lut(gray, x0, x1, y0, y1, clip_limit);
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y).0[0] as usize;
        let (tx0, tx1, ax) = xs.locate(x);
        let (ty0, ty1, ay) = ys.locate(y);
        let row = xs.count as usize;

        let top = luts[ty0 * row + tx0][v] as f32 * (1.0 - ax) + luts[ty0 * row + tx1][v] as f32 * ax;
        let bottom =
            luts[ty1 * row + tx0][v] as f32 * (1.0 - ax) + luts[ty1 * row + tx1][v] as f32 * ax;
        let value = top * (1.0 - ay) + bottom * ay;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Clipped, redistributed cumulative histogram of one tile
fn tile_lut(gray: &GrayImage, x0: u32, x1: u32, y0: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }

    let area = ((x1 - x0) * (y1 - y0)).max(1);
    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for bin in hist.iter_mut() {
        *bin += share;
    }
    if remainder > 0 {
        let step = (256 / remainder).max(1);
        for i in (0..256).step_by(step).take(remainder) {
            hist[i] += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut sum = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        sum += bin;
        lut[i] = (sum as f32 * scale).round().min(255.0) as u8;
    }
    lut
}
