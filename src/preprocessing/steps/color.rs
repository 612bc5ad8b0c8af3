//! Color space conversions on 8-bit rasters
//!
//! Hue is expressed in [0, 180), saturation and value in [0, 255]; luminance
//! is CIE L* rescaled to [0, 255].

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Convert one RGB pixel to (hue, saturation, value)
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = pixel.0.map(|c| c as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let h_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };

    (h_deg / 2.0, s, v)
}

fn srgb_to_linear(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// CIE L* of one RGB pixel, scaled to [0, 255]
pub fn luminance(pixel: Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0.map(srgb_to_linear);
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let f = if y > 0.008_856 {
        y.cbrt()
    } else {
        7.787 * y + 16.0 / 116.0
    };
    let l = 116.0 * f - 16.0;
    (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8
}

/// Luminance channel of an RGB raster
pub fn luminance_channel(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([luminance(*image.get_pixel(x, y))])
    })
}

/// Replicate a single-channel raster into three identical channels
pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}
