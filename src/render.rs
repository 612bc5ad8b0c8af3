//! Draws accepted detections onto the original image

use crate::detection::Detection;
use crate::error::AnalysisError;
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

const LABEL_FONT_SIZE: f32 = 14.0;
const LABEL_LINE_HEIGHT: i32 = 16;
const LABEL_CHAR_WIDTH: f32 = 7.5;
const LABEL_PADDING: i32 = 3;
const LABEL_BACKGROUND_ALPHA: f32 = 0.6;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub struct Renderer {
    font: Option<FontArc>,
}

impl Renderer {
    /// Renderer without label text; label backgrounds are still drawn
    pub fn without_font() -> Self {
        Self { font: None }
    }

    /// Load the label font from a TTF/OTF file
    pub fn with_font_file(path: &Path) -> Result<Self, AnalysisError> {
        let data = std::fs::read(path).map_err(|e| {
            AnalysisError::RenderError(format!("Failed to read font {}: {}", path.display(), e))
        })?;
        let font = FontArc::try_from_vec(data).map_err(|e| {
            AnalysisError::RenderError(format!("Invalid font {}: {}", path.display(), e))
        })?;
        Ok(Self { font: Some(font) })
    }

    pub fn from_config(font_path: Option<&Path>) -> Result<Self, AnalysisError> {
        match font_path {
            Some(path) => Self::with_font_file(path),
            None => Ok(Self::without_font()),
        }
    }

    /// Draw every detection on a copy of `image`
    pub fn render(
        &self,
        image: &RgbImage,
        detections: &[Detection],
    ) -> Result<RgbImage, AnalysisError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(AnalysisError::RenderError(
                "cannot draw on an empty image".to_string(),
            ));
        }

        let mut canvas = image.clone();
        for detection in detections {
            self.draw_detection(&mut canvas, detection)?;
        }
        Ok(canvas)
    }

    fn draw_detection(
        &self,
        canvas: &mut RgbImage,
        detection: &Detection,
    ) -> Result<(), AnalysisError> {
        let bbox = &detection.bbox;
        if !bbox.is_finite() {
            return Err(AnalysisError::RenderError(format!(
                "non-finite box for {}",
                detection.label
            )));
        }

        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        let x1 = (bbox.x1.floor() as i32).clamp(0, w - 1);
        let y1 = (bbox.y1.floor() as i32).clamp(0, h - 1);
        let x2 = (bbox.x2.ceil() as i32).clamp(0, w - 1);
        let y2 = (bbox.y2.ceil() as i32).clamp(0, h - 1);
        if x2 <= x1 || y2 <= y1 {
            tracing::debug!("Skipping off-canvas box for {}", detection.label);
            return Ok(());
        }

        let color = Rgb(detection.label.color());
        for t in 0..border_thickness(detection.confidence) {
            let (rw, rh) = (x2 - x1 - 2 * t, y2 - y1 - 2 * t);
            if rw <= 0 || rh <= 0 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(rw as u32 + 1, rh as u32 + 1);
            draw_hollow_rect_mut(canvas, rect, color);
        }

        let lines = [
            format!(
                "{} {:.0}%",
                detection.label,
                detection.confidence * 100.0
            ),
            format!(
                "AR {:.1} | Area {:.1}%",
                detection.metrics.aspect_ratio,
                detection.metrics.area_ratio * 100.0
            ),
            format!("Edges {:.3}", detection.metrics.edge_density),
        ];
        self.draw_label(canvas, x1, y1, &lines, color);
        Ok(())
    }

    /// Semi-transparent label block above the box, text on top
    fn draw_label(&self, canvas: &mut RgbImage, x: i32, box_top: i32, lines: &[String], color: Rgb<u8>) {
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let block_w = (longest as f32 * LABEL_CHAR_WIDTH) as i32 + 2 * LABEL_PADDING;
        let block_h = lines.len() as i32 * LABEL_LINE_HEIGHT + 2 * LABEL_PADDING;
        let top = (box_top - block_h).max(0);

        let x_end = (x + block_w).min(canvas.width() as i32);
        let y_end = (top + block_h).min(canvas.height() as i32);
        for py in top..y_end {
            for px in x..x_end {
                let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                for c in 0..3 {
                    let blended = pixel.0[c] as f32 * (1.0 - LABEL_BACKGROUND_ALPHA)
                        + color.0[c] as f32 * LABEL_BACKGROUND_ALPHA;
                    pixel.0[c] = blended.round() as u8;
                }
            }
        }

        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(LABEL_FONT_SIZE);
        for (i, line) in lines.iter().enumerate() {
            let y = top + LABEL_PADDING + i as i32 * LABEL_LINE_HEIGHT;
            draw_text_mut(canvas, TEXT_COLOR, x + LABEL_PADDING, y, scale, font, line);
        }
    }
}

/// Border width in pixels, 1 to 4, growing with confidence
pub fn border_thickness(confidence: f32) -> i32 {
    1 + (confidence.clamp(0.0, 1.0) * 3.0).round() as i32
}
