use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use tinyland_core::color::{BLACK, WHITE};

/// Layout of the projected calibration pattern, as fractions of the shorter
/// image side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternParams {
    /// Outer side of each ring.
    pub ring_size: f64,
    /// Ring stroke width as a fraction of `ring_size`.
    pub stroke: f64,
    /// Gap between a ring and the image border.
    pub margin: f64,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            ring_size: 0.16,
            stroke: 0.25,
            margin: 0.05,
        }
    }
}

/// Paint a white square ring with a black hole at `(x, y)`.
pub fn draw_ring(img: &mut RgbImage, x: i32, y: i32, size: u32, thickness: u32) {
    if size == 0 {
        return;
    }
    paint(img, x, y, size, size, WHITE);
    let hole = size.saturating_sub(2 * thickness);
    if hole > 0 {
        let offset = thickness as i32;
        paint(img, x + offset, y + offset, hole, hole, BLACK);
    }
}

fn paint(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(w, h), color);
}

/// The image the projector shows while calibrating: black, with one ring
/// near each corner.
pub fn calibration_pattern(width: u32, height: u32, params: &PatternParams) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, BLACK);
    let short = width.min(height) as f64;
    let size = (short * params.ring_size).round().max(1.0) as u32;
    let thickness = (size as f64 * params.stroke).round().max(1.0) as u32;
    let margin = (short * params.margin).round() as i32;

    let right = width as i32 - margin - size as i32;
    let bottom = height as i32 - margin - size as i32;
    for (x, y) in [(margin, margin), (right, margin), (right, bottom), (margin, bottom)] {
        draw_ring(&mut img, x, y, size, thickness);
    }
    log::debug!("calibration pattern {width}x{height}: ring {size}px, stroke {thickness}px");
    img
}
