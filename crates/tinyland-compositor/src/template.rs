use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use tinyland_core::color::{GREEN, RED, WHITE};
use tinyland_core::Quad;

use crate::CompositorError;

/// One drawing step of a template, in canvas pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Paint {
    /// Flood the whole canvas.
    Fill { color: [u8; 3] },
    /// Filled rectangle.
    Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: [u8; 3],
    },
    /// One-pixel border just inside the canvas edge.
    Outline { color: [u8; 3] },
    Circle {
        x: i32,
        y: i32,
        radius: i32,
        color: [u8; 3],
    },
    /// One-pixel outline of the marker square.
    MarkerOutline { color: [u8; 3] },
}

/// Declarative description of a template, as written in config files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub width: u32,
    pub height: u32,
    /// Side of the marker square, in canvas pixels.
    pub marker_size: u32,
    /// Top-left of the marker square as fractions of the canvas size.
    #[serde(default)]
    pub position: [f64; 2],
    #[serde(default)]
    pub paint: Vec<Paint>,
}

/// A rendered canvas plus where the marker sits on it.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerTemplate {
    canvas: RgbImage,
    marker: Quad,
}

impl MarkerTemplate {
    pub fn new(canvas: RgbImage, marker: Quad) -> Result<Self, CompositorError> {
        if canvas.width() == 0 || canvas.height() == 0 {
            return Err(CompositorError::InvalidTemplate {
                reason: "empty canvas".into(),
            });
        }
        Ok(Self { canvas, marker })
    }

    pub fn from_spec(spec: &TemplateSpec) -> Result<Self, CompositorError> {
        if spec.width == 0 || spec.height == 0 {
            return Err(CompositorError::InvalidTemplate {
                reason: format!("canvas {}x{} is empty", spec.width, spec.height),
            });
        }
        if spec.marker_size == 0 {
            return Err(CompositorError::InvalidTemplate {
                reason: "marker size must be positive".into(),
            });
        }

        Ok(Self::render(spec))
    }

    /// Red square, marker covering the whole canvas. Used for ids without
    /// a template of their own.
    pub fn unknown() -> Self {
        Self::render(&TemplateSpec {
            width: 100,
            height: 100,
            marker_size: 100,
            position: [0.0, 0.0],
            paint: vec![Paint::Fill { color: RED.0 }],
        })
    }

    /// White frame with a green outline around a small marker.
    pub fn rectangle() -> Self {
        Self::render(&TemplateSpec {
            width: 100,
            height: 50,
            marker_size: 25,
            position: [0.25, 0.25],
            paint: vec![
                Paint::Outline { color: WHITE.0 },
                Paint::MarkerOutline { color: GREEN.0 },
            ],
        })
    }

    /// Draw `spec` without validating it.
    fn render(spec: &TemplateSpec) -> Self {
        let [fx, fy] = spec.position;
        let x = (fx * spec.width as f64) as i32;
        let y = (fy * spec.height as f64) as i32;
        let mut canvas = RgbImage::new(spec.width, spec.height);
        for op in &spec.paint {
            apply(&mut canvas, op, (x, y, spec.marker_size));
        }
        let s = spec.marker_size as f64;
        Self {
            canvas,
            marker: Quad::rect(x as f64, y as f64, s, s),
        }
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    /// Marker corners in canvas coordinates, TL, TR, BR, BL.
    pub fn marker(&self) -> &Quad {
        &self.marker
    }
}

fn rect(x: i32, y: i32, w: u32, h: u32) -> Option<Rect> {
    (w > 0 && h > 0).then(|| Rect::at(x, y).of_size(w, h))
}

fn apply(canvas: &mut RgbImage, op: &Paint, (mx, my, ms): (i32, i32, u32)) {
    let (w, h) = canvas.dimensions();
    match *op {
        Paint::Fill { color } => {
            for px in canvas.pixels_mut() {
                *px = Rgb(color);
            }
        }
        Paint::Rect {
            x,
            y,
            width,
            height,
            color,
        } => {
            if let Some(r) = rect(x, y, width, height) {
                draw_filled_rect_mut(canvas, r, Rgb(color));
            }
        }
        Paint::Outline { color } => {
            if let Some(r) = rect(1, 1, w.saturating_sub(1), h.saturating_sub(1)) {
                draw_hollow_rect_mut(canvas, r, Rgb(color));
            }
        }
        Paint::Circle {
            x,
            y,
            radius,
            color,
        } => draw_filled_circle_mut(canvas, (x, y), radius, Rgb(color)),
        Paint::MarkerOutline { color } => {
            // Inclusive of the bottom-right corner.
            if let Some(r) = rect(mx, my, ms + 1, ms + 1) {
                draw_hollow_rect_mut(canvas, r, Rgb(color));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyland_core::color::BLACK;

    #[test]
    fn marker_corners_follow_position_fractions() {
        let t = MarkerTemplate::rectangle();
        assert_eq!(t.canvas().dimensions(), (100, 50));
        assert_eq!(
            t.marker(),
            &Quad::from_array([[25.0, 12.0], [50.0, 12.0], [50.0, 37.0], [25.0, 37.0]])
        );
    }

    #[test]
    fn rectangle_template_draws_frame_and_marker_outline() {
        let t = MarkerTemplate::rectangle();
        let c = t.canvas();
        assert_eq!(*c.get_pixel(1, 1), WHITE);
        assert_eq!(*c.get_pixel(99, 49), WHITE);
        assert_eq!(*c.get_pixel(0, 0), BLACK);
        assert_eq!(*c.get_pixel(25, 12), GREEN);
        assert_eq!(*c.get_pixel(50, 37), GREEN);
        assert_eq!(*c.get_pixel(37, 25), BLACK);
    }

    #[test]
    fn unknown_template_is_solid_red() {
        let t = MarkerTemplate::unknown();
        assert!(t.canvas().pixels().all(|p| *p == RED));
        assert_eq!(t.marker(), &Quad::rect(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn spec_parses_from_toml() {
        let spec: TemplateSpec = toml::from_str(
            r#"
            width = 60
            height = 40
            marker_size = 20
            position = [0.5, 0.25]
            paint = [
                { op = "fill", color = [0, 0, 255] },
                { op = "circle", x = 10, y = 10, radius = 4, color = [255, 255, 0] },
            ]
            "#,
        )
        .unwrap();
        let t = MarkerTemplate::from_spec(&spec).unwrap();
        assert_eq!(t.marker().tl(), Quad::rect(30.0, 10.0, 20.0, 20.0).tl());
        assert_eq!(t.canvas().get_pixel(10, 10).0, [255, 255, 0]);
        assert_eq!(t.canvas().get_pixel(50, 30).0, [0, 0, 255]);
    }

    #[test]
    fn empty_canvas_is_rejected() {
        let spec = TemplateSpec {
            width: 0,
            height: 10,
            marker_size: 5,
            position: [0.0, 0.0],
            paint: Vec::new(),
        };
        assert!(matches!(
            MarkerTemplate::from_spec(&spec),
            Err(CompositorError::InvalidTemplate { .. })
        ));
    }
}
