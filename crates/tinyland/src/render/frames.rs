use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point;
use tinyland_calib::{calibration_pattern, PatternParams};

use super::{RenderError, Renderer};
use crate::{DrawingContext, Shape};

/// Rasterizes each frame and writes it as a numbered PNG.
#[derive(Clone, Debug)]
pub struct ImageRenderer {
    width: u32,
    height: u32,
    out_dir: PathBuf,
    pattern: PatternParams,
    frame: u64,
}

impl ImageRenderer {
    pub fn new(width: u32, height: u32, out_dir: impl Into<PathBuf>, pattern: PatternParams) -> Self {
        Self {
            width,
            height,
            out_dir: out_dir.into(),
            pattern,
            frame: 0,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Draw `ctx` over a copy of `image`, resized to the projector when
    /// needed.
    pub fn rasterize(&self, ctx: &DrawingContext, image: &RgbImage) -> RgbImage {
        let mut canvas = if image.dimensions() == (self.width, self.height) {
            image.clone()
        } else {
            imageops::resize(image, self.width, self.height, FilterType::Triangle)
        };
        for shape in ctx.shapes() {
            draw_shape(&mut canvas, shape);
        }
        canvas
    }
}

impl Renderer for ImageRenderer {
    fn setup(&mut self) -> Result<(), RenderError> {
        fs::create_dir_all(&self.out_dir)?;
        log::info!("writing {}x{} frames to {}", self.width, self.height, self.out_dir.display());
        Ok(())
    }

    fn render(&mut self, ctx: &DrawingContext, image: &RgbImage) -> Result<(), RenderError> {
        let canvas = self.rasterize(ctx, image);
        let path = self.out_dir.join(format!("frame_{:06}.png", self.frame));
        canvas.save(&path)?;
        log::debug!("wrote {}", path.display());
        self.frame += 1;
        Ok(())
    }

    fn show_calibration_markers(&mut self) -> Result<(), RenderError> {
        let path = self.out_dir.join("calibration.png");
        calibration_pattern(self.width, self.height, &self.pattern).save(&path)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

fn rotated_corners(cx: f64, cy: f64, w: f64, h: f64, degrees: f64) -> [Point<i32>; 4] {
    let (s, c) = degrees.to_radians().sin_cos();
    let (hw, hh) = (w / 2.0, h / 2.0);
    [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(dx, dy)| {
        Point::new(
            (cx + dx * c - dy * s).round() as i32,
            (cy + dx * s + dy * c).round() as i32,
        )
    })
}

fn draw_shape(canvas: &mut RgbImage, shape: &Shape) {
    match shape {
        Shape::Rectangle {
            center,
            width,
            height,
            rotation,
            color,
            ..
        } => {
            let mut poly = rotated_corners(center.x, center.y, *width, *height, *rotation).to_vec();
            poly.dedup();
            while poly.len() > 1 && poly.first() == poly.last() {
                poly.pop();
            }
            if poly.len() >= 3 {
                draw_polygon_mut(canvas, &poly, Rgb(*color));
            }
        }
        Shape::Circle {
            center,
            radius,
            color,
        } => draw_filled_circle_mut(
            canvas,
            (center.x.round() as i32, center.y.round() as i32),
            radius.round() as i32,
            Rgb(*color),
        ),
        Shape::Text { content, .. } => {
            log::debug!("text {content:?} not rasterized: no font available");
        }
        Shape::Image {
            path,
            center,
            width,
            height,
        } => match image::open(path) {
            Ok(img) if *width > 0 && *height > 0 => {
                let img = imageops::resize(&img.to_rgb8(), *width, *height, FilterType::Triangle);
                let x = (center.x - *width as f64 / 2.0).round() as i64;
                let y = (center.y - *height as f64 / 2.0).round() as i64;
                imageops::overlay(canvas, &img, x, y);
            }
            Ok(_) => {}
            Err(err) => log::warn!("cannot draw image {}: {err}", path.display()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyland_core::color::{BLACK, RED, WHITE};

    #[test]
    fn rectangles_and_circles_are_rasterized() {
        let r = ImageRenderer::new(100, 80, "unused", PatternParams::default());
        let mut ctx = DrawingContext::new(100, 80);
        ctx.rect("a", 20.0, 20.0, 10.0, 10.0);
        ctx.circle(70.0, 50.0, 5.0, RED);
        let out = r.rasterize(&ctx, &RgbImage::new(100, 80));
        assert_eq!(*out.get_pixel(20, 20), WHITE);
        assert_eq!(*out.get_pixel(70, 50), RED);
        assert_eq!(*out.get_pixel(50, 40), BLACK);
    }

    #[test]
    fn rotated_rectangle_corners() {
        let c = rotated_corners(0.0, 0.0, 20.0, 10.0, 90.0);
        assert_eq!(c[0], Point::new(5, -10));
        assert_eq!(c[2], Point::new(-5, 10));
    }

    #[test]
    fn frames_and_pattern_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frames");
        let mut r = ImageRenderer::new(40, 30, &out, PatternParams::default());
        r.setup().unwrap();
        r.render(&DrawingContext::new(40, 30), &RgbImage::new(40, 30)).unwrap();
        r.render(&DrawingContext::new(40, 30), &RgbImage::new(20, 15)).unwrap();
        r.show_calibration_markers().unwrap();

        assert!(out.join("frame_000000.png").is_file());
        let second = image::open(out.join("frame_000001.png")).unwrap();
        assert_eq!((second.width(), second.height()), (40, 30));
        assert!(out.join("calibration.png").is_file());
    }
}
