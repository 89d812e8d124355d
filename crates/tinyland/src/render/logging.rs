use image::RgbImage;

use super::{RenderError, Renderer};
use crate::{DrawingContext, Shape};

/// Logs every shape instead of drawing it.
#[derive(Clone, Debug)]
pub struct LogRenderer {
    width: u32,
    height: u32,
    frame: u64,
}

impl LogRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: 0,
        }
    }
}

impl Renderer for LogRenderer {
    fn setup(&mut self) -> Result<(), RenderError> {
        log::info!("log renderer, {}x{}", self.width, self.height);
        Ok(())
    }

    fn render(&mut self, ctx: &DrawingContext, _image: &RgbImage) -> Result<(), RenderError> {
        self.frame += 1;
        for shape in ctx.shapes() {
            match shape {
                Shape::Rectangle {
                    name,
                    center,
                    width,
                    height,
                    rotation,
                    ..
                } => log::info!(
                    "frame {}: rectangle {name} at ({}, {}) {width}x{height} rot {rotation}",
                    self.frame,
                    center.x,
                    center.y
                ),
                Shape::Circle { center, radius, .. } => log::info!(
                    "frame {}: circle at ({}, {}) r {radius}",
                    self.frame,
                    center.x,
                    center.y
                ),
                Shape::Text {
                    center, content, ..
                } => log::info!(
                    "frame {}: text {content:?} at ({}, {})",
                    self.frame,
                    center.x,
                    center.y
                ),
                Shape::Image { path, center, .. } => log::info!(
                    "frame {}: image {} at ({}, {})",
                    self.frame,
                    path.display(),
                    center.x,
                    center.y
                ),
            }
        }
        Ok(())
    }

    fn show_calibration_markers(&mut self) -> Result<(), RenderError> {
        log::info!("showing calibration markers");
        Ok(())
    }
}
