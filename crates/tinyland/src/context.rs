//! Projector-space drawing commands collected from application code.

use std::path::PathBuf;

use image::Rgb;
use nalgebra::Point2;
use serde::Serialize;
use tinyland_core::color::WHITE;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Rectangle {
        name: String,
        center: Point2<f64>,
        width: f64,
        height: f64,
        /// Degrees, clockwise in image coordinates.
        rotation: f64,
        color: [u8; 3],
    },
    Circle {
        center: Point2<f64>,
        radius: f64,
        color: [u8; 3],
    },
    Text {
        center: Point2<f64>,
        content: String,
        color: [u8; 3],
        size: f64,
    },
    Image {
        path: PathBuf,
        center: Point2<f64>,
        width: u32,
        height: u32,
    },
}

impl Shape {
    pub fn center(&self) -> Point2<f64> {
        match self {
            Shape::Rectangle { center, .. }
            | Shape::Circle { center, .. }
            | Shape::Text { center, .. }
            | Shape::Image { center, .. } => *center,
        }
    }
}

/// Shapes to draw over one projector frame, in order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DrawingContext {
    width: u32,
    height: u32,
    shapes: Vec<Shape>,
}

impl DrawingContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            shapes: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    /// Axis-aligned white rectangle centred on `(x, y)`.
    pub fn rect(&mut self, name: impl Into<String>, x: f64, y: f64, width: f64, height: f64) {
        self.rotated_rect(name, x, y, width, height, 0.0, WHITE);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rotated_rect(
        &mut self,
        name: impl Into<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        rotation: f64,
        color: Rgb<u8>,
    ) {
        self.push(Shape::Rectangle {
            name: name.into(),
            center: Point2::new(x, y),
            width,
            height,
            rotation,
            color: color.0,
        });
    }

    pub fn circle(&mut self, x: f64, y: f64, radius: f64, color: Rgb<u8>) {
        self.push(Shape::Circle {
            center: Point2::new(x, y),
            radius,
            color: color.0,
        });
    }

    pub fn text(&mut self, x: f64, y: f64, content: impl ToString) {
        self.push(Shape::Text {
            center: Point2::new(x, y),
            content: content.to_string(),
            color: WHITE.0,
            size: 2.0,
        });
    }

    pub fn image(&mut self, path: impl Into<PathBuf>, x: f64, y: f64, width: u32, height: u32) {
        self.push(Shape::Image {
            path: path.into(),
            center: Point2::new(x, y),
            width,
            height,
        });
    }
}
