//! Marker-image compositor.
//!
//! Each marker id owns a [`MarkerTemplate`]: a small canvas with the marker's
//! own square drawn somewhere on it. [`Compositor::render`] fits the template
//! so that its square lands on a tracked marker's quadrilateral, and
//! [`composite`] stacks the results over a base image.

mod compositor;
mod error;
mod template;

pub use compositor::{composite, composite_in_place, Compositor};
pub use error::CompositorError;
pub use template::{MarkerTemplate, Paint, TemplateSpec};
