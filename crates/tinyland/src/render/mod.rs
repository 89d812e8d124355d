//! Output backends for projector frames and drawing commands.

mod frames;
mod logging;
mod osc;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::{Config, DrawingContext};

pub use frames::ImageRenderer;
pub use logging::LogRenderer;
pub use osc::{encode_message, rectangle_address, OscRenderer};

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("osc encoding failed: {0}")]
    Osc(String),
    #[error("renderer used before setup")]
    NotSetUp,
}

/// A sink for projector frames.
pub trait Renderer {
    /// Acquire resources. Called once before the first frame.
    fn setup(&mut self) -> Result<(), RenderError>;

    /// Present `image` with the shapes of `ctx` on top.
    fn render(&mut self, ctx: &DrawingContext, image: &RgbImage) -> Result<(), RenderError>;

    /// Present the calibration pattern instead of a frame.
    fn show_calibration_markers(&mut self) -> Result<(), RenderError>;

    fn toggle_fullscreen(&mut self) {}
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn setup(&mut self) -> Result<(), RenderError> {
        (**self).setup()
    }

    fn render(&mut self, ctx: &DrawingContext, image: &RgbImage) -> Result<(), RenderError> {
        (**self).render(ctx, image)
    }

    fn show_calibration_markers(&mut self) -> Result<(), RenderError> {
        (**self).show_calibration_markers()
    }

    fn toggle_fullscreen(&mut self) {
        (**self).toggle_fullscreen()
    }
}

/// Backend selected by the `RENDERER` config key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RendererKind {
    /// PNG frames written to `OUTPUT_PATH`.
    #[default]
    Image,
    /// Shapes logged at info level.
    Log,
    /// One OSC message per rectangle, sent over UDP to `OSC_ADDRESS`.
    Osc,
}

impl RendererKind {
    pub fn build(self, config: &Config) -> Box<dyn Renderer> {
        let (width, height) = config.projector_size();
        match self {
            RendererKind::Image => Box::new(ImageRenderer::new(
                width,
                height,
                config.output_path.clone(),
                config.calibration_pattern.clone(),
            )),
            RendererKind::Log => Box::new(LogRenderer::new(width, height)),
            RendererKind::Osc => Box::new(OscRenderer::new(config.osc_address.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        renderer: RendererKind,
    }

    #[test]
    fn kind_names_are_upper_case() {
        let w: Wrapper = toml::from_str("renderer = \"LOG\"").unwrap();
        assert_eq!(w.renderer, RendererKind::Log);
        assert!(toml::from_str::<Wrapper>("renderer = \"CV2\"").is_err());
    }

    #[test]
    fn log_renderer_accepts_frames() {
        let cfg = Config::new(8, 6);
        let mut r = RendererKind::Log.build(&cfg);
        r.setup().unwrap();
        let mut ctx = DrawingContext::new(8, 6);
        ctx.rect("r", 1.0, 1.0, 2.0, 2.0);
        r.render(&ctx, &RgbImage::new(8, 6)).unwrap();
        r.show_calibration_markers().unwrap();
        r.toggle_fullscreen();
    }
}
