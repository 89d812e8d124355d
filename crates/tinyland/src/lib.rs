//! Projector-camera calibration and fiducial marker tracking.
//!
//! A camera watches a surface a projector draws on. This crate keeps the two
//! in register and tells application code where the markers on the surface
//! are, in projector pixels.
//!
//! - [`Landscape`] runs the per-frame pipeline: calibrate when asked, warp
//!   the camera frame into projector space, track markers.
//! - [`run`] drives a [`FrameSource`], a [`Landscape`], an [`App`] and a
//!   [`Renderer`] until stopped.
//!
//! ## Quickstart
//!
//! ```no_run
//! use tinyland::tracker::NullDetector;
//! use tinyland::{Config, ImageSequence, Landscape};
//! use tinyland::source::FrameSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_path("config.toml")?;
//! let mut frames = ImageSequence::open("frames/")?;
//! let mut landscape = Landscape::new(config, NullDetector)?;
//!
//! let frame = landscape.process_frame(frames.next_frame()?)?;
//! for marker in frame.snapshot.markers() {
//!     println!("marker {} at {:?}", marker.id, marker.center);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `tinyland::core`: points, quads, homographies, warping, logging.
//! - `tinyland::calib`: calibration-ring detection and the projected pattern.
//! - `tinyland::tracker`: marker detectors, per-frame snapshots.
//! - `tinyland::compositor`: per-marker template images.

pub use tinyland_calib as calib;
pub use tinyland_compositor as compositor;
pub use tinyland_core as core;
pub use tinyland_tracker as tracker;

pub mod app;
mod calibration;
pub mod config;
pub mod context;
pub mod landscape;
pub mod render;
pub mod source;

pub use app::{install_stop_handler, run, App, MarkerApp, RunError, RunOptions, RunStats};
pub use calibration::CalibrationState;
pub use config::{Config, ConfigError};
pub use context::{DrawingContext, Shape};
pub use landscape::{flip_homography, Frame, Landscape, PipelineError};
pub use render::{RenderError, Renderer, RendererKind};
pub use source::{FrameLoop, FrameSource, ImageSequence, SourceError};

pub use tinyland_core::{Homography, HomographyPair, Quad};
pub use tinyland_tracker::{Marker, Snapshot};
