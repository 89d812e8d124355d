//! Core types and utilities for projector-camera calibration.
//!
//! This crate is intentionally small and purely geometric: points and
//! quadrilaterals, homography estimation and application, perspective
//! resampling of RGB frames, and the retry helper wrapped around the warp.
//! It does *not* know about calibration targets, fiducial markers or
//! renderers.

pub mod color;
mod error;
mod geometry;
mod homography;
mod logger;
mod ransac;
mod raster;
mod retry;
mod warp;

pub use error::GeometryError;
pub use geometry::{all_collinear, any_three_collinear, polygon_area, Quad};
pub use homography::{
    estimate_homography, estimate_homography_with, homography_from_4pt, Homography,
    HomographyPair, RansacParams,
};
pub use ransac::{ransac, Estimator, RansacOptions, RansacResult};
pub use raster::{sample_bilinear_rgb, to_binary};
pub use retry::{retry, RetryError, RetryPolicy};
pub use warp::{warp_perspective, WarpError};

pub use nalgebra::Point2;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_logging, LogSpec, LogSpecError};
