use tinyland_core::{GeometryError, WarpError};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CompositorError {
    #[error("invalid template: {reason}")]
    InvalidTemplate { reason: String },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Warp(#[from] WarpError),
}
