/// Failures of the geometric primitives.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// The point configuration or the matrix cannot define a projective map.
    #[error("degenerate transform: {reason}")]
    DegenerateTransform { reason: &'static str },
}

impl GeometryError {
    pub(crate) fn degenerate(reason: &'static str) -> Self {
        Self::DegenerateTransform { reason }
    }
}
