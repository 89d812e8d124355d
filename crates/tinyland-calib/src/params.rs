use serde::{Deserialize, Serialize};

/// Tunables of the calibration-ring detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerDetectorParams {
    /// Gray level above which a pixel is foreground.
    pub threshold: u8,
    /// Outer contour squareness must exceed this.
    pub min_outer_squareness: f64,
    /// Inner contour squareness must exceed this.
    pub min_inner_squareness: f64,
    /// Outer/inner area ratio must lie strictly inside `(min, max)`.
    pub min_area_ratio: f64,
    pub max_area_ratio: f64,
    /// Polygon simplification tolerance for the hull, in pixels.
    pub hull_epsilon: f64,
}

impl Default for CornerDetectorParams {
    fn default() -> Self {
        Self {
            threshold: 185,
            min_outer_squareness: 0.75,
            min_inner_squareness: 0.5,
            min_area_ratio: 2.0,
            max_area_ratio: 10.0,
            hull_epsilon: 25.0,
        }
    }
}
