//! Calibration-target detector.
//!
//! The projector shows four white square rings, one near each corner of its
//! image (see [`calibration_pattern`]). This crate finds them in a camera
//! frame and returns the camera-side calibration quadrilateral.
//!
//! Algorithm:
//! 1. Grayscale + binary threshold.
//! 2. Contours with parent/child hierarchy.
//! 3. Keep "rings": a contour with exactly one child that has no children,
//!    both square enough, with a plausible outer/inner area ratio.
//! 4. Exactly four rings are required.
//! 5. Convex hull of the rings' points, simplified to a polygon; exactly four
//!    vertices are required.
//! 6. Vertices are ordered TL, TR, BR, BL by the frame's midlines.
//!
//! Step 6 assumes a roughly axis-aligned setup that straddles both midlines.
//! Rotated or off-centre setups are rejected, not reordered.
//!
//! ```
//! use tinyland_calib::{calibration_pattern, CornerDetector, CornerDetectorParams, PatternParams};
//!
//! let frame = calibration_pattern(400, 300, &PatternParams::default());
//! let quad = CornerDetector::new(CornerDetectorParams::default()).detect(&frame);
//! assert!(quad.is_some());
//! ```

mod detector;
mod params;
mod pattern;
mod rings;

pub use detector::{find_calibration_corners, order_by_quadrant, CornerDetector};
pub use params::CornerDetectorParams;
pub use pattern::{calibration_pattern, draw_ring, PatternParams};
pub use rings::{find_rings, squareness, RingCandidate};
