//! Fiducial marker tracking across the camera/projector boundary.
//!
//! A [`MarkerDetector`] reports marker ids and their corners in the frame it
//! was given; [`MarkerTracker`] maps those corners through the current
//! calibration into the opposite space and groups the results into a
//! per-frame [`Snapshot`]. With the `apriltag` feature, [`AprilTagDetector`]
//! decodes tag36h11 markers from pixels.

mod detector;
#[cfg(feature = "apriltag")]
mod tag36h11;
mod tracker;
mod types;

pub use detector::{DetectorError, MarkerDetector, NullDetector, RecordedDetector};
#[cfg(feature = "apriltag")]
pub use tag36h11::AprilTagDetector;
pub use tracker::MarkerTracker;
pub use types::{DetectedMarker, DetectionSpace, Marker, Snapshot};
