use image::RgbImage;
use tinyland_core::Homography;

use crate::{DetectedMarker, DetectionSpace, Marker, MarkerDetector, Snapshot};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Runs a [`MarkerDetector`] and maps its detections into the other space.
#[derive(Debug)]
pub struct MarkerTracker<D> {
    detector: D,
}

impl<D: MarkerDetector> MarkerTracker<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Detect markers in `frame` and map them through `h`.
    ///
    /// Pass the forward map when `frame` is a camera frame and the inverse
    /// map when it is already in projector space.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame, h))
    )]
    pub fn detect(&mut self, frame: &RgbImage, h: &Homography, space: DetectionSpace) -> Snapshot {
        let detections = self.detector.detect(frame);
        let snapshot = map_detections(&detections, h, space);
        log::debug!(
            "tracked {} of {} markers ({} ids)",
            snapshot.len(),
            detections.len(),
            snapshot.ids().count()
        );
        snapshot
    }
}

/// Build a snapshot from raw detections.
///
/// A marker with a corner that maps to infinity is dropped; the rest of
/// the frame is unaffected.
pub(crate) fn map_detections(
    detections: &[DetectedMarker],
    h: &Homography,
    space: DetectionSpace,
) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for det in detections {
        match h.apply_quad(&det.corners) {
            Ok(mapped) => snapshot.push(Marker::new(det.id, det.corners, mapped, space)),
            Err(err) => log::warn!("dropping marker {}: {err}", det.id),
        }
    }
    snapshot
}
