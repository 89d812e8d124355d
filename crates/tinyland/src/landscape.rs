//! Per-frame pipeline: calibrate on request, warp into projector space,
//! track markers.

use image::RgbImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use tinyland_calib::CornerDetector;
use tinyland_core::color::{GREEN, RED, WHITE};
use tinyland_core::{
    retry, warp_perspective, GeometryError, Homography, HomographyPair, Quad, RetryError,
    RetryPolicy, WarpError,
};
use tinyland_tracker::{DetectionSpace, MarkerDetector, MarkerTracker, Snapshot};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{CalibrationState, Config};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("initial calibration is degenerate: {0}")]
    DegenerateSeed(#[source] GeometryError),
    #[error("could not warp the camera frame into projector space: {0}")]
    WarpExhausted(#[from] RetryError<WarpError>),
}

/// Result of processing one camera frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub snapshot: Snapshot,
    /// The camera frame warped into projector space.
    pub image: RgbImage,
    /// The camera frame as captured.
    pub raw: RgbImage,
}

impl Frame {
    /// The raw frame with every marker's camera-space outline and the
    /// calibration quad drawn on it.
    pub fn debug_overlay(&self, calibration: &CalibrationState) -> RgbImage {
        let mut out = self.raw.clone();
        for marker in self.snapshot.markers() {
            let corners = marker.camera_corners();
            draw_quad(&mut out, corners, GREEN);
            let tl = corners.tl();
            draw_filled_rect_mut(
                &mut out,
                Rect::at(tl.x as i32 - 2, tl.y as i32 - 2).of_size(5, 5),
                RED,
            );
        }
        draw_quad(&mut out, calibration.camera_quad(), WHITE);
        out
    }
}

fn draw_quad(img: &mut RgbImage, quad: &Quad, color: image::Rgb<u8>) {
    let pts = quad.points();
    for i in 0..4 {
        let a = pts[i];
        let b = pts[(i + 1) % 4];
        draw_line_segment_mut(
            img,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
    }
}

/// 180-degree rotation of a `width × height` image, pixel centres at
/// integer coordinates.
pub fn flip_homography(width: u32, height: u32) -> Homography {
    Homography::from_array([
        [-1.0, 0.0, width as f64 - 1.0],
        [0.0, -1.0, height as f64 - 1.0],
        [0.0, 0.0, 1.0],
    ])
}

/// Owns the calibration and the tracker; turns camera frames into
/// projector-space frames plus marker snapshots.
pub struct Landscape<D> {
    config: Config,
    calibration: CalibrationState,
    corners: CornerDetector,
    tracker: MarkerTracker<D>,
    homography: HomographyPair,
    retry: RetryPolicy,
}

impl<D: MarkerDetector> Landscape<D> {
    pub fn new(config: Config, detector: D) -> Result<Self, PipelineError> {
        let calibration = CalibrationState::from_config(&config);
        let homography = pair_for(&config, calibration.camera_quad())
            .map_err(PipelineError::DegenerateSeed)?;
        Ok(Self {
            corners: CornerDetector::new(config.corner_detector.clone()),
            tracker: MarkerTracker::new(detector),
            retry: config.warp_retry(),
            calibration,
            homography,
            config,
        })
    }

    /// Replace the warp retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    /// Current camera -> projector maps, flip included.
    pub fn homography(&self) -> &HomographyPair {
        &self.homography
    }

    pub fn tracker_mut(&mut self) -> &mut MarkerTracker<D> {
        &mut self.tracker
    }

    pub fn request_calibration(&mut self) {
        self.calibration.request();
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn process_frame(&mut self, frame: RgbImage) -> Result<Frame, PipelineError> {
        if self.calibration.is_requested() {
            self.try_calibrate(&frame);
        }

        let (width, height) = self.config.projector_size();
        let forward = *self.homography.forward();
        let image = retry(&self.retry, |_| {
            warp_perspective(&frame, &forward, width, height)
        })?;

        let snapshot = if self.config.identify_on_video {
            self.tracker
                .detect(&frame, self.homography.forward(), DetectionSpace::Camera)
        } else {
            self.tracker
                .detect(&image, self.homography.inverse(), DetectionSpace::Output)
        };

        Ok(Frame {
            snapshot,
            image,
            raw: frame,
        })
    }

    /// Adopt `quad` as the camera-space calibration quad.
    ///
    /// A quad that yields no invertible homography is rejected and the
    /// previous calibration, including a pending request, is kept.
    pub fn calibrate_with(&mut self, quad: Quad) -> Result<(), GeometryError> {
        self.homography = pair_for(&self.config, &quad)?;
        self.calibration.commit(quad);
        Ok(())
    }

    fn try_calibrate(&mut self, frame: &RgbImage) {
        let Some(quad) = self.corners.detect(frame) else {
            log::debug!("calibration pending: rings not found");
            return;
        };
        if let Err(err) = self.calibrate_with(quad) {
            log::warn!("calibration rejected, keeping previous: {err}");
        }
    }
}

fn pair_for(config: &Config, camera: &Quad) -> Result<HomographyPair, GeometryError> {
    let pair = HomographyPair::from_quads(camera, &config.projector_quad())?;
    if config.flip_projection {
        let (w, h) = config.projector_size();
        pair.then(&flip_homography(w, h))
    } else {
        Ok(pair)
    }
}
