use tinyland_core::Quad;

use crate::Config;

/// Mutable calibration state: which camera quad maps onto the projector
/// quad, and whether a new calibration has been asked for.
///
/// A request stays raised until a detection succeeds and is committed.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationState {
    camera: Quad,
    projector: Quad,
    requested: bool,
}

impl CalibrationState {
    pub fn new(camera: Quad, projector: Quad) -> Self {
        Self {
            camera,
            projector,
            requested: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut state = Self::new(config.camera_quad(), config.projector_quad());
        state.requested = config.calibrate;
        state
    }

    pub fn request(&mut self) {
        if !self.requested {
            log::info!("calibration requested");
        }
        self.requested = true;
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Adopt a freshly detected camera quad and clear the request.
    pub fn commit(&mut self, camera: Quad) {
        log::info!("calibration committed: {:?}", camera.points());
        self.camera = camera;
        self.requested = false;
    }

    pub fn camera_quad(&self) -> &Quad {
        &self.camera
    }

    pub fn projector_quad(&self) -> &Quad {
        &self.projector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_then_commit() {
        let mut cfg = Config::new(40, 30);
        cfg.calibrate = true;
        let mut state = CalibrationState::from_config(&cfg);
        assert!(state.is_requested());
        assert_eq!(state.camera_quad(), state.projector_quad());

        let found = Quad::rect(2.0, 2.0, 30.0, 20.0);
        state.commit(found);
        assert!(!state.is_requested());
        assert_eq!(state.camera_quad(), &found);
        assert_eq!(state.projector_quad(), &Quad::rect(0.0, 0.0, 40.0, 30.0));

        state.request();
        state.request();
        assert!(state.is_requested());
    }
}
