use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::DetectedMarker;

/// Source of raw marker detections for a frame.
///
/// Implementations decode fiducials however they like; the tracker only
/// needs ids and TL, TR, BR, BL corners in the frame's own coordinates.
pub trait MarkerDetector {
    fn detect(&mut self, frame: &RgbImage) -> Vec<DetectedMarker>;
}

impl<D: MarkerDetector + ?Sized> MarkerDetector for Box<D> {
    fn detect(&mut self, frame: &RgbImage) -> Vec<DetectedMarker> {
        (**self).detect(frame)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    #[error("failed to read detections from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid detections file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("apriltag detector setup failed: {0}")]
    AprilTag(String),
}

/// Reports no markers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDetector;

impl MarkerDetector for NullDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Vec<DetectedMarker> {
        Vec::new()
    }
}

/// Replays pre-recorded detections, one entry per frame, looping at the end.
///
/// The JSON layout is an array of frames, each an array of
/// `{"id": 4, "corners": [[x, y], [x, y], [x, y], [x, y]]}`.
#[derive(Clone, Debug, Default)]
pub struct RecordedDetector {
    frames: Vec<Vec<DetectedMarker>>,
    cursor: usize,
}

impl RecordedDetector {
    pub fn new(frames: Vec<Vec<DetectedMarker>>) -> Self {
        Self { frames, cursor: 0 }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json).map(Self::new)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DetectorError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DetectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let frames: Vec<Vec<DetectedMarker>> = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| DetectorError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!(
            "loaded {} recorded detection frames from {}",
            frames.len(),
            path.display()
        );
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl MarkerDetector for RecordedDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Vec<DetectedMarker> {
        if self.frames.is_empty() {
            return Vec::new();
        }
        let out = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        if self.cursor == 0 {
            log::debug!("recorded detections: rewinding");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RECORDING: &str = r#"[
        [{"id": 4, "corners": [[0, 0], [10, 0], [10, 10], [0, 10]]}],
        [],
        [{"id": 1, "corners": [[5, 5], [15, 5], [15, 15], [5, 15]]},
         {"id": 4, "corners": [[1, 1], [11, 1], [11, 11], [1, 11]]}]
    ]"#;

    fn ids(found: &[DetectedMarker]) -> Vec<u32> {
        found.iter().map(|m| m.id).collect()
    }

    #[test]
    fn recorded_detector_loops() {
        let mut det = RecordedDetector::from_json_str(RECORDING).unwrap();
        let frame = RgbImage::new(1, 1);
        assert_eq!(det.len(), 3);
        assert_eq!(ids(&det.detect(&frame)), vec![4]);
        assert!(det.detect(&frame).is_empty());
        assert_eq!(ids(&det.detect(&frame)), vec![1, 4]);
        assert_eq!(ids(&det.detect(&frame)), vec![4]);
    }

    #[test]
    fn corners_keep_their_order() {
        let mut det = RecordedDetector::from_json_str(RECORDING).unwrap();
        let m = det.detect(&RgbImage::new(1, 1))[0];
        assert_eq!(m.corners.tr().x, 10.0);
        assert_eq!(m.corners.bl().y, 10.0);
    }

    #[test]
    fn empty_recording_reports_nothing() {
        let mut det = RecordedDetector::new(Vec::new());
        assert!(det.detect(&RgbImage::new(1, 1)).is_empty());
        assert!(NullDetector.detect(&RgbImage::new(1, 1)).is_empty());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RECORDING.as_bytes()).unwrap();
        let det = RecordedDetector::from_path(file.path()).unwrap();
        assert_eq!(det.len(), 3);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[{\"id\": 1}]]").unwrap();
        let err = RecordedDetector::from_path(file.path()).unwrap_err();
        assert!(matches!(err, DetectorError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RecordedDetector::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, DetectorError::Io { .. }));
    }
}
