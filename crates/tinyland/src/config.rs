//! Application configuration, loaded once from TOML.
//!
//! Keys keep their historical upper-case spelling:
//!
//! ```toml
//! PROJECTOR_WIDTH = 1280
//! PROJECTOR_HEIGHT = 720
//! DEST_CORNERS = [[0, 0], [1280, 0], [1280, 720], [0, 720]]
//! SRC_CORNERS = [[102, 64], [1180, 70], [1172, 690], [98, 680]]
//! IDENTIFY_ON_VIDEO = false
//! FLIP_PROJECTION = false
//! RENDERER = "IMAGE"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tinyland_calib::{CornerDetectorParams, PatternParams};
use tinyland_compositor::{CompositorError, MarkerTemplate, TemplateSpec};
use tinyland_core::{GeometryError, HomographyPair, Quad, RetryPolicy};

use crate::render::RendererKind;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("projector size {width}x{height} must be positive")]
    EmptyProjector { width: u32, height: u32 },
    #[error("{key} contains a non-finite coordinate")]
    NonFiniteCorner { key: &'static str },
    #[error("SRC_CORNERS -> DEST_CORNERS is not a usable calibration: {0}")]
    DegenerateCorners(#[source] GeometryError),
    #[error("template key {0:?} is not a marker id")]
    TemplateId(String),
    #[error("template for marker {id}: {source}")]
    Template {
        id: u32,
        #[source]
        source: CompositorError,
    },
}

fn default_output_path() -> PathBuf {
    PathBuf::from("frames")
}

fn default_osc_address() -> String {
    "127.0.0.1:20001".to_string()
}

fn default_warp_attempts() -> u32 {
    5
}

fn default_warp_backoff_ms() -> u64 {
    1000
}

/// Immutable process configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub projector_width: u32,
    pub projector_height: u32,
    /// Projector-side calibration corners; defaults to the full projector
    /// image.
    #[serde(default)]
    pub dest_corners: Option<[[f64; 2]; 4]>,
    /// Camera-side calibration corners used until a calibration succeeds;
    /// defaults to `DEST_CORNERS`.
    #[serde(default)]
    pub src_corners: Option<[[f64; 2]; 4]>,
    /// Detect markers on the raw camera frame instead of the warped image.
    #[serde(default)]
    pub identify_on_video: bool,
    /// Request a calibration on the first frame.
    #[serde(default)]
    pub calibrate: bool,
    /// Rotate the projector image by 180 degrees.
    #[serde(default)]
    pub flip_projection: bool,
    #[serde(default)]
    pub renderer: RendererKind,
    /// Image file or directory of frames played in a loop.
    #[serde(default)]
    pub video_file_path: Option<PathBuf>,
    /// Recorded marker detections replayed alongside the frames.
    #[serde(default)]
    pub detections_path: Option<PathBuf>,
    /// Where the IMAGE renderer writes its frames.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default = "default_osc_address")]
    pub osc_address: String,
    #[serde(default = "default_warp_attempts")]
    pub warp_attempts: u32,
    #[serde(default = "default_warp_backoff_ms")]
    pub warp_backoff_ms: u64,
    #[serde(default)]
    pub corner_detector: CornerDetectorParams,
    #[serde(default)]
    pub calibration_pattern: PatternParams,
    /// Marker id (as a string key) to template.
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateSpec>,
}

impl Config {
    /// Config for a `width × height` projector with every option at its
    /// default.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            projector_width: width,
            projector_height: height,
            dest_corners: None,
            src_corners: None,
            identify_on_video: false,
            calibrate: false,
            flip_projection: false,
            renderer: RendererKind::default(),
            video_file_path: None,
            detections_path: None,
            output_path: default_output_path(),
            osc_address: default_osc_address(),
            warp_attempts: default_warp_attempts(),
            warp_backoff_ms: default_warp_backoff_ms(),
            corner_detector: CornerDetectorParams::default(),
            calibration_pattern: PatternParams::default(),
            templates: BTreeMap::new(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&raw)?;
        log::info!("loaded config from {}", path.display());
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.projector_width == 0 || self.projector_height == 0 {
            return Err(ConfigError::EmptyProjector {
                width: self.projector_width,
                height: self.projector_height,
            });
        }
        for (key, corners) in [
            ("DEST_CORNERS", self.dest_corners),
            ("SRC_CORNERS", self.src_corners),
        ] {
            if corners.is_some_and(|c| c.iter().flatten().any(|v| !v.is_finite())) {
                return Err(ConfigError::NonFiniteCorner { key });
            }
        }
        HomographyPair::from_quads(&self.camera_quad(), &self.projector_quad())
            .map_err(ConfigError::DegenerateCorners)?;
        self.marker_templates()?;
        Ok(())
    }

    pub fn projector_size(&self) -> (u32, u32) {
        (self.projector_width, self.projector_height)
    }

    pub fn projector_quad(&self) -> Quad {
        match self.dest_corners {
            Some(c) => Quad::from_array(c),
            None => Quad::rect(
                0.0,
                0.0,
                self.projector_width as f64,
                self.projector_height as f64,
            ),
        }
    }

    pub fn camera_quad(&self) -> Quad {
        self.src_corners
            .map(Quad::from_array)
            .unwrap_or_else(|| self.projector_quad())
    }

    pub fn warp_retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.warp_attempts,
            backoff: Duration::from_millis(self.warp_backoff_ms),
        }
    }

    /// Render the configured templates.
    pub fn marker_templates(&self) -> Result<BTreeMap<u32, MarkerTemplate>, ConfigError> {
        self.templates
            .iter()
            .map(|(key, spec)| {
                let id: u32 = key
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::TemplateId(key.clone()))?;
                let template = MarkerTemplate::from_spec(spec)
                    .map_err(|source| ConfigError::Template { id, source })?;
                Ok((id, template))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyland_core::Point2;

    const SAMPLE: &str = r#"
        PROJECTOR_WIDTH = 400
        PROJECTOR_HEIGHT = 300
        DEST_CORNERS = [[0, 0], [400, 0], [400, 300], [0, 300]]
        SRC_CORNERS = [[50, 40], [350, 40], [350, 260], [50, 260]]
        IDENTIFY_ON_VIDEO = true
        FLIP_PROJECTION = true
        RENDERER = "OSC"
        USE_CAMERA = false

        [CORNER_DETECTOR]
        threshold = 150

        [TEMPLATES.4]
        width = 150
        height = 150
        marker_size = 150
        paint = [{ op = "fill", color = [255, 255, 255] }]
    "#;

    #[test]
    fn parses_upper_case_keys() {
        let cfg = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.projector_size(), (400, 300));
        assert!(cfg.identify_on_video);
        assert!(cfg.flip_projection);
        assert!(!cfg.calibrate);
        assert_eq!(cfg.renderer, RendererKind::Osc);
        assert_eq!(cfg.corner_detector.threshold, 150);
        assert_eq!(cfg.corner_detector.hull_epsilon, 25.0);
        assert_eq!(cfg.camera_quad().tl(), Point2::new(50.0, 40.0));
        assert_eq!(cfg.osc_address, "127.0.0.1:20001");
        assert_eq!(cfg.warp_retry(), RetryPolicy::default());

        let templates = cfg.marker_templates().unwrap();
        assert_eq!(templates[&4].canvas().dimensions(), (150, 150));
    }

    #[test]
    fn corners_default_to_the_projector_rectangle() {
        let cfg = Config::from_toml_str("PROJECTOR_WIDTH = 64\nPROJECTOR_HEIGHT = 48\n").unwrap();
        assert_eq!(cfg.projector_quad(), Quad::rect(0.0, 0.0, 64.0, 48.0));
        assert_eq!(cfg.camera_quad(), cfg.projector_quad());
        assert_eq!(cfg.renderer, RendererKind::Image);
    }

    #[test]
    fn missing_size_is_a_parse_error() {
        assert!(matches!(
            Config::from_toml_str("PROJECTOR_WIDTH = 64\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = Config::from_toml_str("PROJECTOR_WIDTH = 0\nPROJECTOR_HEIGHT = 48\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyProjector { .. }));
    }

    #[test]
    fn collinear_source_corners_are_rejected() {
        let err = Config::from_toml_str(
            r#"
            PROJECTOR_WIDTH = 64
            PROJECTOR_HEIGHT = 48
            SRC_CORNERS = [[0, 0], [1, 1], [2, 2], [3, 3]]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DegenerateCorners(_)));
    }

    #[test]
    fn bad_template_key_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            PROJECTOR_WIDTH = 64
            PROJECTOR_HEIGHT = 48
            [TEMPLATES.four]
            width = 10
            height = 10
            marker_size = 10
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::TemplateId(k) if k == "four"));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();
        let cfg = Config::from_path(&path).unwrap();
        assert_eq!(cfg.projector_width, 400);

        let err = Config::from_path(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
