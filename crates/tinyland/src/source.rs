//! Camera-frame sources.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no frames found at {0}")]
    Empty(PathBuf),
}

/// Produces camera frames, one per call.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<RgbImage, SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<RgbImage, SourceError> {
        (**self).next_frame()
    }
}

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Image files played in order, rewinding after the last.
#[derive(Clone, Debug)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequence {
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths, cursor: 0 }
    }

    /// Every image file directly inside `dir`, sorted by name.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let io_err = |source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(SourceError::Empty(dir.to_path_buf()));
        }
        paths.sort();
        log::info!("{} frames in {}", paths.len(), dir.display());
        Ok(Self::from_paths(paths))
    }

    /// A directory of frames or a single image.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else if path.is_file() {
            Ok(Self::from_paths(vec![path.to_path_buf()]))
        } else {
            Err(SourceError::Empty(path.to_path_buf()))
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<RgbImage, SourceError> {
        let path = self
            .paths
            .get(self.cursor)
            .ok_or_else(|| SourceError::Empty(PathBuf::new()))?;
        let frame = image::open(path)
            .map_err(|source| SourceError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        self.cursor = (self.cursor + 1) % self.paths.len();
        Ok(frame)
    }
}

/// In-memory frames, looped.
#[derive(Clone, Debug, Default)]
pub struct FrameLoop {
    frames: Vec<RgbImage>,
    cursor: usize,
}

impl FrameLoop {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self { frames, cursor: 0 }
    }
}

impl FrameSource for FrameLoop {
    fn next_frame(&mut self) -> Result<RgbImage, SourceError> {
        let frame = self
            .frames
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| SourceError::Empty(PathBuf::new()))?;
        self.cursor = (self.cursor + 1) % self.frames.len();
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        RgbImage::from_pixel(4, 3, Rgb([shade; 3]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn directory_plays_sorted_and_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "b.png", 20);
        write_frame(dir.path(), "a.png", 10);
        fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut seq = ImageSequence::open(dir.path()).unwrap();
        assert_eq!(seq.len(), 2);
        let shades: Vec<u8> = (0..3)
            .map(|_| seq.next_frame().unwrap().get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(shades, vec![10, 20, 10]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequence::from_dir(dir.path()),
            Err(SourceError::Empty(_))
        ));
    }

    #[test]
    fn undecodable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not a png").unwrap();
        let mut seq = ImageSequence::open(&path).unwrap();
        assert!(matches!(seq.next_frame(), Err(SourceError::Decode { .. })));
    }

    #[test]
    fn frame_loop_rewinds() {
        let mut src = FrameLoop::new(vec![RgbImage::new(1, 1), RgbImage::new(2, 2)]);
        let widths: Vec<u32> = (0..3).map(|_| src.next_frame().unwrap().width()).collect();
        assert_eq!(widths, vec![1, 2, 1]);
        assert!(FrameLoop::default().next_frame().is_err());
    }
}
