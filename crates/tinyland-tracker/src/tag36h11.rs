//! tag36h11 decoding through the AprilTag 3 C library.

use apriltag::{Detector, DetectorBuilder, Family, Image};
use image::RgbImage;
use nalgebra::Point2;
use tinyland_core::Quad;

use crate::{DetectedMarker, DetectorError, MarkerDetector};

const IMAGE_ALIGNMENT: usize = 96;

/// Decodes tag36h11 markers from camera or output frames.
pub struct AprilTagDetector {
    detector: Detector,
    max_hamming: usize,
}

impl AprilTagDetector {
    /// Detector that tolerates up to `max_hamming` corrected bits per tag.
    pub fn new(max_hamming: usize) -> Result<Self, DetectorError> {
        let detector = DetectorBuilder::new()
            .add_family_bits(Family::tag_36h11(), max_hamming)
            .build()
            .map_err(|e| DetectorError::AprilTag(e.to_string()))?;
        Ok(Self {
            detector,
            max_hamming,
        })
    }

    pub fn max_hamming(&self) -> usize {
        self.max_hamming
    }
}

impl std::fmt::Debug for AprilTagDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AprilTagDetector")
            .field("family", &"tag36h11")
            .field("max_hamming", &self.max_hamming)
            .finish()
    }
}

impl MarkerDetector for AprilTagDetector {
    fn detect(&mut self, frame: &RgbImage) -> Vec<DetectedMarker> {
        let Some(gray) = to_apriltag_image(frame) else {
            log::warn!(
                "apriltag: could not allocate a {}x{} image",
                frame.width(),
                frame.height()
            );
            return Vec::new();
        };
        self.detector
            .detect(&gray)
            .into_iter()
            .filter(|d| d.hamming() <= self.max_hamming)
            .filter_map(|d| {
                let id = u32::try_from(d.id()).ok()?;
                Some(DetectedMarker {
                    id,
                    corners: corners_tl_tr_br_bl(d.corners()),
                })
            })
            .collect()
    }
}

/// AprilTag reports corners counter-clockwise from bottom-left.
fn corners_tl_tr_br_bl(c: [[f64; 2]; 4]) -> Quad {
    let p = |i: usize| Point2::new(c[i][0], c[i][1]);
    Quad::new(p(3), p(2), p(1), p(0))
}

fn to_apriltag_image(frame: &RgbImage) -> Option<Image> {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let mut out = Image::zeros_with_alignment(w, h, IMAGE_ALIGNMENT)?;
    for (x, y, px) in frame.enumerate_pixels() {
        let [r, g, b] = px.0;
        let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
        out[(x as usize, y as usize)] = luma as u8;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const SCALE: u32 = 20;
    const MARGIN: u32 = 40;

    /// tag36h11 id `id` (including its white border), scaled up and padded
    /// with white.
    fn rendered_tag(id: u32) -> RgbImage {
        // SAFETY: the family and the rendered image are created, read and
        // destroyed here and not shared.
        let (side, cells) = unsafe {
            let family = apriltag_sys::tag36h11_create();
            let img = apriltag_sys::apriltag_to_image(family, id);
            let side = (*img).width as u32;
            let stride = (*img).stride as usize;
            let mut cells = Vec::with_capacity((side * side) as usize);
            for y in 0..side as usize {
                for x in 0..side as usize {
                    cells.push(*(*img).buf.add(y * stride + x));
                }
            }
            apriltag_sys::image_u8_destroy(img);
            apriltag_sys::tag36h11_destroy(family);
            (side, cells)
        };

        let total = side * SCALE + 2 * MARGIN;
        RgbImage::from_fn(total, total, |x, y| {
            if x < MARGIN || y < MARGIN || x >= MARGIN + side * SCALE || y >= MARGIN + side * SCALE
            {
                return Rgb([255, 255, 255]);
            }
            let cx = (x - MARGIN) / SCALE;
            let cy = (y - MARGIN) / SCALE;
            let v = cells[(cy * side + cx) as usize];
            Rgb([v, v, v])
        })
    }

    #[test]
    fn decodes_a_rendered_tag_with_ordered_corners() {
        let frame = rendered_tag(0);
        let mut det = AprilTagDetector::new(1).unwrap();
        let found = det.detect(&frame);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 0);

        // Black square spans cells 1..9 of the 10-cell tag image.
        let lo = (MARGIN + SCALE) as f64;
        let hi = (MARGIN + 9 * SCALE) as f64;
        let q = found[0].corners;
        let near = |p: Point2<f64>, x: f64, y: f64| (p.x - x).abs() < 3.0 && (p.y - y).abs() < 3.0;
        assert!(near(q.tl(), lo, lo), "tl {:?}", q.tl());
        assert!(near(q.tr(), hi, lo), "tr {:?}", q.tr());
        assert!(near(q.br(), hi, hi), "br {:?}", q.br());
        assert!(near(q.bl(), lo, hi), "bl {:?}", q.bl());
    }

    #[test]
    fn blank_frame_has_no_tags() {
        let frame = RgbImage::from_pixel(120, 90, Rgb([255, 255, 255]));
        let mut det = AprilTagDetector::new(1).unwrap();
        assert!(det.detect(&frame).is_empty());
    }

    #[test]
    fn bottom_left_first_corners_are_reordered() {
        let q = corners_tl_tr_br_bl([[0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]]);
        assert_eq!(q.tl(), Point2::new(0.0, 0.0));
        assert_eq!(q.tr(), Point2::new(10.0, 0.0));
        assert_eq!(q.br(), Point2::new(10.0, 10.0));
        assert_eq!(q.bl(), Point2::new(0.0, 10.0));
    }
}
