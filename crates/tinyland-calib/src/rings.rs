use image::GrayImage;
use imageproc::contours::{find_contours, Contour};
use imageproc::point::Point;
use nalgebra::Point2;
use tinyland_core::polygon_area;

use crate::CornerDetectorParams;

/// A contour that passed the ring test, with its hole.
#[derive(Clone, Debug)]
pub struct RingCandidate {
    pub outer: Vec<Point<i32>>,
    pub inner: Vec<Point<i32>>,
    pub outer_area: f64,
    pub inner_area: f64,
    pub outer_squareness: f64,
    pub inner_squareness: f64,
}

impl RingCandidate {
    pub fn area_ratio(&self) -> f64 {
        self.outer_area / self.inner_area
    }
}

fn area(points: &[Point<i32>]) -> f64 {
    let pts: Vec<Point2<f64>> = points
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect();
    polygon_area(&pts)
}

/// Inclusive bounding box size, as pixel counts.
fn bbox_size(points: &[Point<i32>]) -> Option<(f64, f64)> {
    let first = points.first()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    Some(((x1 - x0 + 1) as f64, (y1 - y0 + 1) as f64))
}

/// `(short side / long side) × (area / bounding-box area)`; 1.0 for a
/// perfect axis-aligned square.
pub fn squareness(points: &[Point<i32>]) -> f64 {
    let Some((w, h)) = bbox_size(points) else {
        return 0.0;
    };
    let aspect = w.min(h) / w.max(h);
    aspect * (area(points) / (w * h))
}

fn children_of(contours: &[Contour<i32>]) -> Vec<Vec<usize>> {
    let mut children = vec![Vec::new(); contours.len()];
    for (i, c) in contours.iter().enumerate() {
        if let Some(parent) = c.parent {
            children[parent].push(i);
        }
    }
    children
}

/// All ring-shaped contours of a binary image.
pub fn find_rings(binary: &GrayImage, params: &CornerDetectorParams) -> Vec<RingCandidate> {
    let contours = find_contours::<i32>(binary);
    let children = children_of(&contours);

    let mut out = Vec::new();
    for (i, contour) in contours.iter().enumerate() {
        let [child] = children[i].as_slice() else {
            continue;
        };
        if !children[*child].is_empty() {
            continue;
        }

        let inner = &contours[*child].points;
        let outer_area = area(&contour.points);
        let inner_area = area(inner);
        if inner_area <= 0.0 {
            continue;
        }
        let outer_squareness = squareness(&contour.points);
        let inner_squareness = squareness(inner);
        let ratio = outer_area / inner_area;

        if outer_squareness > params.min_outer_squareness
            && inner_squareness > params.min_inner_squareness
            && ratio > params.min_area_ratio
            && ratio < params.max_area_ratio
        {
            out.push(RingCandidate {
                outer: contour.points.clone(),
                inner: inner.clone(),
                outer_area,
                inner_area,
                outer_squareness,
                inner_squareness,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled(points: &[(i32, i32)]) -> Vec<Point<i32>> {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn square_outline_is_nearly_perfectly_square() {
        let pts = filled(&[(0, 0), (99, 0), (99, 99), (0, 99)]);
        assert!(squareness(&pts) > 0.97);
    }

    #[test]
    fn elongated_outline_is_not_square() {
        let pts = filled(&[(0, 0), (99, 0), (99, 19), (0, 19)]);
        assert!(squareness(&pts) < 0.25);
    }

    #[test]
    fn solid_blob_is_not_a_ring() {
        let mut img = GrayImage::new(60, 60);
        for y in 10..50 {
            for x in 10..50 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        assert!(find_rings(&img, &CornerDetectorParams::default()).is_empty());
    }

    #[test]
    fn square_frame_is_a_ring() {
        let mut img = GrayImage::new(80, 80);
        for y in 10..58 {
            for x in 10..58 {
                let hole = (22..46).contains(&x) && (22..46).contains(&y);
                if !hole {
                    img.put_pixel(x, y, Luma([255]));
                }
            }
        }
        let rings = find_rings(&img, &CornerDetectorParams::default());
        assert_eq!(rings.len(), 1);
        let ratio = rings[0].area_ratio();
        assert!(ratio > 2.0 && ratio < 10.0, "ratio {ratio}");
    }

    #[test]
    fn thin_frame_fails_area_ratio() {
        // hole almost as large as the outer square
        let mut img = GrayImage::new(80, 80);
        for y in 10..58 {
            for x in 10..58 {
                let hole = (12..56).contains(&x) && (12..56).contains(&y);
                if !hole {
                    img.put_pixel(x, y, Luma([255]));
                }
            }
        }
        assert!(find_rings(&img, &CornerDetectorParams::default()).is_empty());
    }
}
