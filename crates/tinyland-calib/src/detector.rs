use image::RgbImage;
use imageproc::geometry::{approximate_polygon_dp, convex_hull};
use imageproc::point::Point;
use nalgebra::Point2;
use tinyland_core::{to_binary, Quad};

use crate::rings::find_rings;
use crate::CornerDetectorParams;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Stateless calibration-ring detector.
#[derive(Clone, Debug, Default)]
pub struct CornerDetector {
    params: CornerDetectorParams,
}

impl CornerDetector {
    pub fn new(params: CornerDetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CornerDetectorParams {
        &self.params
    }

    pub fn detect(&self, frame: &RgbImage) -> Option<Quad> {
        find_calibration_corners(frame, &self.params)
    }
}

/// Find the calibration quadrilateral in a camera frame.
///
/// Returns `None` when the frame does not contain exactly four rings whose
/// hull reduces to a quadrilateral with one vertex per image quadrant. The
/// caller keeps its previous calibration and tries again on the next frame.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(frame, params), fields(width = frame.width(), height = frame.height()))
)]
pub fn find_calibration_corners(frame: &RgbImage, params: &CornerDetectorParams) -> Option<Quad> {
    let gray = image::imageops::grayscale(frame);
    let binary = to_binary(&gray, params.threshold);

    let rings = find_rings(&binary, params);
    if rings.len() != 4 {
        log::debug!("calibration: found {} ring candidates, need 4", rings.len());
        return None;
    }

    let all_points: Vec<Point<i32>> = rings
        .iter()
        .flat_map(|r| r.outer.iter().copied())
        .collect();
    let hull = convex_hull(&all_points[..]);
    let boundary = simplify_closed(&hull, params.hull_epsilon);
    if boundary.len() != 4 {
        log::debug!(
            "calibration: hull simplified to {} vertices, need 4",
            boundary.len()
        );
        return None;
    }

    let quad = order_by_quadrant(&boundary, frame.width() as f64, frame.height() as f64);
    if quad.is_none() {
        log::debug!("calibration: hull vertices do not occupy one quadrant each");
    }
    quad
}

/// Douglas-Peucker on a closed polygon.
///
/// The ring is cut at its two mutually farthest vertices and each half is
/// simplified as an open curve, so both cut points survive. A final cyclic
/// pass drops any vertex that lies within `epsilon` of the line through its
/// neighbours.
fn simplify_closed(hull: &[Point<i32>], epsilon: f64) -> Vec<Point2<f64>> {
    let to_f64 = |p: &Point<i32>| Point2::new(p.x as f64, p.y as f64);
    if hull.len() < 4 {
        return hull.iter().map(to_f64).collect();
    }

    let (a, b) = farthest_pair(hull);
    let first = approximate_polygon_dp(&hull[a..=b], epsilon, false);
    let wrapped: Vec<Point<i32>> = hull[b..].iter().chain(&hull[..=a]).copied().collect();
    let second = approximate_polygon_dp(&wrapped, epsilon, false);

    // Each half ends where the other starts.
    let inner = &second[1..second.len() - 1];
    let mut pts: Vec<Point2<f64>> = first.iter().chain(inner).map(to_f64).collect();
    pts.dedup();

    loop {
        let n = pts.len();
        if n <= 3 {
            return pts;
        }
        let flat = (0..n).find(|&i| {
            let prev = pts[(i + n - 1) % n];
            let next = pts[(i + 1) % n];
            distance_to_line(pts[i], prev, next) <= epsilon
        });
        match flat {
            Some(i) => {
                pts.remove(i);
            }
            None => return pts,
        }
    }
}

/// Indices `(i, j)`, `i < j`, of the two vertices farthest apart.
fn farthest_pair(pts: &[Point<i32>]) -> (usize, usize) {
    let mut best = (0, pts.len() - 1, -1i64);
    for i in 0..pts.len() {
        for j in (i + 1)..pts.len() {
            let dx = (pts[j].x - pts[i].x) as i64;
            let dy = (pts[j].y - pts[i].y) as i64;
            let d2 = dx * dx + dy * dy;
            if d2 > best.2 {
                best = (i, j, d2);
            }
        }
    }
    (best.0, best.1)
}

fn distance_to_line(p: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    let ab = b - a;
    let len = ab.norm();
    if len <= f64::EPSILON {
        return (p - a).norm();
    }
    let ap = p - a;
    (ab.x * ap.y - ab.y * ap.x).abs() / len
}

/// Assign each point to a quadrant of a `width × height` frame.
///
/// Succeeds only when every quadrant holds exactly one point. Points on a
/// midline belong to no quadrant.
pub fn order_by_quadrant(points: &[Point2<f64>], width: f64, height: f64) -> Option<Quad> {
    let (mx, my) = (width / 2.0, height / 2.0);
    let pick = |left: bool, top: bool| -> Option<Point2<f64>> {
        let mut found = points.iter().filter(|p| {
            let horizontal = if left { p.x < mx } else { p.x > mx };
            let vertical = if top { p.y < my } else { p.y > my };
            horizontal && vertical
        });
        let first = *found.next()?;
        found.next().is_none().then_some(first)
    };

    Some(Quad::new(
        pick(true, true)?,
        pick(false, true)?,
        pick(false, false)?,
        pick(true, false)?,
    ))
}
