use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four points ordered top-left, top-right, bottom-right, bottom-left.
///
/// Every consumer relies on this winding. Producers are responsible for it;
/// nothing here reorders points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quad(pub [Point2<f64>; 4]);

impl Quad {
    pub fn new(tl: Point2<f64>, tr: Point2<f64>, br: Point2<f64>, bl: Point2<f64>) -> Self {
        Self([tl, tr, br, bl])
    }

    pub fn from_array(pts: [[f64; 2]; 4]) -> Self {
        Self(pts.map(|[x, y]| Point2::new(x, y)))
    }

    /// Axis-aligned rectangle with its top-left corner at `(x, y)`.
    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_array([
            [x, y],
            [x + width, y],
            [x + width, y + height],
            [x, y + height],
        ])
    }

    #[inline]
    pub fn points(&self) -> &[Point2<f64>; 4] {
        &self.0
    }

    #[inline]
    pub fn tl(&self) -> Point2<f64> {
        self.0[0]
    }

    #[inline]
    pub fn tr(&self) -> Point2<f64> {
        self.0[1]
    }

    #[inline]
    pub fn br(&self) -> Point2<f64> {
        self.0[2]
    }

    #[inline]
    pub fn bl(&self) -> Point2<f64> {
        self.0[3]
    }

    /// Midpoint of the top-left / bottom-right diagonal.
    ///
    /// This is the median of the two diagonal corners, which tolerates one
    /// of the other two corners being mis-detected.
    pub fn diagonal_center(&self) -> Point2<f64> {
        nalgebra::center(&self.tl(), &self.br())
    }

    /// Angle of the left edge (bottom-left to top-left), in degrees.
    ///
    /// Returns `NaN` when the edge has no horizontal extent; callers treat a
    /// non-finite value as "unknown rotation".
    pub fn left_edge_angle_deg(&self) -> f64 {
        let dx = self.tl().x - self.bl().x;
        let dy = self.tl().y - self.bl().y;
        if dx == 0.0 {
            return f64::NAN;
        }
        (dy / dx).atan().to_degrees()
    }

    pub fn map<F>(&self, f: F) -> Quad
    where
        F: FnMut(Point2<f64>) -> Point2<f64>,
    {
        Quad(self.0.map(f))
    }

    pub fn try_map<F, E>(&self, mut f: F) -> Result<Quad, E>
    where
        F: FnMut(Point2<f64>) -> Result<Point2<f64>, E>,
    {
        Ok(Quad([f(self.0[0])?, f(self.0[1])?, f(self.0[2])?, f(self.0[3])?]))
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.0)
    }
}

/// Absolute shoelace area of a closed polygon.
pub fn polygon_area(pts: &[Point2<f64>]) -> f64 {
    if pts.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, p) in pts.iter().enumerate() {
        let q = pts[(i + 1) % pts.len()];
        twice += p.x * q.y - q.x * p.y;
    }
    0.5 * twice.abs()
}

const COLLINEAR_REL_TOL: f64 = 1e-9;

fn collinear(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> bool {
    let ab = b - a;
    let ac = c - a;
    let cross = ab.x * ac.y - ab.y * ac.x;
    let scale = ab.norm() * ac.norm();
    if scale <= f64::EPSILON {
        // coincident points
        return true;
    }
    cross.abs() <= COLLINEAR_REL_TOL * scale
}

/// True when some triple of the points is collinear (or coincident).
pub fn any_three_collinear(pts: &[Point2<f64>]) -> bool {
    let n = pts.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if collinear(pts[i], pts[j], pts[k]) {
                    return true;
                }
            }
        }
    }
    false
}

/// True when all points lie on one line (or there are fewer than 3).
pub fn all_collinear(pts: &[Point2<f64>]) -> bool {
    let Some(&a) = pts.first() else {
        return true;
    };
    let Some(&b) = pts
        .iter()
        .max_by(|p, q| (**p - a).norm().total_cmp(&(**q - a).norm()))
    else {
        return true;
    };
    if (b - a).norm() <= f64::EPSILON {
        return true;
    }
    pts.iter().all(|&c| collinear(a, b, c) || (c - a).norm() <= f64::EPSILON)
}
