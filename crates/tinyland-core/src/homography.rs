use crate::geometry::{all_collinear, any_three_collinear, Quad};
use crate::ransac::{ransac, Estimator, RansacOptions};
use crate::GeometryError;
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Smallest homogeneous scale accepted when dehomogenizing.
const MIN_W: f64 = 1e-12;

/// A projective map `dst ~ H * src` in homogeneous coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    /// Multiply, then divide by the third homogeneous coordinate.
    ///
    /// Points mapped onto the line at infinity fail with
    /// [`GeometryError::DegenerateTransform`].
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Result<Point2<f64>, GeometryError> {
        self.project(p.x, p.y)
            .map(|(x, y)| Point2::new(x, y))
            .ok_or(GeometryError::degenerate("point maps to the line at infinity"))
    }

    #[inline]
    pub(crate) fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let v = self.h * Vector3::new(x, y, 1.0);
        let w = v[2];
        if w.abs() < MIN_W {
            return None;
        }
        Some((v[0] / w, v[1] / w))
    }

    pub fn apply_quad(&self, q: &Quad) -> Result<Quad, GeometryError> {
        q.try_map(|p| self.apply(p))
    }

    pub fn inverse(&self) -> Result<Self, GeometryError> {
        let inv = self
            .h
            .try_inverse()
            .ok_or(GeometryError::degenerate("matrix is singular"))?;
        // Keep h33 = 1 when possible; a vanishing h33 is still a valid map.
        let s = inv[(2, 2)];
        Ok(Self::new(if s.abs() >= MIN_W { inv / s } else { inv }))
    }

    /// The map that applies `self` first and `next` second.
    pub fn then(&self, next: &Homography) -> Homography {
        Homography::new(next.h * self.h)
    }
}

/// Forward (camera -> projector) and inverse (projector -> camera) maps,
/// always computed together.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HomographyPair {
    forward: Homography,
    inverse: Homography,
}

impl HomographyPair {
    pub fn new(forward: Homography) -> Result<Self, GeometryError> {
        let inverse = forward.inverse()?;
        Ok(Self { forward, inverse })
    }

    pub fn identity() -> Self {
        Self {
            forward: Homography::identity(),
            inverse: Homography::identity(),
        }
    }

    /// Estimate the pair mapping `camera` corners onto `projector` corners.
    pub fn from_quads(camera: &Quad, projector: &Quad) -> Result<Self, GeometryError> {
        Self::new(estimate_homography(camera.points(), projector.points())?)
    }

    /// Append `post` (a projector-space map) after the forward transform.
    pub fn then(&self, post: &Homography) -> Result<Self, GeometryError> {
        Self::new(self.forward.then(post))
    }

    #[inline]
    pub fn forward(&self) -> &Homography {
        &self.forward
    }

    #[inline]
    pub fn inverse(&self) -> &Homography {
        &self.inverse
    }
}

/// Parameters of the robust estimator used for more than four correspondences.
#[derive(Clone, Debug)]
pub struct RansacParams {
    /// Reprojection error (destination pixels) separating inliers.
    pub reproj_threshold: f64,
    pub max_iters: usize,
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        let opts = RansacOptions::default();
        Self {
            reproj_threshold: opts.thresh,
            max_iters: opts.max_iters,
            seed: opts.seed,
        }
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Translate to the centroid and scale so the mean distance is sqrt(2).
fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Result<Matrix3<f64>, GeometryError> {
    let s = h[(2, 2)];
    if s.abs() < MIN_W {
        return Err(GeometryError::degenerate("h33 vanishes"));
    }
    let h = h / s;
    if h.iter().all(|v| v.is_finite()) {
        Ok(h)
    } else {
        Err(GeometryError::degenerate("non-finite matrix"))
    }
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Result<Matrix3<f64>, GeometryError> {
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or(GeometryError::degenerate("normalization is singular"))?;
    normalize_homography(t_dst_inv * hn * t_src)
}

fn check_correspondences(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Result<(), GeometryError> {
    if src.len() != dst.len() {
        return Err(GeometryError::degenerate("point sets differ in length"));
    }
    if src.len() < 4 {
        return Err(GeometryError::degenerate("fewer than 4 correspondences"));
    }
    if all_collinear(src) || all_collinear(dst) {
        return Err(GeometryError::degenerate("collinear points"));
    }
    Ok(())
}

/// Estimate `H` such that `dst ~ H * src`.
///
/// Exactly four correspondences are solved exactly. Larger sets go through
/// seeded RANSAC with a least-squares refit on the consensus set, so a few
/// gross outliers do not corrupt the result and repeated calls agree.
pub fn estimate_homography(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Result<Homography, GeometryError> {
    estimate_homography_with(src, dst, &RansacParams::default())
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, dst, params), fields(n = src.len()))
)]
pub fn estimate_homography_with(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    params: &RansacParams,
) -> Result<Homography, GeometryError> {
    check_correspondences(src, dst)?;

    if src.len() == 4 {
        let s: &[Point2<f64>; 4] = src
            .try_into()
            .map_err(|_| GeometryError::degenerate("fewer than 4 correspondences"))?;
        let d: &[Point2<f64>; 4] = dst
            .try_into()
            .map_err(|_| GeometryError::degenerate("fewer than 4 correspondences"))?;
        return homography_from_4pt(s, d);
    }

    let pairs: Vec<(Point2<f64>, Point2<f64>)> =
        src.iter().copied().zip(dst.iter().copied()).collect();
    let opts = RansacOptions {
        thresh: params.reproj_threshold,
        max_iters: params.max_iters,
        seed: params.seed,
        min_inliers: 4,
        ..RansacOptions::default()
    };
    let res = ransac::<HomographyEstimator>(&pairs, &opts);
    match res.model {
        Some(h) => {
            log::trace!(
                "homography consensus: {}/{} inliers, rms {:.3}px",
                res.inliers.len(),
                pairs.len(),
                res.inlier_rms
            );
            Ok(h)
        }
        None => dlt(src, dst),
    }
}

/// Normalized direct linear transform over all correspondences (SVD).
fn dlt(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Result<Homography, GeometryError> {
    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    let n = s.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let (x, y) = (s[k].x, s[k].y);
        let (u, v) = (d[k].x, d[k].y);

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // For 2n < 9 the thin SVD drops the null space, pad with zero rows.
    if a.nrows() < 9 {
        a = a.resize_vertically(9, 0.0);
    }

    // Ah = 0: h is the right singular vector of the smallest singular value.
    let svd = a.svd(false, true);
    let vt = svd
        .v_t
        .ok_or(GeometryError::degenerate("SVD did not converge"))?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(GeometryError::degenerate("empty system"))?;
    let h = vt.row(min_idx);

    let hn = Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);
    denormalize_homography(hn, ts, td).map(Homography::new)
}

/// Exact homography from 4 correspondences, corner order shared by `src` and `dst`.
pub fn homography_from_4pt(
    src: &[Point2<f64>; 4],
    dst: &[Point2<f64>; 4],
) -> Result<Homography, GeometryError> {
    if any_three_collinear(src) || any_three_collinear(dst) {
        return Err(GeometryError::degenerate("three collinear points"));
    }

    // Unknowns [h11 h12 h13 h21 h22 h23 h31 h32], h33 = 1:
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src_n[k].x, src_n[k].y);
        let (u, v) = (dst_n[k].x, dst_n[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a
        .lu()
        .solve(&b)
        .ok_or(GeometryError::degenerate("singular 4-point system"))?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    denormalize_homography(hn, t_src, t_dst).map(Homography::new)
}

struct HomographyEstimator;

impl Estimator for HomographyEstimator {
    type Datum = (Point2<f64>, Point2<f64>);
    type Model = Homography;

    const MIN_SAMPLES: usize = 4;

    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Homography> {
        let src = [0, 1, 2, 3].map(|k| data[sample[k]].0);
        let dst = [0, 1, 2, 3].map(|k| data[sample[k]].1);
        homography_from_4pt(&src, &dst).ok()
    }

    fn residual(model: &Homography, datum: &Self::Datum) -> f64 {
        match model.apply(datum.0) {
            Ok(p) => (p - datum.1).norm(),
            Err(_) => f64::INFINITY,
        }
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Homography> {
        let src: Vec<Point2<f64>> = inliers.iter().map(|&i| data[i].0).collect();
        let dst: Vec<Point2<f64>> = inliers.iter().map(|&i| data[i].1).collect();
        dlt(&src, &dst).ok()
    }
}
