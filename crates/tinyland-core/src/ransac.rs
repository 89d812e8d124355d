//! Seeded, model-agnostic RANSAC.
//!
//! Implement [`Estimator`] for a model and call [`ransac`]. Sampling uses a
//! fixed-seed RNG, so identical inputs always produce identical models.

use rand::seq::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};

/// Configuration of one RANSAC run.
#[derive(Debug, Clone)]
pub struct RansacOptions {
    /// Upper bound on sampled hypotheses.
    pub max_iters: usize,
    /// Residual at or below which a datum counts as an inlier.
    pub thresh: f64,
    /// Minimum consensus size needed to accept a model.
    pub min_inliers: usize,
    /// Target probability of drawing at least one all-inlier sample.
    pub confidence: f64,
    pub seed: u64,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            thresh: 3.0,
            min_inliers: 4,
            confidence: 0.995,
            seed: 0x7105_1a4d,
        }
    }
}

/// Output of a RANSAC run. `model` is `None` when no consensus was found.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    pub model: Option<M>,
    pub inliers: Vec<usize>,
    pub inlier_rms: f64,
    pub iters: usize,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            model: None,
            inliers: Vec::new(),
            inlier_rms: f64::INFINITY,
            iters: 0,
        }
    }
}

/// A geometric model fitted from minimal samples.
pub trait Estimator {
    type Datum;
    type Model;

    const MIN_SAMPLES: usize;

    /// Fit from the sampled indices; `None` for a degenerate sample.
    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual, in the units of [`RansacOptions::thresh`].
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Least-squares refit on the whole consensus set.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

fn rms(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::INFINITY;
    }
    (vals.iter().map(|v| v * v).sum::<f64>() / vals.len() as f64).sqrt()
}

fn adaptive_iterations(confidence: f64, inlier_ratio: f64, m: usize, max_iters: usize) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(m as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let n = ((1.0 - confidence).ln() / denom).ceil();
    if n.is_finite() && n >= 1.0 {
        (n as usize).min(max_iters)
    } else {
        max_iters
    }
}

fn consensus<E: Estimator>(
    data: &[E::Datum],
    model: &E::Model,
    thresh: f64,
) -> (Vec<usize>, Vec<f64>) {
    let mut inliers = Vec::new();
    let mut residuals = Vec::new();
    for (i, d) in data.iter().enumerate() {
        let r = E::residual(model, d);
        if r <= thresh {
            inliers.push(i);
            residuals.push(r);
        }
    }
    (inliers, residuals)
}

/// Run RANSAC for estimator `E` over `data`.
pub fn ransac<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut best: RansacResult<E::Model> = RansacResult::default();
    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let indices: Vec<usize> = (0..data.len()).collect();
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut budget = opts.max_iters;
    let mut iters = 0;

    while iters < budget {
        iters += 1;
        let sample: Vec<usize> = indices
            .choose_multiple(&mut rng, E::MIN_SAMPLES)
            .copied()
            .collect();

        let Some(model) = E::fit(data, &sample) else {
            continue;
        };
        let (inliers, residuals) = consensus::<E>(data, &model, opts.thresh);
        if inliers.len() < opts.min_inliers.max(E::MIN_SAMPLES) {
            continue;
        }

        let (model, inliers, residuals) = match E::refit(data, &inliers) {
            Some(refit) => {
                let (ri, rr) = consensus::<E>(data, &refit, opts.thresh);
                if ri.len() >= inliers.len() {
                    (refit, ri, rr)
                } else {
                    (model, inliers, residuals)
                }
            }
            None => (model, inliers, residuals),
        };

        let score = rms(&residuals);
        let better = best.model.is_none()
            || inliers.len() > best.inliers.len()
            || (inliers.len() == best.inliers.len() && score < best.inlier_rms);
        if better {
            let ratio = inliers.len() as f64 / data.len() as f64;
            budget = adaptive_iterations(opts.confidence, ratio, E::MIN_SAMPLES, opts.max_iters)
                .max(iters);
            best = RansacResult {
                model: Some(model),
                inliers,
                inlier_rms: score,
                iters,
            };
            if best.inliers.len() == data.len() {
                break;
            }
        }
    }

    best.iters = iters;
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fits `y = c` to scalar data.
    struct Constant;

    impl Estimator for Constant {
        type Datum = f64;
        type Model = f64;
        const MIN_SAMPLES: usize = 1;

        fn fit(data: &[f64], sample: &[usize]) -> Option<f64> {
            Some(data[sample[0]])
        }

        fn residual(model: &f64, datum: &f64) -> f64 {
            (model - datum).abs()
        }

        fn refit(data: &[f64], inliers: &[usize]) -> Option<f64> {
            Some(inliers.iter().map(|&i| data[i]).sum::<f64>() / inliers.len() as f64)
        }
    }

    #[test]
    fn rejects_outliers() {
        let data = [1.0, 1.1, 0.9, 1.0, 50.0, -30.0];
        let opts = RansacOptions {
            thresh: 0.5,
            min_inliers: 3,
            ..RansacOptions::default()
        };
        let res = ransac::<Constant>(&data, &opts);
        let model = res.model.expect("consensus");
        assert!((model - 1.0).abs() < 1e-9);
        assert_eq!(res.inliers, vec![0, 1, 2, 3]);
    }

    #[test]
    fn too_little_data_yields_no_model() {
        let res = ransac::<Constant>(&[], &RansacOptions::default());
        assert!(res.model.is_none());
    }
}
