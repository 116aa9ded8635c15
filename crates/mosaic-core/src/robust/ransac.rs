//! RANSAC over any fittable [`Model`].
//!
//! The sampler draws minimal subsets with a seeded generator, so results are
//! reproducible for a fixed seed and candidate order.

use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::RobustError;
use crate::math::Real;
use crate::model::Model;
use crate::point_match::PointMatch;

use super::trim::{filter, FilterParams};

/// Configuration for the [`ransac`] loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RansacParams {
    /// Number of minimal-sample rounds.
    pub iterations: usize,
    /// Inlier residual threshold.
    pub epsilon: Real,
    /// Minimum accepted ratio `inliers / candidates` in `[0, 1]`.
    pub min_inlier_ratio: Real,
    /// Minimum accepted absolute number of inliers.
    pub min_num_inliers: usize,
    /// Random-number generator seed (for reproducibility).
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            iterations: 1000,
            epsilon: 2.0,
            min_inlier_ratio: 0.1,
            min_num_inliers: 10,
            seed: 1_234_567,
        }
    }
}

/// Bucket the candidates accepted by `model` under `epsilon` and update the
/// model cost.
///
/// The cost becomes `clamp(1 - inlier_ratio, 0, 1)`. Returns `true` iff both
/// the ratio and the absolute thresholds are met; the inlier set is returned
/// either way.
pub fn test_model<const D: usize, M: Model<D>>(
    model: &mut M,
    candidates: &[PointMatch<D>],
    epsilon: Real,
    min_inlier_ratio: Real,
    min_num_inliers: usize,
) -> (bool, Vec<PointMatch<D>>) {
    let mut inliers = Vec::with_capacity(candidates.len());
    for m in candidates {
        if model.residual(m) < epsilon {
            inliers.push(m.clone());
        }
    }
    let ratio = if candidates.is_empty() {
        0.0
    } else {
        inliers.len() as Real / candidates.len() as Real
    };
    model.set_cost((1.0 - ratio).clamp(0.0, 1.0));
    let good = ratio >= min_inlier_ratio && inliers.len() >= min_num_inliers;
    (good, inliers)
}

/// Estimate `model` from `candidates` by random sample consensus.
///
/// Each round draws `min_num_matches` distinct candidates, fits a trial
/// model, then alternately re-tests and re-fits on the growing inlier set
/// until it stops growing. The best trial across rounds (by
/// [`Model::better_than`]) is committed into `model` together with its
/// inliers; if no round produced a valid result the model is left untouched
/// and [`RobustError::NoConsensus`] is returned.
pub fn ransac<const D: usize, M: Model<D>>(
    model: &mut M,
    candidates: &[PointMatch<D>],
    params: &RansacParams,
) -> Result<Vec<PointMatch<D>>, RobustError> {
    let min_samples = model.min_num_matches();
    if candidates.len() < min_samples {
        return Err(crate::error::FitError::NotEnoughDataPoints {
            required: min_samples,
            given: candidates.len(),
        }
        .into());
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let indices: Vec<usize> = (0..candidates.len()).collect();

    let mut best: Option<(M, Vec<PointMatch<D>>)> = None;

    for _ in 0..params.iterations {
        let sample: Vec<PointMatch<D>> = indices
            .as_slice()
            .choose_multiple(&mut rng, min_samples)
            .map(|&i| candidates[i].clone())
            .collect();

        let mut trial = model.clone();
        trial.set_cost(-1.0);
        if trial.fit(&sample).is_err() {
            // Degenerate minimal sample; draw another.
            continue;
        }

        let (mut good, mut inliers) = test_model(
            &mut trial,
            candidates,
            params.epsilon,
            params.min_inlier_ratio,
            params.min_num_inliers,
        );
        let mut num_inliers = 0;
        while good && inliers.len() > num_inliers {
            num_inliers = inliers.len();
            if trial.fit(&inliers).is_err() {
                good = false;
                break;
            }
            let (g, i) = test_model(
                &mut trial,
                candidates,
                params.epsilon,
                params.min_inlier_ratio,
                params.min_num_inliers,
            );
            good = g;
            inliers = i;
        }

        if good {
            let replace = match &best {
                None => true,
                Some((b, _)) => trial.better_than(b),
            };
            if replace {
                best = Some((trial, inliers));
            }
        }
    }

    match best {
        Some((m, inliers)) => {
            *model = m;
            Ok(inliers)
        }
        None => Err(RobustError::NoConsensus),
    }
}

/// [`ransac`] followed by an iterative trimmed-regression [`filter`] on the
/// consensus set.
pub fn filter_ransac<const D: usize, M: Model<D>>(
    model: &mut M,
    candidates: &[PointMatch<D>],
    ransac_params: &RansacParams,
    filter_params: &FilterParams,
) -> Result<Vec<PointMatch<D>>, RobustError> {
    let inliers = ransac(model, candidates, ransac_params)?;
    filter(model, &inliers, filter_params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Coord;
    use crate::point::Point;
    use crate::synthetic::{line_model_1d, noisy_line_matches, Line1D};

    fn clean_params() -> RansacParams {
        RansacParams {
            iterations: 200,
            epsilon: 0.05,
            min_inlier_ratio: 0.0,
            min_num_inliers: 2,
            seed: 42,
        }
    }

    #[test]
    fn all_inliers_give_zero_cost() {
        // epsilon large enough that every candidate is an inlier.
        let matches = noisy_line_matches(Line1D { m: 2.0, b: 1.0 }, 20, 0.0, 99);
        let mut model = line_model_1d();
        let params = RansacParams {
            epsilon: 1e3,
            ..clean_params()
        };
        let inliers = ransac(&mut model, &matches, &params).unwrap();
        assert_eq!(inliers.len(), matches.len());
        assert_eq!(model.cost(), 0.0);
    }

    #[test]
    fn recovers_line_under_outliers() {
        let mut matches = noisy_line_matches(Line1D { m: 2.0, b: 1.0 }, 30, 0.005, 7);
        // Gross outliers.
        for k in 0..8 {
            matches.push(PointMatch::new(
                Point::new(Coord::<1>::new(k as Real)),
                Point::new(Coord::<1>::new(-40.0 + 11.0 * k as Real)),
            ));
        }
        let mut model = line_model_1d();
        let inliers = ransac(&mut model, &matches, &clean_params()).unwrap();
        assert!(inliers.len() >= 30, "inliers {}", inliers.len());
        assert!(inliers.len() < matches.len());
        let (m, b) = model.parameters();
        assert!((m - 2.0).abs() < 0.05, "slope {}", m);
        assert!((b - 1.0).abs() < 0.05, "intercept {}", b);
    }

    #[test]
    fn reproducible_for_fixed_seed() {
        let mut matches = noisy_line_matches(Line1D { m: -1.0, b: 0.5 }, 25, 0.01, 3);
        matches.push(PointMatch::new(
            Point::new(Coord::<1>::new(2.0)),
            Point::new(Coord::<1>::new(30.0)),
        ));
        let mut a = line_model_1d();
        let mut b = line_model_1d();
        let inliers_a = ransac(&mut a, &matches, &clean_params()).unwrap();
        let inliers_b = ransac(&mut b, &matches, &clean_params()).unwrap();
        assert_eq!(inliers_a.len(), inliers_b.len());
        assert_eq!(a.parameters(), b.parameters());
    }

    #[test]
    fn params_serde_round_trip() {
        let params = clean_params();
        let json = serde_json::to_string(&params).unwrap();
        let de: RansacParams = serde_json::from_str(&json).unwrap();
        assert_eq!(de.iterations, params.iterations);
        assert_eq!(de.epsilon, params.epsilon);
        assert_eq!(de.seed, params.seed);
    }

    #[test]
    fn not_enough_candidates_is_an_error() {
        let matches = noisy_line_matches(Line1D { m: 1.0, b: 0.0 }, 1, 0.0, 1);
        let mut model = line_model_1d();
        let err = ransac(&mut model, &matches, &clean_params()).unwrap_err();
        assert!(matches!(err, RobustError::Fit(_)));
    }

    #[test]
    fn no_consensus_leaves_model_untouched() {
        // Pure noise with an impossible inlier demand.
        let matches = noisy_line_matches(Line1D { m: 1.0, b: 0.0 }, 12, 5.0, 11);
        let mut model = line_model_1d();
        let before = model.parameters();
        let params = RansacParams {
            epsilon: 1e-6,
            min_num_inliers: 12,
            ..clean_params()
        };
        let err = ransac(&mut model, &matches, &params).unwrap_err();
        assert_eq!(err, RobustError::NoConsensus);
        assert_eq!(model.parameters(), before);
    }
}
