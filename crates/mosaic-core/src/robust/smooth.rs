//! Local-smoothness filtering.
//!
//! Rejects correspondences that disagree with a locally weighted model of
//! their neighbourhood. Unlike [`ransac`](super::ransac) there is no single
//! global model: every candidate is tested against a model fit to all other
//! candidates, weighted by a Gaussian of the local distance.

use serde::{Deserialize, Serialize};

use crate::error::RobustError;
use crate::math::Real;
use crate::model::Model;
use crate::point::Point;
use crate::point_match::PointMatch;

/// Configuration for [`local_smoothness_filter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothnessParams {
    /// Standard deviation of the Gaussian locality weight.
    pub sigma: Real,
    /// Absolute residual bound for the held-out candidate.
    pub max_epsilon: Real,
    /// Relative bound: candidate residual must stay within
    /// `max_trust × locally weighted mean residual`.
    pub max_trust: Real,
}

impl Default for SmoothnessParams {
    fn default() -> Self {
        Self {
            sigma: 100.0,
            max_epsilon: 10.0,
            max_trust: 3.0,
        }
    }
}

/// Remove candidates that are inconsistent with their local neighbourhood.
///
/// For each candidate, every other candidate is weighted by
/// `exp(-d² / 2σ²)` of the local distance between their `p1` coordinates and
/// a fresh copy of `template` is fit with the candidate's own weight set to
/// zero. The held-out candidate is kept only if its residual under that
/// local model passes both the absolute `max_epsilon` bound and the
/// `max_trust` bound relative to the locally weighted mean residual of the
/// others. Passes repeat until the inlier set reaches a fixed point.
///
/// `template` itself is never mutated; local fits operate on clones.
pub fn local_smoothness_filter<const D: usize, M: Model<D>>(
    template: &M,
    candidates: &[PointMatch<D>],
    params: &SmoothnessParams,
) -> Result<Vec<PointMatch<D>>, RobustError> {
    let min_matches = template.min_num_matches();
    if candidates.len() < min_matches {
        return Err(crate::error::FitError::NotEnoughDataPoints {
            required: min_matches,
            given: candidates.len(),
        }
        .into());
    }

    let two_sigma_sq = 2.0 * params.sigma * params.sigma;
    let mut inliers: Vec<PointMatch<D>> = candidates.to_vec();

    loop {
        let mut keep = vec![true; inliers.len()];
        let mut removed_any = false;

        for (i, candidate) in inliers.iter().enumerate() {
            // Locality-weighted copy of the current inlier set; the held-out
            // candidate contributes nothing to the fit.
            let mut weighted: Vec<PointMatch<D>> = inliers.to_vec();
            for (j, m) in weighted.iter_mut().enumerate() {
                let w = if j == i {
                    0.0
                } else {
                    let d2 = Point::square_local_distance(candidate.p1(), m.p1());
                    (-d2 / two_sigma_sq).exp()
                };
                m.push_weight(w);
            }

            let mut local = template.clone();
            if local.fit(&weighted).is_err() {
                // Degenerate neighbourhood; the candidate cannot be judged,
                // treat it as unsupported.
                keep[i] = false;
                removed_any = true;
                continue;
            }

            let mut residual_sum = 0.0;
            let mut weight_sum = 0.0;
            for (j, m) in weighted.iter().enumerate() {
                if j == i {
                    continue;
                }
                residual_sum += m.weight() * local.residual(m);
                weight_sum += m.weight();
            }
            let local_mean = if weight_sum > 0.0 {
                residual_sum / weight_sum
            } else {
                0.0
            };

            let r = local.residual(candidate);
            if r > params.max_epsilon || r > params.max_trust * local_mean {
                keep[i] = false;
                removed_any = true;
            }
        }

        let mut it = keep.iter();
        inliers.retain(|_| *it.next().expect("keep mask covers inliers"));

        if inliers.len() < min_matches {
            return Err(RobustError::NoConsensus);
        }
        if !removed_any {
            return Ok(inliers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Coord;
    use crate::synthetic::{line_model_1d, noisy_line_matches, Line1D};

    fn params() -> SmoothnessParams {
        SmoothnessParams {
            sigma: 10.0,
            max_epsilon: 10.0,
            max_trust: 1e6,
        }
    }

    #[test]
    fn consistent_field_is_untouched() {
        let matches = noisy_line_matches(Line1D { m: 1.0, b: 2.0 }, 20, 0.01, 13);
        let inliers = local_smoothness_filter(&line_model_1d(), &matches, &params()).unwrap();
        assert_eq!(inliers.len(), matches.len());
    }

    #[test]
    fn local_outlier_is_removed() {
        let mut matches = noisy_line_matches(Line1D { m: 1.0, b: 2.0 }, 20, 0.01, 13);
        // One correspondence pointing far off the locally smooth field.
        matches.push(PointMatch::new(
            crate::point::Point::new(Coord::<1>::new(9.5)),
            crate::point::Point::new(Coord::<1>::new(60.0)),
        ));
        let inliers = local_smoothness_filter(&line_model_1d(), &matches, &params()).unwrap();
        assert_eq!(inliers.len(), matches.len() - 1);
        assert!(inliers.iter().all(|m| m.p2().w()[0] < 60.0));
    }
}
