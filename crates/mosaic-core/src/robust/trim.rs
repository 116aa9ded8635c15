//! Iterative trimmed regression.

use serde::{Deserialize, Serialize};

use crate::error::RobustError;
use crate::error_statistic::ErrorStatistic;
use crate::math::Real;
use crate::model::Model;
use crate::point_match::PointMatch;

/// Configuration for the trimmed-regression [`filter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterParams {
    /// Keep matches whose residual is at most `max_trust × median residual`.
    pub max_trust: Real,
    /// Minimum size of the surviving inlier set.
    pub min_num_inliers: usize,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            max_trust: 4.0,
            min_num_inliers: 0,
        }
    }
}

/// Trim outliers by repeated refitting.
///
/// Starting from all candidates, refit the model on the current inlier set,
/// compute the median residual, keep only matches with residual
/// `≤ max_trust × median`, and repeat until the inlier count stops
/// shrinking. The model cost becomes the mean surviving residual.
///
/// If any fit fails, or the final inlier set is smaller than the model's
/// minimum or `min_num_inliers`, the caller's model is left unchanged and an
/// error is returned.
pub fn filter<const D: usize, M: Model<D>>(
    model: &mut M,
    candidates: &[PointMatch<D>],
    params: &FilterParams,
) -> Result<Vec<PointMatch<D>>, RobustError> {
    let min_matches = model.min_num_matches().max(params.min_num_inliers);

    let mut work = model.clone();
    let mut inliers: Vec<PointMatch<D>> = candidates.to_vec();

    loop {
        let num_inliers = inliers.len();
        work.fit(&inliers)?;

        let mut observer = ErrorStatistic::new(inliers.len().max(1));
        for m in &inliers {
            observer.add(work.residual(m));
        }
        let median = observer.median();

        let bound = params.max_trust * median;
        inliers.retain(|m| work.residual(m) <= bound);

        if inliers.len() < min_matches {
            return Err(RobustError::NoConsensus);
        }
        if inliers.len() >= num_inliers {
            break;
        }
    }

    let mean: Real = if inliers.is_empty() {
        0.0
    } else {
        inliers.iter().map(|m| work.residual(m)).sum::<Real>() / inliers.len() as Real
    };
    work.set_cost(mean);
    *model = work;
    Ok(inliers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Coord;
    use crate::point::Point;
    use crate::synthetic::{line_model_1d, noisy_line_matches, Line1D};

    #[test]
    fn excludes_exactly_the_strong_outlier() {
        let mut matches = noisy_line_matches(Line1D { m: 1.5, b: -0.5 }, 24, 0.01, 5);
        let outlier = PointMatch::new(
            Point::new(Coord::<1>::new(3.0)),
            Point::new(Coord::<1>::new(100.0)),
        );
        matches.push(outlier.clone());

        let mut model = line_model_1d();
        let inliers = filter(&mut model, &matches, &FilterParams::default()).unwrap();

        assert_eq!(inliers.len(), matches.len() - 1);
        assert!(inliers.iter().all(|m| m.p2().w()[0] < 100.0));
        let (m, b) = model.parameters();
        assert!((m - 1.5).abs() < 0.05);
        assert!((b + 0.5).abs() < 0.05);
        assert!(model.cost() >= 0.0);
    }

    #[test]
    fn cost_becomes_mean_residual() {
        let matches = noisy_line_matches(Line1D { m: 2.0, b: 0.0 }, 16, 0.0, 9);
        let mut model = line_model_1d();
        filter(&mut model, &matches, &FilterParams::default()).unwrap();
        assert!(model.cost() < 1e-9, "cost {}", model.cost());
    }

    #[test]
    fn too_few_survivors_leave_model_unchanged() {
        let matches = noisy_line_matches(Line1D { m: 2.0, b: 0.0 }, 4, 0.0, 9);
        let mut model = line_model_1d();
        let before = model.parameters();
        let params = FilterParams {
            max_trust: 4.0,
            min_num_inliers: 10,
        };
        let err = filter(&mut model, &matches, &params).unwrap_err();
        assert_eq!(err, RobustError::NoConsensus);
        assert_eq!(model.parameters(), before);
    }
}
