//! Iterative closest point matching.

use serde::{Deserialize, Serialize};

use crate::error::RobustError;
use crate::model::Model;
use crate::point::Point;
use crate::point_match::PointMatch;

/// Configuration for [`icp`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcpParams {
    /// Hard bound on the number of match/fit rounds.
    pub max_iterations: usize,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
        }
    }
}

/// Align the point set `p` onto `q` by alternating nearest-neighbour
/// matching and model fitting.
///
/// Each round matches every point of `p` to its nearest neighbour in `q` by
/// Euclidean distance in world space (brute force, `O(|p|·|q|)`), fits
/// `model` to the resulting correspondences and applies it to `p`. The loop
/// stops when the correspondence set is unchanged between rounds (compared
/// by value on the index pairing) or after `max_iterations` rounds.
///
/// On success the final correspondence set is returned and the world
/// coordinates of `p` reflect the fitted model.
pub fn icp<const D: usize, M: Model<D>>(
    model: &mut M,
    p: &mut [Point<D>],
    q: &[Point<D>],
    params: &IcpParams,
) -> Result<Vec<PointMatch<D>>, RobustError> {
    if p.is_empty() || q.is_empty() {
        return Err(crate::error::FitError::NotEnoughDataPoints {
            required: model.min_num_matches(),
            given: 0,
        }
        .into());
    }

    let mut previous_pairing: Option<Vec<usize>> = None;
    let mut matches: Vec<PointMatch<D>> = Vec::with_capacity(p.len());

    for _ in 0..params.max_iterations {
        let mut pairing = Vec::with_capacity(p.len());
        matches.clear();
        for pi in p.iter() {
            let mut best = 0;
            let mut best_d = Point::square_distance(pi, &q[0]);
            for (j, qj) in q.iter().enumerate().skip(1) {
                let d = Point::square_distance(pi, qj);
                if d < best_d {
                    best_d = d;
                    best = j;
                }
            }
            pairing.push(best);
            matches.push(PointMatch::new(*pi, q[best]));
        }

        if previous_pairing.as_deref() == Some(pairing.as_slice()) {
            break;
        }
        previous_pairing = Some(pairing);

        model.fit(&matches)?;
        for pi in p.iter_mut() {
            pi.apply(model);
        }
        // Keep the returned matches consistent with the applied model.
        for m in matches.iter_mut() {
            m.apply(model);
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Coord;
    use crate::synthetic::line_model_1d;

    #[test]
    fn aligns_shifted_1d_set() {
        // q = p + 0.4 with matching order; ICP should find the pairing and
        // collapse the offset.
        let mut p: Vec<Point<1>> = (0..10)
            .map(|i| Point::new(Coord::<1>::new(i as f64)))
            .collect();
        let q: Vec<Point<1>> = (0..10)
            .map(|i| Point::new(Coord::<1>::new(i as f64 + 0.4)))
            .collect();

        let mut model = line_model_1d();
        let matches = icp(&mut model, &mut p, &q, &IcpParams::default()).unwrap();

        assert_eq!(matches.len(), 10);
        for (i, pi) in p.iter().enumerate() {
            assert!(
                (pi.w()[0] - (i as f64 + 0.4)).abs() < 1e-9,
                "point {} at {}",
                i,
                pi.w()[0]
            );
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        let mut model = line_model_1d();
        let mut p: Vec<Point<1>> = Vec::new();
        let q = vec![Point::new(Coord::<1>::new(0.0))];
        assert!(icp(&mut model, &mut p, &q, &IcpParams::default()).is_err());
    }
}
