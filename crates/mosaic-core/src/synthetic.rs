//! Synthetic correspondence generators.
//!
//! This module is public to allow use across workspace test suites and the
//! demos, but is not intended for production use. All generators take an
//! explicit seed; jitter is uniform in `[-amplitude, amplitude]`.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::FitError;
use crate::math::{Coord, Real};
use crate::model::{Model, Transform};
use crate::point::Point;
use crate::point_match::PointMatch;

/// Ground-truth parameters of a 1D line `y = m·x + b`.
#[derive(Debug, Clone, Copy)]
pub struct Line1D {
    /// Slope.
    pub m: Real,
    /// Intercept.
    pub b: Real,
}

/// A 1D affine map `y = m·x + b` fit by weighted least squares.
///
/// This is the minimal non-trivial [`Model`] and serves as the reference
/// implementation the generic robust layer is tested against, the same way
/// a line estimator exercises a generic RANSAC engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LineModel1D {
    m: Real,
    b: Real,
    cost: Real,
}

impl LineModel1D {
    /// Identity line with unset cost.
    pub fn new() -> Self {
        Self {
            m: 1.0,
            b: 0.0,
            cost: -1.0,
        }
    }

    /// Current `(slope, intercept)`.
    pub fn parameters(&self) -> (Real, Real) {
        (self.m, self.b)
    }
}

impl Default for LineModel1D {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<1> for LineModel1D {
    fn apply(&self, p: Coord<1>) -> Coord<1> {
        Coord::<1>::new(self.m * p[0] + self.b)
    }
}

impl Model<1> for LineModel1D {
    fn min_num_matches(&self) -> usize {
        2
    }

    fn fit(&mut self, matches: &[PointMatch<1>]) -> Result<(), FitError> {
        if matches.len() < 2 {
            return Err(FitError::NotEnoughDataPoints {
                required: 2,
                given: matches.len(),
            });
        }
        let mut sw = 0.0;
        let mut sx = 0.0;
        let mut sy = 0.0;
        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for m in matches {
            let w = m.weight();
            let x = m.p1().l()[0];
            let y = m.p2().w()[0];
            sw += w;
            sx += w * x;
            sy += w * y;
            sxx += w * x * x;
            sxy += w * x * y;
        }
        let det = sw * sxx - sx * sx;
        if det == 0.0 {
            return Err(FitError::IllDefinedDataPoints(
                "all weighted points share one abscissa",
            ));
        }
        self.m = (sw * sxy - sx * sy) / det;
        self.b = (sy - self.m * sx) / sw;
        Ok(())
    }

    fn cost(&self) -> Real {
        self.cost
    }

    fn set_cost(&mut self, cost: Real) {
        self.cost = cost;
    }
}

/// Fresh [`LineModel1D`] in its identity state.
pub fn line_model_1d() -> LineModel1D {
    LineModel1D::new()
}

/// Correspondences `(x = i) -> (y = m·x + b + jitter)` for `i = 0..n`.
pub fn noisy_line_matches(line: Line1D, n: usize, amplitude: Real, seed: u64) -> Vec<PointMatch<1>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let x = i as Real;
            let y = line.m * x + line.b + jitter(&mut rng, amplitude);
            PointMatch::new(Point::new(Coord::<1>::new(x)), Point::new(Coord::<1>::new(y)))
        })
        .collect()
}

/// Correspondences on a `cols × rows` grid mapped through `f`, with uniform
/// jitter applied to the target side.
pub fn grid_matches_2d<F>(
    cols: usize,
    rows: usize,
    spacing: Real,
    f: F,
    amplitude: Real,
    seed: u64,
) -> Vec<PointMatch<2>>
where
    F: Fn(Coord<2>) -> Coord<2>,
{
    let mut rng = StdRng::seed_from_u64(seed);
    let mut matches = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        for c in 0..cols {
            let p = Coord::<2>::new(c as Real * spacing, r as Real * spacing);
            let mut q = f(p);
            q.x += jitter(&mut rng, amplitude);
            q.y += jitter(&mut rng, amplitude);
            matches.push(PointMatch::new(Point::new(p), Point::new(q)));
        }
    }
    matches
}

/// Correspondences on a random 3D cloud in `[0, extent]³` mapped through
/// `f`, with uniform jitter applied to the target side.
pub fn scatter_matches_3d<F>(
    n: usize,
    extent: Real,
    f: F,
    amplitude: Real,
    seed: u64,
) -> Vec<PointMatch<3>>
where
    F: Fn(Coord<3>) -> Coord<3>,
{
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let p = Coord::<3>::new(
                rng.random_range(0.0..extent),
                rng.random_range(0.0..extent),
                rng.random_range(0.0..extent),
            );
            let mut q = f(p);
            for k in 0..3 {
                q[k] += jitter(&mut rng, amplitude);
            }
            PointMatch::new(Point::new(p), Point::new(q))
        })
        .collect()
}

fn jitter(rng: &mut StdRng, amplitude: Real) -> Real {
    if amplitude > 0.0 {
        rng.random_range(-amplitude..amplitude)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_fit_recovers_exact_parameters() {
        let matches = noisy_line_matches(Line1D { m: 1.5, b: -0.5 }, 12, 0.0, 0);
        let mut model = line_model_1d();
        model.fit(&matches).unwrap();
        let (m, b) = model.parameters();
        assert_eq!(m, 1.5);
        assert_eq!(b, -0.5);
    }

    #[test]
    fn line_fit_detects_degenerate_abscissa() {
        let p = Point::new(Coord::<1>::new(2.0));
        let matches = vec![
            PointMatch::new(p, Point::new(Coord::<1>::new(1.0))),
            PointMatch::new(p, Point::new(Coord::<1>::new(3.0))),
        ];
        let mut model = line_model_1d();
        assert!(matches!(
            model.fit(&matches),
            Err(FitError::IllDefinedDataPoints(_))
        ));
    }

    #[test]
    fn generators_are_seed_deterministic() {
        let a = grid_matches_2d(4, 3, 1.0, |p| p, 0.1, 5);
        let b = grid_matches_2d(4, 3, 1.0, |p| p, 0.1, 5);
        assert_eq!(a.len(), 12);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.p2().w(), y.p2().w());
        }
    }
}
