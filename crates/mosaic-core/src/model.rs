//! Capability traits for coordinate transforms and fittable models.
//!
//! The split mirrors what callers actually need:
//! - [`Transform`]: pixel-mapping code drives a fitted transform through
//!   `apply`/`apply_in_place` and nothing else,
//! - [`InvertibleTransform`]: adds the inverse direction, which can fail
//!   when the forward determinant is zero,
//! - [`Model`]: adds fitting from weighted correspondences and a scalar
//!   cost, which is everything the robust-estimation layer operates on.

use crate::error::{FitError, NoninvertibleModelError};
use crate::math::{Coord, Real};
use crate::point_match::PointMatch;

/// A coordinate transform in `D` dimensions.
pub trait Transform<const D: usize> {
    /// Map a coordinate from the source into the target frame.
    fn apply(&self, p: Coord<D>) -> Coord<D>;

    /// Map a coordinate in place.
    fn apply_in_place(&self, p: &mut Coord<D>) {
        *p = self.apply(*p);
    }
}

/// A transform whose inverse direction is available.
pub trait InvertibleTransform<const D: usize>: Transform<D> {
    /// Map a coordinate from the target back into the source frame.
    ///
    /// Fails with [`NoninvertibleModelError`] when the forward transform has
    /// a zero determinant (or, for piecewise transforms, when the coordinate
    /// lies outside the mapped domain).
    fn apply_inverse(&self, p: Coord<D>) -> Result<Coord<D>, NoninvertibleModelError>;

    /// Map a coordinate back in place.
    fn apply_inverse_in_place(&self, p: &mut Coord<D>) -> Result<(), NoninvertibleModelError> {
        *p = self.apply_inverse(*p)?;
        Ok(())
    }
}

/// A parametric transform that can be estimated from weighted point
/// correspondences.
///
/// Models are mutated in place by [`Model::fit`] and carry a scalar cost
/// (lower is better). A cost below zero means "not evaluated yet" and is
/// excluded from comparisons by [`Model::better_than`].
pub trait Model<const D: usize>: Transform<D> + Clone {
    /// Minimal number of correspondences required by [`Model::fit`].
    fn min_num_matches(&self) -> usize;

    /// Estimate the parameters from weighted correspondences, solving a
    /// closed-form weighted least-squares (or SVD) problem.
    ///
    /// The fit maps each match's `p1` local coordinate onto its `p2` world
    /// coordinate, weighted by the match weight.
    fn fit(&mut self, matches: &[PointMatch<D>]) -> Result<(), FitError>;

    /// Scalar cost of the model; lower is better, negative means unset.
    fn cost(&self) -> Real;

    /// Overwrite the scalar cost.
    fn set_cost(&mut self, cost: Real);

    /// Whether this model compares strictly better than `other`.
    ///
    /// A model with unset (negative) cost is never better; any evaluated
    /// model beats an unevaluated one.
    fn better_than(&self, other: &Self) -> bool {
        if self.cost() < 0.0 {
            return false;
        }
        if other.cost() < 0.0 {
            return true;
        }
        self.cost() < other.cost()
    }

    /// World-space residual of one correspondence under this model.
    fn residual(&self, m: &PointMatch<D>) -> Real {
        (self.apply(*m.p1().l()) - m.p2().w()).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    /// 1D scale model used to exercise the trait defaults.
    #[derive(Debug, Clone)]
    struct Scale1D {
        s: Real,
        cost: Real,
    }

    impl Transform<1> for Scale1D {
        fn apply(&self, p: Coord<1>) -> Coord<1> {
            p * self.s
        }
    }

    impl Model<1> for Scale1D {
        fn min_num_matches(&self) -> usize {
            1
        }

        fn fit(&mut self, matches: &[PointMatch<1>]) -> Result<(), FitError> {
            if matches.is_empty() {
                return Err(FitError::NotEnoughDataPoints {
                    required: 1,
                    given: 0,
                });
            }
            let mut num = 0.0;
            let mut den = 0.0;
            for m in matches {
                num += m.weight() * m.p1().l()[0] * m.p2().w()[0];
                den += m.weight() * m.p1().l()[0] * m.p1().l()[0];
            }
            if den == 0.0 {
                return Err(FitError::IllDefinedDataPoints("all points at origin"));
            }
            self.s = num / den;
            Ok(())
        }

        fn cost(&self) -> Real {
            self.cost
        }

        fn set_cost(&mut self, cost: Real) {
            self.cost = cost;
        }
    }

    fn m1(x: Real, y: Real) -> PointMatch<1> {
        PointMatch::new(Point::new(Coord::<1>::new(x)), Point::new(Coord::<1>::new(y)))
    }

    #[test]
    fn better_than_ignores_unset_cost() {
        let unset = Scale1D { s: 1.0, cost: -1.0 };
        let good = Scale1D { s: 1.0, cost: 0.5 };
        let better = Scale1D { s: 1.0, cost: 0.1 };
        assert!(!unset.better_than(&good));
        assert!(good.better_than(&unset));
        assert!(better.better_than(&good));
        assert!(!good.better_than(&better));
    }

    #[test]
    fn residual_uses_local_to_world() {
        let mut model = Scale1D { s: 0.0, cost: -1.0 };
        model.fit(&[m1(1.0, 2.0), m1(2.0, 4.0)]).unwrap();
        assert!((model.s - 2.0).abs() < 1e-12);
        assert!(model.residual(&m1(3.0, 6.0)) < 1e-12);
        assert!((model.residual(&m1(3.0, 7.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fit_rejects_empty_input() {
        let mut model = Scale1D { s: 1.0, cost: -1.0 };
        assert_eq!(
            model.fit(&[]),
            Err(FitError::NotEnoughDataPoints {
                required: 1,
                given: 0
            })
        );
    }
}
