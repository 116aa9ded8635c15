//! Linear interpolation between two models.

use mosaic_core::{Coord, FitError, Model, PointMatch, Real, Transform};
use serde::{Deserialize, Serialize};

/// A blend of two models, evaluated as
/// `(1 - lambda)·a(p) + lambda·b(p)`.
///
/// Fitting fits both component models on the same correspondences. The
/// canonical use is regularizing a higher-order model `a` with a
/// lower-order model `b` during optimization: a small `lambda` keeps the
/// expressive model honest without discarding it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InterpolatedModel<A, B, const D: usize> {
    a: A,
    b: B,
    lambda: Real,
    cost: Real,
}

impl<A: Model<D>, B: Model<D>, const D: usize> InterpolatedModel<A, B, D> {
    /// Blend `a` and `b` with mixing factor `lambda` in `[0, 1]`.
    pub fn new(a: A, b: B, lambda: Real) -> Self {
        Self {
            a,
            b,
            lambda,
            cost: -1.0,
        }
    }

    /// The expressive component.
    pub fn a(&self) -> &A {
        &self.a
    }

    /// The regularizing component.
    pub fn b(&self) -> &B {
        &self.b
    }

    /// Current mixing factor.
    pub fn lambda(&self) -> Real {
        self.lambda
    }

    /// Adjust the mixing factor.
    pub fn set_lambda(&mut self, lambda: Real) {
        self.lambda = lambda;
    }
}

impl<A: Transform<D>, B: Transform<D>, const D: usize> Transform<D>
    for InterpolatedModel<A, B, D>
{
    fn apply(&self, p: Coord<D>) -> Coord<D> {
        let pa = self.a.apply(p);
        let pb = self.b.apply(p);
        pa * (1.0 - self.lambda) + pb * self.lambda
    }
}

impl<A: Model<D>, B: Model<D>, const D: usize> Model<D> for InterpolatedModel<A, B, D> {
    fn min_num_matches(&self) -> usize {
        self.a.min_num_matches().max(self.b.min_num_matches())
    }

    fn fit(&mut self, matches: &[PointMatch<D>]) -> Result<(), FitError> {
        self.a.fit(matches)?;
        self.b.fit(matches)?;
        Ok(())
    }

    fn cost(&self) -> Real {
        self.cost
    }

    fn set_cost(&mut self, cost: Real) {
        self.cost = cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AffineModel2D, TranslationModel2D};
    use mosaic_core::synthetic::grid_matches_2d;

    #[test]
    fn lambda_zero_is_the_first_model() {
        let matches = grid_matches_2d(
            4,
            4,
            1.0,
            |p| Coord::<2>::new(1.3 * p.x + 2.0, 0.7 * p.y - 1.0),
            0.0,
            0,
        );
        let mut blend =
            InterpolatedModel::new(AffineModel2D::new(), TranslationModel2D::new(), 0.0);
        blend.fit(&matches).unwrap();

        let mut affine = AffineModel2D::new();
        affine.fit(&matches).unwrap();

        let p = Coord::<2>::new(1.5, 2.5);
        assert!((blend.apply(p) - affine.apply(p)).norm() < 1e-12);
    }

    #[test]
    fn blend_lies_between_components() {
        let matches = grid_matches_2d(
            4,
            4,
            1.0,
            |p| Coord::<2>::new(2.0 * p.x, 2.0 * p.y),
            0.0,
            0,
        );
        let mut blend =
            InterpolatedModel::new(AffineModel2D::new(), TranslationModel2D::new(), 0.5);
        blend.fit(&matches).unwrap();

        let mut affine = AffineModel2D::new();
        affine.fit(&matches).unwrap();
        let mut shift = TranslationModel2D::new();
        shift.fit(&matches).unwrap();

        let p = Coord::<2>::new(3.0, 0.0);
        let expected = (affine.apply(p) + shift.apply(p)) * 0.5;
        assert!((blend.apply(p) - expected).norm() < 1e-12);
    }

    #[test]
    fn min_matches_is_the_stricter_requirement() {
        let blend =
            InterpolatedModel::new(AffineModel2D::new(), TranslationModel2D::new(), 0.1);
        assert_eq!(blend.min_num_matches(), 3);
    }
}
