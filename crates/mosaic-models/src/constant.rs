//! A wrapper that freezes an inner model.

use mosaic_core::{
    Coord, FitError, InvertibleTransform, Model, NoninvertibleModelError, PointMatch, Real,
    Transform,
};
use serde::{Deserialize, Serialize};

/// A model whose parameters never change.
///
/// Fitting is a no-op, so a `ConstantModel` can sit anywhere a fittable
/// model is expected while keeping its transform fixed, e.g. to pin one
/// component of a composed model during optimization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConstantModel<M, const D: usize> {
    inner: M,
    cost: Real,
}

impl<M: Model<D>, const D: usize> ConstantModel<M, D> {
    /// Freeze `inner` in its current state.
    pub fn new(inner: M) -> Self {
        Self { inner, cost: -1.0 }
    }

    /// The frozen model.
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: Transform<D>, const D: usize> Transform<D> for ConstantModel<M, D> {
    fn apply(&self, p: Coord<D>) -> Coord<D> {
        self.inner.apply(p)
    }
}

impl<M: InvertibleTransform<D>, const D: usize> InvertibleTransform<D> for ConstantModel<M, D> {
    fn apply_inverse(&self, p: Coord<D>) -> Result<Coord<D>, NoninvertibleModelError> {
        self.inner.apply_inverse(p)
    }
}

impl<M: Model<D>, const D: usize> Model<D> for ConstantModel<M, D> {
    fn min_num_matches(&self) -> usize {
        0
    }

    fn fit(&mut self, _matches: &[PointMatch<D>]) -> Result<(), FitError> {
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
    use crate::TranslationModel2D;
    use mosaic_core::synthetic::grid_matches_2d;

    #[test]
    fn fit_does_not_move_the_inner_model() {
        let mut inner = TranslationModel2D::new();
        inner.set(Coord::<2>::new(5.0, 5.0));
        let mut frozen = ConstantModel::new(inner);

        let matches = grid_matches_2d(3, 3, 1.0, |p| p + Coord::<2>::new(-9.0, 0.0), 0.0, 0);
        frozen.fit(&matches).unwrap();

        assert_eq!(
            frozen.apply(Coord::<2>::zeros()),
            Coord::<2>::new(5.0, 5.0)
        );
    }
}
