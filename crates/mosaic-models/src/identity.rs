//! The identity model.

use mosaic_core::{Coord, FitError, InvertibleTransform, Model, NoninvertibleModelError, PointMatch, Real, Transform};
use serde::{Deserialize, Serialize};

/// A model that maps every coordinate onto itself.
///
/// Fitting requires no data and never changes anything; it exists so that
/// generic code can treat "no transform" like any other model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IdentityModel<const D: usize> {
    cost: Real,
}

impl<const D: usize> IdentityModel<D> {
    /// Create an identity model with unset cost.
    pub fn new() -> Self {
        Self { cost: -1.0 }
    }
}

impl<const D: usize> Transform<D> for IdentityModel<D> {
    fn apply(&self, p: Coord<D>) -> Coord<D> {
        p
    }
}

impl<const D: usize> InvertibleTransform<D> for IdentityModel<D> {
    fn apply_inverse(&self, p: Coord<D>) -> Result<Coord<D>, NoninvertibleModelError> {
        Ok(p)
    }
}

impl<const D: usize> Model<D> for IdentityModel<D> {
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

    #[test]
    fn identity_round_trip() {
        let m = IdentityModel::<3>::new();
        let p = Coord::<3>::new(1.0, -2.0, 0.5);
        assert_eq!(m.apply(p), p);
        assert_eq!(m.apply_inverse(p).unwrap(), p);
    }
}
