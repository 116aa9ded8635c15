//! Pure translation in any dimension.

use mosaic_core::{
    Coord, FitError, InvertibleTransform, Model, NoninvertibleModelError, PointMatch, Real,
    Transform,
};
use serde::{Deserialize, Serialize};

use crate::centroid::{require_matches, weighted_centroids};

/// 1D translation.
pub type TranslationModel1D = TranslationModel<1>;
/// 2D translation.
pub type TranslationModel2D = TranslationModel<2>;
/// 3D translation.
pub type TranslationModel3D = TranslationModel<3>;

/// A pure offset `p ↦ p + t`.
///
/// The weighted least-squares solution is the difference of the weighted
/// centroids of targets and sources, so a single correspondence suffices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TranslationModel<const D: usize> {
    t: Coord<D>,
    cost: Real,
}

impl<const D: usize> TranslationModel<D> {
    /// Identity translation with unset cost.
    pub fn new() -> Self {
        Self {
            t: Coord::<D>::zeros(),
            cost: -1.0,
        }
    }

    /// Current offset vector.
    pub fn translation(&self) -> &Coord<D> {
        &self.t
    }

    /// Overwrite the offset vector.
    pub fn set(&mut self, t: Coord<D>) {
        self.t = t;
    }

    /// Append `other` (applied after this model). For translations both
    /// concatenation orders coincide.
    pub fn concatenate(&mut self, other: &Self) {
        self.t += other.t;
    }

    /// Prepend `other` (applied before this model).
    pub fn pre_concatenate(&mut self, other: &Self) {
        self.t += other.t;
    }
}

impl<const D: usize> Default for TranslationModel<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> Transform<D> for TranslationModel<D> {
    fn apply(&self, p: Coord<D>) -> Coord<D> {
        p + self.t
    }
}

impl<const D: usize> InvertibleTransform<D> for TranslationModel<D> {
    fn apply_inverse(&self, p: Coord<D>) -> Result<Coord<D>, NoninvertibleModelError> {
        Ok(p - self.t)
    }
}

impl<const D: usize> Model<D> for TranslationModel<D> {
    fn min_num_matches(&self) -> usize {
        1
    }

    fn fit(&mut self, matches: &[PointMatch<D>]) -> Result<(), FitError> {
        require_matches(matches, self.min_num_matches())?;
        let (pc, qc, _) = weighted_centroids(matches)?;
        self.t = qc - pc;
        Ok(())
    }

    fn cost(&self) -> Real {
        self.cost
    }

    fn set_cost(&mut self, cost: Real) {
        self.cost = cost;
    }
}
