//! Runtime-selected 2D model.

use mosaic_core::{
    Coord, FitError, InvertibleTransform, Model, NoninvertibleModelError, PointMatch, Real,
    Transform,
};
use serde::{Deserialize, Serialize};

use crate::{
    AffineModel2D, HomographyModel2D, IdentityModel, RigidModel2D, SimilarityModel2D,
    TranslationModel2D,
};

/// The closed set of 2D model families, dispatching per variant.
///
/// The family is fixed and exhaustively known, so callers that pick a model
/// order at runtime (e.g. from a configuration file) match on this instead
/// of reaching for trait objects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum AnyModel2D {
    /// No transform.
    Identity(IdentityModel<2>),
    /// Offset only.
    Translation(TranslationModel2D),
    /// Rotation + offset.
    Rigid(RigidModel2D),
    /// Isotropic scale + rotation + offset.
    Similarity(SimilarityModel2D),
    /// Full affine.
    Affine(AffineModel2D),
    /// Plane projective.
    Homography(HomographyModel2D),
}

impl AnyModel2D {
    /// Fresh identity-state model of the given order, counted up from the
    /// most rigid family.
    pub fn identity() -> Self {
        Self::Identity(IdentityModel::new())
    }

    /// Fresh translation model.
    pub fn translation() -> Self {
        Self::Translation(TranslationModel2D::new())
    }

    /// Fresh rigid model.
    pub fn rigid() -> Self {
        Self::Rigid(RigidModel2D::new())
    }

    /// Fresh similarity model.
    pub fn similarity() -> Self {
        Self::Similarity(SimilarityModel2D::new())
    }

    /// Fresh affine model.
    pub fn affine() -> Self {
        Self::Affine(AffineModel2D::new())
    }

    /// Fresh homography model.
    pub fn homography() -> Self {
        Self::Homography(HomographyModel2D::new())
    }
}

impl Transform<2> for AnyModel2D {
    fn apply(&self, p: Coord<2>) -> Coord<2> {
        match self {
            Self::Identity(m) => m.apply(p),
            Self::Translation(m) => m.apply(p),
            Self::Rigid(m) => m.apply(p),
            Self::Similarity(m) => m.apply(p),
            Self::Affine(m) => m.apply(p),
            Self::Homography(m) => m.apply(p),
        }
    }
}

impl InvertibleTransform<2> for AnyModel2D {
    fn apply_inverse(&self, p: Coord<2>) -> Result<Coord<2>, NoninvertibleModelError> {
        match self {
            Self::Identity(m) => m.apply_inverse(p),
            Self::Translation(m) => m.apply_inverse(p),
            Self::Rigid(m) => m.apply_inverse(p),
            Self::Similarity(m) => m.apply_inverse(p),
            Self::Affine(m) => m.apply_inverse(p),
            Self::Homography(m) => m.apply_inverse(p),
        }
    }
}

impl Model<2> for AnyModel2D {
    fn min_num_matches(&self) -> usize {
        match self {
            Self::Identity(m) => m.min_num_matches(),
            Self::Translation(m) => m.min_num_matches(),
            Self::Rigid(m) => m.min_num_matches(),
            Self::Similarity(m) => m.min_num_matches(),
            Self::Affine(m) => m.min_num_matches(),
            Self::Homography(m) => m.min_num_matches(),
        }
    }

    fn fit(&mut self, matches: &[PointMatch<2>]) -> Result<(), FitError> {
        match self {
            Self::Identity(m) => m.fit(matches),
            Self::Translation(m) => m.fit(matches),
            Self::Rigid(m) => m.fit(matches),
            Self::Similarity(m) => m.fit(matches),
            Self::Affine(m) => m.fit(matches),
            Self::Homography(m) => m.fit(matches),
        }
    }

    fn cost(&self) -> Real {
        match self {
            Self::Identity(m) => m.cost(),
            Self::Translation(m) => m.cost(),
            Self::Rigid(m) => m.cost(),
            Self::Similarity(m) => m.cost(),
            Self::Affine(m) => m.cost(),
            Self::Homography(m) => m.cost(),
        }
    }

    fn set_cost(&mut self, cost: Real) {
        match self {
            Self::Identity(m) => m.set_cost(cost),
            Self::Translation(m) => m.set_cost(cost),
            Self::Rigid(m) => m.set_cost(cost),
            Self::Similarity(m) => m.set_cost(cost),
            Self::Affine(m) => m.set_cost(cost),
            Self::Homography(m) => m.set_cost(cost),
        }
    }
}
