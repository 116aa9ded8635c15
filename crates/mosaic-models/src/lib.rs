//! Concrete parametric transform models.
//!
//! Every model implements the `mosaic-core` capability traits with a
//! closed-form (or SVD-based) weighted least-squares fit:
//!
//! - [`IdentityModel`]: the do-nothing placeholder,
//! - [`TranslationModel`]: pure offset, any dimension,
//! - [`RigidModel2D`] / [`RigidModel3D`]: rotation + translation,
//! - [`SimilarityModel2D`] / [`SimilarityModel3D`]: isotropic scale on top,
//! - [`AffineModel1D`] / [`AffineModel2D`] / [`AffineModel3D`]: full affine,
//! - [`HomographyModel2D`]: plane projective transform,
//! - [`ConstantModel`] / [`InterpolatedModel`]: regularization wrappers,
//! - [`AnyModel2D`]: closed sum type over the 2D family for callers that
//!   select model order at runtime.
//!
//! All models cache their inverse parameters and recompute them on every
//! mutation; applying the inverse of a singular model fails with
//! `NoninvertibleModelError`.

mod affine;
mod any2d;
mod constant;
mod homography;
mod identity;
mod interpolated;
mod rigid;
mod similarity;
mod translation;

pub use affine::{AffineModel1D, AffineModel2D, AffineModel3D};
pub use any2d::AnyModel2D;
pub use constant::ConstantModel;
pub use homography::HomographyModel2D;
pub use identity::IdentityModel;
pub use interpolated::InterpolatedModel;
pub use rigid::{RigidModel2D, RigidModel3D};
pub use similarity::{SimilarityModel2D, SimilarityModel3D};
pub use translation::{
    TranslationModel, TranslationModel1D, TranslationModel2D, TranslationModel3D,
};

pub(crate) mod centroid;
