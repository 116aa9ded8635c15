//! Mathematical utilities and type definitions.
//!
//! This module provides the fundamental scalar and linear-algebra types used
//! throughout the workspace and a few helpers for homogeneous coordinates.

use nalgebra::{Matrix2, Matrix3, Matrix4, Point2, Point3, SVector, Vector2, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// Fixed-size coordinate vector with [`Real`] components.
pub type Coord<const D: usize> = SVector<Real, D>;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 2×2 matrix with [`Real`] entries.
pub type Mat2 = Matrix2<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;

/// Convert a 2D coordinate into homogeneous coordinates `(x, y, 1)`.
pub fn to_homogeneous(p: &Vec2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

/// Convert a 3D homogeneous vector back to a 2D coordinate.
///
/// The input is interpreted as `(x, y, w)` and the result is `(x / w, y / w)`.
/// The caller is responsible for ensuring that `w != 0`.
pub fn from_homogeneous(v: &Vec3) -> Vec2 {
    Vec2::new(v.x / v.z, v.y / v.z)
}

/// Replace non-finite coordinate components by `1.0`.
///
/// Decompositions (SVD in particular) do not tolerate NaN/Inf input; fits on
/// externally supplied correspondences sanitize coordinates through this
/// helper before assembling constraint matrices.
pub fn sanitize_coordinate<const D: usize>(c: &Coord<D>) -> Coord<D> {
    c.map(|v| if v.is_finite() { v } else { 1.0 })
}
