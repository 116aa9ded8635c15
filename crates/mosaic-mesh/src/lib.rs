//! Mesh-based non-parametric transforms.
//!
//! Three representations of a smooth deformation of a rectangular domain:
//!
//! - [`TransformMesh`]: a triangulated grid with one affine transform per
//!   triangle, driven directly by moving its vertices,
//! - [`MovingLeastSquaresTransform`]: a deformation computed per query by a
//!   freshly weighted local model fit against a set of control points,
//! - [`SpringMesh`] / [`ElasticMovingLeastSquaresMesh`]: the triangulated
//!   mesh relaxed as a mass-spring system with explicit-Euler dynamics.

mod elastic_mls;
mod error;
mod moving_least_squares;
mod spring;
mod spring_mesh;
mod transform_mesh;
mod vertex;

pub use elastic_mls::ElasticMovingLeastSquaresMesh;
pub use error::MeshError;
pub use moving_least_squares::MovingLeastSquaresTransform;
pub use spring::Spring;
pub use spring_mesh::{optimize_meshes, RelaxOptions, RelaxReport, SpringMesh};
pub use transform_mesh::TransformMesh;
pub use vertex::SpringVertex;
