//! Mesh-specific errors.

use thiserror::Error;

/// Failure modes of mesh construction and vertex attachment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    /// A location meant to be attached lies outside every triangle.
    #[error("location ({0}, {1}) lies outside the mesh domain")]
    OutsideDomain(f64, f64),
    /// A vertex index does not exist in the mesh.
    #[error("vertex index {0} out of bounds")]
    InvalidVertex(usize),
}
