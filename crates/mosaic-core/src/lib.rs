//! Core primitives for the `mosaic-rs` registration toolbox.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt2`, ...),
//! - the `Point` / `PointMatch` correspondence primitives,
//! - the `Transform` / `InvertibleTransform` / `Model` capability traits,
//! - a generic robust-estimation engine (`ransac`, `filter`,
//!   `local_smoothness_filter`, `icp`) implemented once against [`Model`],
//! - the rolling [`ErrorStatistic`] tracker shared by every optimizer's
//!   convergence test.
//!
//! Concrete parametric models live in `mosaic-models`; meshes and graph
//! optimizers build on both.

/// Error taxonomy shared across the workspace.
pub mod error;
/// Rolling mean/median/slope tracker.
pub mod error_statistic;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Capability traits for coordinate transforms and fittable models.
pub mod model;
/// A 2D/3D point with local and world coordinates.
pub mod point;
/// A weighted, directed correspondence between two points.
pub mod point_match;
/// Generic robust estimation built on the [`Model`] trait.
pub mod robust;
/// Synthetic correspondence generators for tests and demos.
pub mod synthetic;

pub use error::*;
pub use error_statistic::*;
pub use math::*;
pub use model::*;
pub use point::*;
pub use point_match::*;
pub use robust::*;
