//! Global relaxation of a tile graph.
//!
//! A [`Tile`] is a rigid unit (one image of a mosaic) owning a model and the
//! correspondences linking it to its neighbours. A [`TileConfiguration`]
//! owns the whole graph in an index-addressed arena and relaxes it by
//! repeated per-tile least-squares fits until the shared correspondences
//! agree:
//!
//! - [`TileConfiguration::optimize`]: sequential relaxation,
//! - [`TileConfiguration::optimize_and_filter`]: relaxation with outer
//!   trimming of the worst-agreeing connection,
//! - [`TileConfiguration::pre_align`]: breadth-first seeding for model
//!   families whose fits do not converge from a cold start,
//! - [`optimize_concurrently`]: the same relaxation with intra-iteration
//!   parallelism; graph-adjacent tiles are never updated at the same time.

mod configuration;
mod scheduler;
mod tile;

pub use configuration::{OptimizeOptions, OptimizeReport, TileConfiguration};
pub use scheduler::optimize_concurrently;
pub use tile::{Tile, TileState};
