//! High-level entry crate for the `mosaic-rs` toolbox.
//!
//! This crate re-exports the workspace layers under stable module names:
//!
//! - [`core`]: points, correspondences, model traits, the generic robust
//!   estimation engine (RANSAC, trimmed regression, local smoothness, ICP),
//! - [`models`]: the concrete model family with closed-form weighted fits,
//! - [`mesh`]: piecewise-affine meshes, moving least squares and spring
//!   relaxation,
//! - [`optim`]: the tile graph with sequential and concurrent global
//!   relaxation.
//!
//! # Fitting a single model
//!
//! ```
//! use mosaic::prelude::*;
//!
//! let matches = mosaic::core::synthetic::grid_matches_2d(
//!     5,
//!     5,
//!     10.0,
//!     |p| p + Vec2::new(17.0, -4.0),
//!     0.0,
//!     0,
//! );
//! let mut model = TranslationModel2D::new();
//! model.fit(&matches)?;
//! assert!((model.translation() - Vec2::new(17.0, -4.0)).norm() < 1e-9);
//! # Ok::<(), mosaic::core::FitError>(())
//! ```
//!
//! # Relaxing a tile graph
//!
//! ```
//! use mosaic::prelude::*;
//!
//! let mut config = TileConfiguration::new();
//! let a = config.add_tile(TranslationModel2D::new());
//! let b = config.add_tile(TranslationModel2D::new());
//! config.fix_tile(a);
//! let matches: Vec<PointMatch<2>> = (0..4)
//!     .map(|i| {
//!         let l = Vec2::new(i as f64, (i * i) as f64);
//!         PointMatch::new(Point::new(l), Point::new(l))
//!     })
//!     .collect();
//! config.connect(a, b, &matches);
//! let report = config.optimize(&OptimizeOptions::default())?;
//! assert!(report.final_error < 1e-9);
//! # Ok::<(), mosaic::core::FitError>(())
//! ```

/// Primitives, traits and the robust-estimation engine.
pub mod core {
    pub use mosaic_core::*;

    /// Synthetic correspondence generators.
    pub mod synthetic {
        pub use mosaic_core::synthetic::*;
    }
}

/// Concrete transform models.
pub mod models {
    pub use mosaic_models::*;
}

/// Mesh-based non-parametric transforms.
pub mod mesh {
    pub use mosaic_mesh::*;
}

/// Tile-graph global relaxation.
pub mod optim {
    pub use mosaic_optim::*;
}

/// The names most callers want in scope.
pub mod prelude {
    pub use crate::core::{
        filter, filter_ransac, icp, local_smoothness_filter, ransac, ErrorStatistic, FilterParams,
        FitError, IcpParams, InvertibleTransform, Model, NoninvertibleModelError, Point,
        PointMatch, RansacParams, Real, RobustError, SmoothnessParams, Transform, Vec2,
    };
    pub use crate::mesh::{
        optimize_meshes, ElasticMovingLeastSquaresMesh, MovingLeastSquaresTransform, RelaxOptions,
        SpringMesh, TransformMesh,
    };
    pub use crate::models::{
        AffineModel1D, AffineModel2D, AffineModel3D, AnyModel2D, ConstantModel, HomographyModel2D,
        IdentityModel, InterpolatedModel, RigidModel2D, RigidModel3D, SimilarityModel2D,
        SimilarityModel3D, TranslationModel1D, TranslationModel2D, TranslationModel3D,
    };
    pub use crate::optim::{
        optimize_concurrently, OptimizeOptions, OptimizeReport, Tile, TileConfiguration,
    };
}
