//! Cross-layer registration scenarios.

use mosaic::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Affine-warped correspondences with uniform noise and a block of gross
/// mismatches at the end.
fn contaminated_affine_matches() -> (AffineModel2D, Vec<PointMatch<2>>) {
    let mut truth = AffineModel2D::new();
    truth.set([1.05, 0.12, 8.0, -0.1, 0.95, -3.0]);

    let mut rng = StdRng::seed_from_u64(41);
    let mut matches = Vec::new();
    for r in 0..8 {
        for c in 0..8 {
            let p = Vec2::new(c as f64 * 12.0, r as f64 * 12.0);
            let mut q = truth.apply(p);
            q += Vec2::new(rng.random_range(-0.05..0.05), rng.random_range(-0.05..0.05));
            matches.push(PointMatch::new(Point::new(p), Point::new(q)));
        }
    }
    for k in 0..10 {
        let p = Vec2::new(k as f64 * 9.0, 50.0);
        let q = Vec2::new(-200.0 + k as f64, 300.0);
        matches.push(PointMatch::new(Point::new(p), Point::new(q)));
    }
    (truth, matches)
}

#[test]
fn filter_ransac_recovers_a_contaminated_affine() {
    let (truth, matches) = contaminated_affine_matches();

    let mut model = AffineModel2D::new();
    let inliers = filter_ransac(
        &mut model,
        &matches,
        &RansacParams {
            iterations: 500,
            epsilon: 0.5,
            min_inlier_ratio: 0.5,
            min_num_inliers: 16,
            seed: 23,
        },
        &FilterParams::default(),
    )
    .expect("consensus exists");

    assert!(inliers.len() >= 60, "only {} inliers", inliers.len());
    for p in [Vec2::new(0.0, 0.0), Vec2::new(50.0, 30.0), Vec2::new(90.0, 90.0)] {
        assert!(
            (model.apply(p) - truth.apply(p)).norm() < 0.2,
            "model deviates at ({}, {})",
            p.x,
            p.y
        );
    }
}

#[test]
fn mesh_follows_a_fitted_model() {
    // Fit a model robustly, then drive a transform mesh with it: the mesh
    // must agree with the model over the whole domain, and invert cleanly.
    let (_, matches) = contaminated_affine_matches();
    let mut model = AffineModel2D::new();
    filter_ransac(
        &mut model,
        &matches,
        &RansacParams {
            iterations: 500,
            epsilon: 0.5,
            min_inlier_ratio: 0.5,
            min_num_inliers: 16,
            seed: 23,
        },
        &FilterParams::default(),
    )
    .expect("consensus exists");

    let mut mesh = TransformMesh::new(6, 100.0, 100.0);
    for i in 0..mesh.num_vertices() {
        let l = *mesh.vertex(i).l();
        mesh.set_world(i, model.apply(l));
    }
    mesh.update_affines().unwrap();

    for p in [
        Vec2::new(3.0, 7.0),
        Vec2::new(55.5, 44.5),
        Vec2::new(99.0, 99.0),
    ] {
        let q = mesh.apply(p);
        assert!((q - model.apply(p)).norm() < 1e-9);
        let back = mesh.apply_inverse(q).unwrap();
        assert!((back - p).norm() < 1e-9);
    }
}

#[test]
fn moving_least_squares_agrees_with_a_global_affine() {
    // When the control field is exactly affine, the locally weighted fits
    // must reproduce that affine everywhere, not only at control points.
    let mut truth = AffineModel2D::new();
    truth.set([0.9, -0.2, 4.0, 0.15, 1.1, -6.0]);

    let controls: Vec<PointMatch<2>> = (0..5)
        .flat_map(|r| (0..5).map(move |c| Vec2::new(c as f64 * 20.0, r as f64 * 20.0)))
        .map(|p| PointMatch::new(Point::new(p), Point::new(truth.apply(p))))
        .collect();

    let mut mls = MovingLeastSquaresTransform::new(AffineModel2D::new(), 1.0);
    mls.set_matches(&controls).unwrap();

    for p in [
        Vec2::new(10.0, 10.0),
        Vec2::new(33.0, 71.0),
        Vec2::new(77.7, 13.1),
    ] {
        assert!(
            (mls.apply(p) - truth.apply(p)).norm() < 1e-6,
            "MLS deviates at ({}, {})",
            p.x,
            p.y
        );
    }
}

#[test]
fn tile_graph_with_rigid_models_settles() {
    // Three tiles in a row under rigid models; the middle one starts
    // contradicted by nothing, so everything must fall onto the anchor's
    // frame with ~zero residual.
    let mut config = TileConfiguration::new();
    let a = config.add_tile(RigidModel2D::new());
    let b = config.add_tile(RigidModel2D::new());
    let c = config.add_tile(RigidModel2D::new());
    config.fix_tile(a);

    let features = [
        Vec2::new(0.0, 0.0),
        Vec2::new(6.0, 1.0),
        Vec2::new(3.0, 5.0),
        Vec2::new(1.0, 4.0),
    ];
    let shift = Vec2::new(7.0, 0.5);

    let ab: Vec<PointMatch<2>> = features
        .iter()
        .map(|l| PointMatch::new(Point::new(*l), Point::new(l - shift)))
        .collect();
    let bc: Vec<PointMatch<2>> = features
        .iter()
        .map(|l| PointMatch::new(Point::new(*l), Point::new(l - shift)))
        .collect();
    config.connect(a, b, &ab);
    config.connect(b, c, &bc);

    // Rigid fits are not convex from a cold start (crossed correspondences
    // can flip a tile); seed the chain first.
    let unaligned = config.pre_align().unwrap();
    assert!(unaligned.is_empty());

    let report = config
        .optimize(&OptimizeOptions {
            max_iterations: 500,
            max_allowed_error: 1e-8,
            max_plateau_width: 50,
            ..OptimizeOptions::default()
        })
        .unwrap();

    assert!(report.final_error < 1e-6, "error {}", report.final_error);
    let placed = config.tile(c).model().apply(Vec2::zeros());
    assert!(
        (placed - Vec2::new(14.0, 1.0)).norm() < 1e-4,
        "tile c placed at ({}, {})",
        placed.x,
        placed.y
    );
}
