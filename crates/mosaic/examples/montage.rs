//! Synthetic montage registration.
//!
//! This example demonstrates the full mosaic workflow on a synthetic 3×3
//! grid of overlapping tiles:
//! 1. Generate noisy correspondences in every overlap region
//! 2. Screen each overlap with RANSAC against gross mismatches
//! 3. Wire the surviving correspondences into a tile graph
//! 4. Seed the configuration and relax it concurrently
//! 5. Compare the recovered placements with ground truth
//!
//! Run with: `cargo run -p mosaic --example montage`

use anyhow::Result;
use mosaic::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

const TILE: f64 = 100.0;
const OVERLAP: f64 = 20.0;
const GRID: usize = 3;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Synthetic 3x3 montage ===\n");

    let mut rng = StdRng::seed_from_u64(271);

    // Ground-truth placement: tiles on a grid with slightly perturbed
    // offsets, as if a stage had drifted.
    let mut truth = Vec::new();
    for r in 0..GRID {
        for c in 0..GRID {
            let jitter = Vec2::new(rng.random_range(-2.0..2.0), rng.random_range(-2.0..2.0));
            truth.push(Vec2::new(
                c as f64 * (TILE - OVERLAP),
                r as f64 * (TILE - OVERLAP),
            ) + jitter);
        }
    }

    let mut config = TileConfiguration::new();
    for _ in 0..GRID * GRID {
        config.add_tile(TranslationModel2D::new());
    }
    config.fix_tile(0);

    // Correspondences per overlapping pair, contaminated with mismatches.
    let mut pairs = 0;
    for r in 0..GRID {
        for c in 0..GRID {
            let a = r * GRID + c;
            if c + 1 < GRID {
                wire(&mut config, &truth, a, a + 1, &mut rng)?;
                pairs += 1;
            }
            if r + 1 < GRID {
                wire(&mut config, &truth, a, a + GRID, &mut rng)?;
                pairs += 1;
            }
        }
    }
    println!("wired {} overlapping pairs", pairs);

    let unreached = config.pre_align()?;
    println!("pre-aligned; {} tiles unreachable", unreached.len());

    let report = optimize_concurrently(
        &mut config,
        &OptimizeOptions {
            max_iterations: 2000,
            max_allowed_error: 0.05,
            max_plateau_width: 100,
            ..OptimizeOptions::default()
        },
        None,
    )?;
    println!(
        "relaxed in {} iterations, mean residual {:.4} (converged: {})",
        report.iterations, report.final_error, report.converged
    );

    // Recovered placement vs ground truth, anchored on tile 0.
    let anchor = truth[0];
    let mut worst: f64 = 0.0;
    for (i, t) in truth.iter().enumerate() {
        let placed = config.tile(i).model().apply(Vec2::zeros());
        let expected = t - anchor;
        let err = (placed - expected).norm();
        worst = worst.max(err);
        println!(
            "tile {}: placed ({:8.3}, {:8.3}), truth ({:8.3}, {:8.3}), error {:.4}",
            i, placed.x, placed.y, expected.x, expected.y, err
        );
    }
    println!("\nworst placement error: {:.4}", worst);

    Ok(())
}

/// Generate noisy correspondences in the overlap of tiles `a` and `b`,
/// screen them with RANSAC and wire the inliers into the graph.
fn wire(
    config: &mut TileConfiguration<TranslationModel2D>,
    truth: &[Vec2],
    a: usize,
    b: usize,
    rng: &mut StdRng,
) -> Result<()> {
    let mut candidates = Vec::new();
    for k in 0..12 {
        // A feature somewhere in the overlap strip, in montage coordinates.
        let montage = (truth[a] + truth[b]) * 0.5
            + Vec2::new(
                rng.random_range(0.0..OVERLAP),
                rng.random_range(0.0..TILE * 0.8),
            );
        let la = montage - truth[a];
        let mut lb = montage - truth[b];
        // Localization noise on one side, mismatches every sixth feature.
        lb += Vec2::new(rng.random_range(-0.3..0.3), rng.random_range(-0.3..0.3));
        if k % 6 == 5 {
            lb += Vec2::new(rng.random_range(10.0..30.0), rng.random_range(10.0..30.0));
        }
        candidates.push(PointMatch::new(Point::new(la), Point::new(lb)));
    }

    let mut screen = TranslationModel2D::new();
    let inliers = ransac(
        &mut screen,
        &candidates,
        &RansacParams {
            iterations: 200,
            epsilon: 1.5,
            min_inlier_ratio: 0.5,
            min_num_inliers: 6,
            seed: 17,
        },
    )?;
    config.connect(a, b, &inliers);
    Ok(())
}
