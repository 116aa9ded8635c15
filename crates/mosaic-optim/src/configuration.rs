//! The tile graph and its sequential relaxation.

use std::collections::{BTreeSet, VecDeque};

use log::{debug, info};
use mosaic_core::{
    Coord, ErrorStatistic, FitError, Model, PlateauCriteria, Point, PointMatch, Real,
};
use serde::{Deserialize, Serialize};

use crate::tile::{Tile, TileMatch};

/// Options for the relaxation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeOptions {
    /// Hard bound on the number of iterations.
    pub max_iterations: usize,
    /// Mean residual below which the configuration counts as solved.
    pub max_allowed_error: Real,
    /// Window width of the plateau detector.
    pub max_plateau_width: usize,
    /// Fraction of each per-tile update actually applied.
    pub damp: Real,
    /// Seed for the concurrent scheduler's queue shuffle; the sequential
    /// path ignores it.
    pub seed: u64,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            max_allowed_error: 0.01,
            max_plateau_width: 200,
            damp: 1.0,
            seed: 1_234_567,
        }
    }
}

/// Outcome of a relaxation run.
#[derive(Debug, Clone)]
pub struct OptimizeReport {
    /// Iterations actually performed.
    pub iterations: usize,
    /// Mean residual across tiles at the last iteration.
    pub final_error: Real,
    /// Whether the plateau/threshold rule fired before the iteration cap.
    pub converged: bool,
    /// Connections removed by the trimming loop (zero for plain runs).
    pub removed_connections: usize,
}

/// A set of tiles sharing point correspondences, plus a disjoint subset of
/// fixed tiles that are never refit.
pub struct TileConfiguration<M> {
    tiles: Vec<Tile<M>>,
    fixed: BTreeSet<usize>,
    error_min: Real,
    error_mean: Real,
    error_max: Real,
}

impl<M: Model<2>> Default for TileConfiguration<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model<2>> TileConfiguration<M> {
    /// An empty configuration.
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            fixed: BTreeSet::new(),
            error_min: -1.0,
            error_mean: -1.0,
            error_max: -1.0,
        }
    }

    /// Add a tile around `model`; returns its handle.
    pub fn add_tile(&mut self, model: M) -> usize {
        self.tiles.push(Tile::new(model));
        self.tiles.len() - 1
    }

    /// Number of tiles.
    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// A tile by handle.
    pub fn tile(&self, i: usize) -> &Tile<M> {
        &self.tiles[i]
    }

    /// Pin a tile: it anchors the configuration and is never refit.
    pub fn fix_tile(&mut self, i: usize) {
        self.fixed.insert(i);
    }

    /// Handles of the fixed tiles.
    pub fn fixed_tiles(&self) -> &BTreeSet<usize> {
        &self.fixed
    }

    /// Smallest per-tile mean residual of the last error update.
    pub fn error_min(&self) -> Real {
        self.error_min
    }

    /// Mean of the per-tile mean residuals of the last error update.
    pub fn error_mean(&self) -> Real {
        self.error_mean
    }

    /// Largest per-tile mean residual of the last error update.
    pub fn error_max(&self) -> Real {
        self.error_max
    }

    /// Connect two tiles by correspondences.
    ///
    /// Each match's `p1` local coordinate is a feature in tile `a`'s frame,
    /// its `p2` local coordinate the same feature in tile `b`'s frame. The
    /// connection is wired symmetrically: both tiles receive mirrored
    /// matches referencing the same two arena points.
    pub fn connect(&mut self, a: usize, b: usize, matches: &[PointMatch<2>]) {
        assert!(a != b, "a tile cannot connect to itself");
        for m in matches {
            let pa = self.tiles[a].add_point(*m.p1().l());
            let pb = self.tiles[b].add_point(*m.p2().l());
            self.tiles[a].add_match(TileMatch {
                point: pa,
                target_tile: b,
                target_point: pb,
                weight: m.weight(),
            });
            self.tiles[b].add_match(TileMatch {
                point: pb,
                target_tile: a,
                target_point: pa,
                weight: m.weight(),
            });
        }
    }

    /// Remove a tile-to-tile connection; exactly the mirrored match pairs
    /// on both sides disappear.
    pub fn remove_connection(&mut self, a: usize, b: usize) {
        self.tiles[a].remove_matches_to(b);
        self.tiles[b].remove_matches_to(a);
    }

    /// Refresh every tile's cost and aggregate min/mean/max residuals.
    pub fn update_errors(&mut self) {
        for i in 0..self.tiles.len() {
            let (left, rest) = self.tiles.split_at_mut(i);
            let (tile, right) = rest.split_first_mut().expect("index in bounds");
            let resolve = |t: usize, p: usize| -> Point<2> {
                if t < i {
                    *left[t].point(p)
                } else {
                    *right[t - i - 1].point(p)
                }
            };
            tile.update_cost(resolve);
        }

        let mut min = Real::INFINITY;
        let mut max = Real::NEG_INFINITY;
        let mut sum = 0.0;
        for t in &self.tiles {
            let d = t.distance();
            min = min.min(d);
            max = max.max(d);
            sum += d;
        }
        self.error_min = min;
        self.error_max = max;
        self.error_mean = if self.tiles.is_empty() {
            0.0
        } else {
            sum / self.tiles.len() as Real
        };
    }

    fn update_tile(&mut self, i: usize, damp: Real) -> Result<(), FitError> {
        let (left, rest) = self.tiles.split_at_mut(i);
        let (tile, right) = rest.split_first_mut().expect("index in bounds");
        let resolve = |t: usize, p: usize| -> Point<2> {
            if t < i {
                *left[t].point(p)
            } else {
                *right[t - i - 1].point(p)
            }
        };
        tile.fit_model(&resolve)?;
        tile.apply(damp, &resolve);
        Ok(())
    }

    /// Relax the configuration until the mean residual settles.
    ///
    /// Fit errors propagate to the caller: a single unfittable tile aborts
    /// the whole run rather than being silently skipped.
    pub fn optimize(&mut self, opts: &OptimizeOptions) -> Result<OptimizeReport, FitError> {
        let criteria = PlateauCriteria {
            max_allowed_error: opts.max_allowed_error,
            max_plateau_width: opts.max_plateau_width,
            slope_epsilon: 1e-4,
        };
        let mut observer = ErrorStatistic::new(opts.max_plateau_width + 1);

        for i in 0..opts.max_iterations {
            for t in 0..self.tiles.len() {
                if self.fixed.contains(&t) {
                    continue;
                }
                self.update_tile(t, opts.damp)?;
            }
            self.update_errors();
            observer.add(self.error_mean);
            if criteria.converged(&observer, i) {
                debug!(
                    "tile configuration settled after {} iterations, mean error {}",
                    i + 1,
                    self.error_mean
                );
                return Ok(OptimizeReport {
                    iterations: i + 1,
                    final_error: self.error_mean,
                    converged: true,
                    removed_connections: 0,
                });
            }
        }
        debug!(
            "tile configuration hit the iteration cap {}, mean error {}",
            opts.max_iterations, self.error_mean
        );
        Ok(OptimizeReport {
            iterations: opts.max_iterations,
            final_error: self.error_mean,
            converged: false,
            removed_connections: 0,
        })
    }

    /// Mean residual and total weight of the connection between two tiles.
    fn connection_error(&self, a: usize, b: usize) -> (Real, Real) {
        let tile = &self.tiles[a];
        let mut sum = 0.0;
        let mut weight = 0.0;
        let mut n = 0usize;
        for m in tile.matches() {
            if m.target_tile != b {
                continue;
            }
            let d = Point::distance(tile.point(m.point), self.tiles[b].point(m.target_point));
            sum += d;
            weight += m.weight;
            n += 1;
        }
        if n == 0 {
            (0.0, 0.0)
        } else {
            (sum / n as Real, weight)
        }
    }

    /// All connections as ordered pairs `a < b`.
    fn connections(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (a, tile) in self.tiles.iter().enumerate() {
            for &b in tile.connected() {
                if a < b {
                    out.push((a, b));
                }
            }
        }
        out
    }

    /// Relax, then repeatedly drop the single worst-agreeing connection as
    /// long as its residual exceeds `max_mean_factor ×` the weighted mean
    /// connection residual, re-relaxing after each removal.
    ///
    /// The number of passes is additionally bounded by the initial number
    /// of connections, so the loop terminates even on pathological graphs.
    pub fn optimize_and_filter(
        &mut self,
        opts: &OptimizeOptions,
        max_mean_factor: Real,
    ) -> Result<OptimizeReport, FitError> {
        let max_passes = self.connections().len().max(1);
        let mut removed = 0usize;
        let mut report = self.optimize(opts)?;

        for _ in 0..max_passes {
            let connections = self.connections();
            if connections.is_empty() {
                break;
            }

            let mut weighted_sum = 0.0;
            let mut weight_sum = 0.0;
            let mut worst: Option<(usize, usize, Real)> = None;
            for &(a, b) in &connections {
                let (mean, weight) = self.connection_error(a, b);
                weighted_sum += mean * weight;
                weight_sum += weight;
                if worst.map_or(true, |(_, _, w)| mean > w) {
                    worst = Some((a, b, mean));
                }
            }
            let overall = if weight_sum > 0.0 {
                weighted_sum / weight_sum
            } else {
                0.0
            };

            let Some((a, b, mean)) = worst else {
                break;
            };
            if mean <= max_mean_factor * overall {
                break;
            }

            info!(
                "dropping connection {} - {} with mean residual {} ({}x the weighted mean {})",
                a,
                b,
                mean,
                mean / overall.max(Real::MIN_POSITIVE),
                overall
            );
            self.remove_connection(a, b);
            removed += 1;
            report = self.optimize(opts)?;
        }

        report.removed_connections = removed;
        Ok(report)
    }

    /// Seed a starting configuration by breadth-first propagation from the
    /// fixed tiles (or from the first tile when nothing is fixed): each
    /// reached tile is fit against its already-aligned neighbours only and
    /// applied fully, once.
    ///
    /// Returns the handles of the tiles the propagation could not reach.
    pub fn pre_align(&mut self) -> Result<Vec<usize>, FitError> {
        if self.tiles.is_empty() {
            return Ok(Vec::new());
        }

        let mut aligned: BTreeSet<usize> = if self.fixed.is_empty() {
            BTreeSet::from([0])
        } else {
            self.fixed.clone()
        };
        let mut queue: VecDeque<usize> = aligned.iter().copied().collect();

        while let Some(t) = queue.pop_front() {
            let neighbours: Vec<usize> = self.tiles[t].connected().iter().copied().collect();
            for n in neighbours {
                if aligned.contains(&n) {
                    continue;
                }

                // Matches of `n` restricted to already-aligned targets.
                let matches: Vec<PointMatch<2>> = {
                    let tile = &self.tiles[n];
                    tile.matches()
                        .iter()
                        .filter(|m| aligned.contains(&m.target_tile))
                        .map(|m| {
                            let target = *self.tiles[m.target_tile].point(m.target_point);
                            PointMatch::with_weight(*tile.point(m.point), target, m.weight)
                        })
                        .collect()
                };
                if matches.len() < self.tiles[n].model().min_num_matches() {
                    continue;
                }

                self.tiles[n].model_mut().fit(&matches)?;
                self.tiles[n].apply_model_to_points();
                aligned.insert(n);
                queue.push_back(n);
            }
        }

        Ok((0..self.tiles.len())
            .filter(|i| !aligned.contains(i))
            .collect())
    }

    pub(crate) fn tiles_mut(&mut self) -> &mut Vec<Tile<M>> {
        &mut self.tiles
    }

    pub(crate) fn set_errors(&mut self, min: Real, mean: Real, max: Real) {
        self.error_min = min;
        self.error_mean = mean;
        self.error_max = max;
    }

    /// Helper used by the demos and tests: connect two tiles that overlap
    /// in the montage by identity correspondences at the given montage
    /// locations.
    ///
    /// `offset_a` and `offset_b` are the tiles' nominal positions; each
    /// location is expressed in both tiles' local frames.
    pub fn connect_by_overlap(
        &mut self,
        a: usize,
        b: usize,
        offset_a: Coord<2>,
        offset_b: Coord<2>,
        locations: &[Coord<2>],
    ) {
        let matches: Vec<PointMatch<2>> = locations
            .iter()
            .map(|loc| {
                PointMatch::new(Point::new(loc - offset_a), Point::new(loc - offset_b))
            })
            .collect();
        self.connect(a, b, &matches);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::Transform;
    use mosaic_models::TranslationModel2D;

    fn square(side: Real) -> Vec<Coord<2>> {
        vec![
            Coord::<2>::new(0.0, 0.0),
            Coord::<2>::new(side, 0.0),
            Coord::<2>::new(side, side),
            Coord::<2>::new(0.0, side),
        ]
    }

    #[test]
    fn identity_correspondences_converge_to_zero_residual() {
        let mut config = TileConfiguration::new();
        let a = config.add_tile(TranslationModel2D::new());
        let b = config.add_tile(TranslationModel2D::new());
        config.fix_tile(a);

        // Both tiles see the same montage locations: p1.l == p2.l.
        let matches: Vec<PointMatch<2>> = square(10.0)
            .into_iter()
            .map(|l| PointMatch::new(Point::new(l), Point::new(l)))
            .collect();
        config.connect(a, b, &matches);

        let report = config
            .optimize(&OptimizeOptions {
                max_iterations: 100,
                max_allowed_error: 1e-9,
                max_plateau_width: 10,
                ..OptimizeOptions::default()
            })
            .unwrap();
        assert!(
            report.final_error < 1e-9,
            "mean residual {}",
            report.final_error
        );
    }

    #[test]
    fn shifted_tile_recovers_its_offset() {
        // Tile b's features appear shifted by (5, 2) in its own frame; the
        // fit must place b at exactly that offset in montage space.
        let mut config = TileConfiguration::new();
        let a = config.add_tile(TranslationModel2D::new());
        let b = config.add_tile(TranslationModel2D::new());
        config.fix_tile(a);

        let offset = Coord::<2>::new(5.0, 2.0);
        config.connect_by_overlap(a, b, Coord::<2>::zeros(), offset, &square(10.0));

        config
            .optimize(&OptimizeOptions {
                max_iterations: 100,
                max_allowed_error: 1e-9,
                max_plateau_width: 10,
                ..OptimizeOptions::default()
            })
            .unwrap();

        let model = config.tile(b).model();
        assert!(
            (model.apply(Coord::<2>::zeros()) - offset).norm() < 1e-6,
            "tile b sits at {:?}",
            model.apply(Coord::<2>::zeros())
        );
    }

    #[test]
    fn trimming_removes_a_contradictory_connection() {
        // Chain a - b with consistent matches plus one connection c - b
        // whose correspondences contradict them grossly.
        let mut config = TileConfiguration::new();
        let a = config.add_tile(TranslationModel2D::new());
        let b = config.add_tile(TranslationModel2D::new());
        let c = config.add_tile(TranslationModel2D::new());
        config.fix_tile(a);
        config.fix_tile(c);

        // The a - b link carries twice the evidence of the c - b link, so
        // the equilibrium sits closer to a's demand and the contradictory
        // connection ends up with the clearly worse residual.
        let matches: Vec<PointMatch<2>> = square(10.0)
            .into_iter()
            .chain(square(6.0))
            .map(|l| PointMatch::new(Point::new(l), Point::new(l)))
            .collect();
        config.connect(a, b, &matches);

        // c agrees with a (both fixed at identity), but its link to b
        // demands b sit 100 px away.
        let contradictory: Vec<PointMatch<2>> = square(10.0)
            .into_iter()
            .map(|l| {
                PointMatch::new(Point::new(l), Point::new(l + Coord::<2>::new(100.0, 0.0)))
            })
            .collect();
        config.connect(c, b, &contradictory);

        let report = config
            .optimize_and_filter(
                &OptimizeOptions {
                    max_iterations: 200,
                    max_allowed_error: 1e-6,
                    max_plateau_width: 20,
                    ..OptimizeOptions::default()
                },
                1.2,
            )
            .unwrap();

        assert_eq!(report.removed_connections, 1);
        assert!(!config.tile(b).connected().contains(&c));
        assert!(report.final_error < 1e-6, "error {}", report.final_error);
    }

    #[test]
    fn pre_align_reaches_the_connected_component() {
        let mut config = TileConfiguration::new();
        let a = config.add_tile(TranslationModel2D::new());
        let b = config.add_tile(TranslationModel2D::new());
        let c = config.add_tile(TranslationModel2D::new());
        let lonely = config.add_tile(TranslationModel2D::new());
        config.fix_tile(a);

        config.connect_by_overlap(
            a,
            b,
            Coord::<2>::zeros(),
            Coord::<2>::new(8.0, 0.0),
            &square(4.0),
        );
        config.connect_by_overlap(
            b,
            c,
            Coord::<2>::new(8.0, 0.0),
            Coord::<2>::new(16.0, 0.0),
            &[
                Coord::<2>::new(16.0, 0.0),
                Coord::<2>::new(17.0, 3.0),
                Coord::<2>::new(16.5, 1.0),
            ],
        );

        let unaligned = config.pre_align().unwrap();
        assert_eq!(unaligned, vec![lonely]);

        // After seeding, c's model already places it at its montage offset.
        let placed = config.tile(c).model().apply(Coord::<2>::zeros());
        assert!(
            (placed - Coord::<2>::new(16.0, 0.0)).norm() < 1e-9,
            "c placed at {:?}",
            placed
        );
    }

    #[test]
    fn update_errors_tracks_min_mean_max() {
        let mut config = TileConfiguration::new();
        let a = config.add_tile(TranslationModel2D::new());
        let b = config.add_tile(TranslationModel2D::new());
        let matches: Vec<PointMatch<2>> = square(10.0)
            .into_iter()
            .map(|l| {
                PointMatch::new(Point::new(l), Point::new(l + Coord::<2>::new(3.0, 4.0)))
            })
            .collect();
        config.connect(a, b, &matches);
        config.update_errors();

        // Every correspondence disagrees by exactly 5 before optimization.
        assert!((config.error_mean() - 5.0).abs() < 1e-12);
        assert!((config.error_min() - 5.0).abs() < 1e-12);
        assert!((config.error_max() - 5.0).abs() < 1e-12);
    }
}
