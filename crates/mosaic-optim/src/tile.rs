//! One tile of the mosaic graph.

use std::collections::BTreeSet;

use mosaic_core::{Coord, FitError, Model, Point, PointMatch, Real};

/// Per-iteration lifecycle of a tile.
///
/// Every optimization iteration re-enters the cycle: the model is refit
/// from the current neighbour positions (`Fit`), then pushed into the
/// tile's own points (`Applied`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// The model does not reflect the current correspondences.
    Unfit,
    /// The model was fit but not yet applied to the tile's points.
    Fit,
    /// The tile's points reflect the fitted model.
    Applied,
}

/// A correspondence from a point of this tile to a point of another tile,
/// by arena handles.
#[derive(Debug, Clone, Copy)]
pub struct TileMatch {
    /// Index of the moved point in the owning tile's point arena.
    pub point: usize,
    /// Arena index of the target tile.
    pub target_tile: usize,
    /// Index of the target point in the target tile's point arena.
    pub target_point: usize,
    /// Correspondence weight.
    pub weight: Real,
}

/// A rigid unit owning one model, its feature points and the
/// correspondences linking it to connected tiles.
///
/// Points are stored in an index-addressed arena: a point's local
/// coordinate is the feature position in the tile's own frame, its world
/// coordinate the current montage position. Correspondences reference the
/// remote side by `(tile, point)` handle instead of by shared ownership, so
/// who may touch what is decided by whoever holds the tile handles, which
/// makes the scheduler's adjacency-exclusion rule structural.
#[derive(Debug, Clone)]
pub struct Tile<M> {
    model: M,
    points: Vec<Point<2>>,
    matches: Vec<TileMatch>,
    connected: BTreeSet<usize>,
    state: TileState,
    cost: Real,
    distance: Real,
}

impl<M: Model<2>> Tile<M> {
    /// A tile with no points and no connections.
    pub fn new(model: M) -> Self {
        Self {
            model,
            points: Vec::new(),
            matches: Vec::new(),
            connected: BTreeSet::new(),
            state: TileState::Unfit,
            cost: -1.0,
            distance: -1.0,
        }
    }

    /// The tile's model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the tile's model.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TileState {
        self.state
    }

    /// Weighted mean residual from the last [`Tile::update_cost`].
    pub fn cost(&self) -> Real {
        self.cost
    }

    /// Plain mean residual from the last [`Tile::update_cost`].
    pub fn distance(&self) -> Real {
        self.distance
    }

    /// Arena indices of the connected tiles.
    pub fn connected(&self) -> &BTreeSet<usize> {
        &self.connected
    }

    /// The tile's correspondences.
    pub fn matches(&self) -> &[TileMatch] {
        &self.matches
    }

    /// Number of points in the arena.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// A point by index.
    pub fn point(&self, i: usize) -> &Point<2> {
        &self.points[i]
    }

    /// Append a feature point in the tile's local frame; its world
    /// coordinate starts at the local position. Returns the point handle.
    pub fn add_point(&mut self, l: Coord<2>) -> usize {
        self.points.push(Point::new(l));
        self.points.len() - 1
    }

    pub(crate) fn add_match(&mut self, m: TileMatch) {
        self.connected.insert(m.target_tile);
        self.matches.push(m);
        self.state = TileState::Unfit;
    }

    /// Drop every correspondence towards `other` and the connectivity
    /// entry; both directions of a connection must be removed by the owner
    /// of both tiles (see `TileConfiguration::remove_connection`).
    pub(crate) fn remove_matches_to(&mut self, other: usize) {
        self.matches.retain(|m| m.target_tile != other);
        self.connected.remove(&other);
        self.state = TileState::Unfit;
    }

    /// Assemble the correspondences as weighted point matches, resolving
    /// remote points through `resolve`.
    pub fn collect_matches<F>(&self, resolve: F) -> Vec<PointMatch<2>>
    where
        F: Fn(usize, usize) -> Point<2>,
    {
        self.matches
            .iter()
            .map(|m| {
                let target = resolve(m.target_tile, m.target_point);
                PointMatch::with_weight(self.points[m.point], target, m.weight)
            })
            .collect()
    }

    /// Refit the model from the current correspondences.
    pub fn fit_model<F>(&mut self, resolve: F) -> Result<(), FitError>
    where
        F: Fn(usize, usize) -> Point<2>,
    {
        let matches = self.collect_matches(resolve);
        self.model.fit(&matches)?;
        self.state = TileState::Fit;
        Ok(())
    }

    /// Push the fitted model into the tile's own points, scaled by `damp`
    /// (`1.0` applies it fully), then refresh cost and distance.
    pub fn apply<F>(&mut self, damp: Real, resolve: F)
    where
        F: Fn(usize, usize) -> Point<2>,
    {
        for m in &self.matches {
            self.points[m.point].apply_amount(&self.model, damp);
        }
        self.state = TileState::Applied;
        self.update_cost(resolve);
    }

    /// Recompute the weighted (`cost`) and plain (`distance`) mean
    /// residuals over the tile's correspondences.
    pub fn update_cost<F>(&mut self, resolve: F)
    where
        F: Fn(usize, usize) -> Point<2>,
    {
        if self.matches.is_empty() {
            self.cost = 0.0;
            self.distance = 0.0;
            return;
        }
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        let mut plain = 0.0;
        for m in &self.matches {
            let target = resolve(m.target_tile, m.target_point);
            let d = Point::distance(&self.points[m.point], &target);
            weighted += m.weight * d;
            weight_sum += m.weight;
            plain += d;
        }
        self.cost = if weight_sum > 0.0 {
            weighted / weight_sum
        } else {
            0.0
        };
        self.distance = plain / self.matches.len() as Real;
    }

    /// Overwrite all world coordinates with the model applied to the local
    /// coordinates (a full, undamped application to every point).
    pub fn apply_model_to_points(&mut self) {
        for p in &mut self.points {
            p.apply(&self.model);
        }
        self.state = TileState::Applied;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_models::TranslationModel2D;

    fn resolve_fixed(target: Coord<2>) -> impl Fn(usize, usize) -> Point<2> {
        move |_, _| Point::with_world(target, target)
    }

    #[test]
    fn lifecycle_unfit_fit_applied() {
        let mut tile = Tile::new(TranslationModel2D::new());
        let p = tile.add_point(Coord::<2>::new(0.0, 0.0));
        tile.add_match(TileMatch {
            point: p,
            target_tile: 1,
            target_point: 0,
            weight: 1.0,
        });
        assert_eq!(tile.state(), TileState::Unfit);

        let resolve = resolve_fixed(Coord::<2>::new(3.0, 4.0));
        tile.fit_model(&resolve).unwrap();
        assert_eq!(tile.state(), TileState::Fit);

        tile.apply(1.0, &resolve);
        assert_eq!(tile.state(), TileState::Applied);
        assert!((tile.point(p).w() - Coord::<2>::new(3.0, 4.0)).norm() < 1e-12);
        assert!(tile.cost() < 1e-12);
    }

    #[test]
    fn damped_apply_moves_partially() {
        let mut tile = Tile::new(TranslationModel2D::new());
        let p = tile.add_point(Coord::<2>::new(0.0, 0.0));
        tile.add_match(TileMatch {
            point: p,
            target_tile: 1,
            target_point: 0,
            weight: 1.0,
        });
        let resolve = resolve_fixed(Coord::<2>::new(10.0, 0.0));
        tile.fit_model(&resolve).unwrap();
        tile.apply(0.5, &resolve);
        assert!((tile.point(p).w().x - 5.0).abs() < 1e-12);
        // Halfway there: residual half the original offset.
        assert!((tile.cost() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn removing_matches_clears_connectivity() {
        let mut tile = Tile::new(TranslationModel2D::new());
        let p = tile.add_point(Coord::<2>::new(0.0, 0.0));
        tile.add_match(TileMatch {
            point: p,
            target_tile: 7,
            target_point: 0,
            weight: 1.0,
        });
        assert!(tile.connected().contains(&7));
        tile.remove_matches_to(7);
        assert!(tile.matches().is_empty());
        assert!(tile.connected().is_empty());
    }
}
