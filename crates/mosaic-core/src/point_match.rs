//! A weighted, directed correspondence between two points.

use crate::math::Real;
use crate::model::Transform;
use crate::point::Point;

/// An ordered pair of corresponding points.
///
/// The correspondence is directed: only `p1` is moved by [`PointMatch::apply`],
/// toward wherever the fitted transform sends it, while `p2` serves as the
/// target. The effective weight is the product of a stack of weight factors,
/// so that independent weighting schemes (match confidence, locality, ...)
/// can be layered and removed again without losing each other.
#[derive(Debug, Clone, PartialEq)]
pub struct PointMatch<const D: usize> {
    p1: Point<D>,
    p2: Point<D>,
    weights: Vec<Real>,
    weight: Real,
    strength: Real,
}

impl<const D: usize> PointMatch<D> {
    /// Create a correspondence with unit weight and full strength.
    pub fn new(p1: Point<D>, p2: Point<D>) -> Self {
        Self {
            p1,
            p2,
            weights: vec![1.0],
            weight: 1.0,
            strength: 1.0,
        }
    }

    /// Create a correspondence with a single weight factor.
    pub fn with_weight(p1: Point<D>, p2: Point<D>, weight: Real) -> Self {
        Self {
            p1,
            p2,
            weights: vec![weight],
            weight,
            strength: 1.0,
        }
    }

    /// Create a correspondence with a full weight stack and a strength in
    /// `[0, 1]` controlling partial application.
    pub fn with_weights_and_strength(
        p1: Point<D>,
        p2: Point<D>,
        weights: Vec<Real>,
        strength: Real,
    ) -> Self {
        let weight = weights.iter().product();
        Self {
            p1,
            p2,
            weights,
            weight,
            strength,
        }
    }

    /// The moved point.
    pub fn p1(&self) -> &Point<D> {
        &self.p1
    }

    /// Mutable access to the moved point.
    pub fn p1_mut(&mut self) -> &mut Point<D> {
        &mut self.p1
    }

    /// The target point.
    pub fn p2(&self) -> &Point<D> {
        &self.p2
    }

    /// Mutable access to the target point.
    pub fn p2_mut(&mut self) -> &mut Point<D> {
        &mut self.p2
    }

    /// Effective weight: the product of all stacked factors.
    pub fn weight(&self) -> Real {
        self.weight
    }

    /// Application strength in `[0, 1]`.
    pub fn strength(&self) -> Real {
        self.strength
    }

    /// Push an additional weight factor onto the stack.
    pub fn push_weight(&mut self, w: Real) {
        self.weights.push(w);
        self.weight *= w;
    }

    /// Pop the most recently pushed weight factor.
    pub fn pop_weight(&mut self) -> Option<Real> {
        let w = self.weights.pop();
        self.weight = self.weights.iter().product();
        w
    }

    /// Replace the most recently pushed weight factor.
    pub fn set_last_weight(&mut self, w: Real) {
        if let Some(last) = self.weights.last_mut() {
            *last = w;
        }
        self.weight = self.weights.iter().product();
    }

    /// Apply a transform to `p1`: `p1.w = t(p1.l)`.
    pub fn apply<T: Transform<D> + ?Sized>(&mut self, t: &T) {
        self.p1.apply(t);
    }

    /// Apply a transform to `p1` scaled by `strength * amount`.
    pub fn apply_amount<T: Transform<D> + ?Sized>(&mut self, t: &T, amount: Real) {
        self.p1.apply_amount(t, self.strength * amount);
    }

    /// Current world-space residual `|p1.w - p2.w|`.
    pub fn distance(&self) -> Real {
        Point::distance(&self.p1, &self.p2)
    }

    /// The reversed correspondence `(p2, p1)` with the same weight stack.
    pub fn flip(&self) -> Self {
        Self {
            p1: self.p2.clone(),
            p2: self.p1.clone(),
            weights: self.weights.clone(),
            weight: self.weight,
            strength: self.strength,
        }
    }

    /// Flip a whole set of correspondences.
    pub fn flip_all(matches: &[Self]) -> Vec<Self> {
        matches.iter().map(Self::flip).collect()
    }

    /// Sum of weighted world-space residuals divided by the total weight.
    ///
    /// Returns `0` for an empty set.
    pub fn mean_distance(matches: &[Self]) -> Real {
        let mut sum = 0.0;
        let mut weight = 0.0;
        for m in matches {
            sum += m.weight * m.distance();
            weight += m.weight;
        }
        if weight > 0.0 {
            sum / weight
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Coord;

    fn pm(x1: Real, y1: Real, x2: Real, y2: Real) -> PointMatch<2> {
        PointMatch::new(
            Point::new(Coord::<2>::new(x1, y1)),
            Point::new(Coord::<2>::new(x2, y2)),
        )
    }

    #[test]
    fn weight_stack_product() {
        let mut m = pm(0.0, 0.0, 1.0, 0.0);
        assert_eq!(m.weight(), 1.0);
        m.push_weight(0.5);
        m.push_weight(0.5);
        assert_eq!(m.weight(), 0.25);
        m.set_last_weight(2.0);
        assert_eq!(m.weight(), 1.0);
        m.pop_weight();
        assert_eq!(m.weight(), 0.5);
    }

    #[test]
    fn distance_is_world_space() {
        let m = pm(0.0, 0.0, 3.0, 4.0);
        assert_eq!(m.distance(), 5.0);
    }

    #[test]
    fn flip_swaps_points() {
        let m = pm(1.0, 2.0, 3.0, 4.0);
        let f = m.flip();
        assert_eq!(f.p1().l(), m.p2().l());
        assert_eq!(f.p2().l(), m.p1().l());
        assert_eq!(f.weight(), m.weight());
    }

    #[test]
    fn mean_distance_weighs_matches() {
        let a = PointMatch::with_weight(
            Point::new(Coord::<2>::new(0.0, 0.0)),
            Point::new(Coord::<2>::new(2.0, 0.0)),
            1.0,
        );
        let b = PointMatch::with_weight(
            Point::new(Coord::<2>::new(0.0, 0.0)),
            Point::new(Coord::<2>::new(4.0, 0.0)),
            3.0,
        );
        let mean = PointMatch::mean_distance(&[a, b]);
        assert!((mean - 3.5).abs() < 1e-12);
    }
}
