//! A point with a local and a world coordinate.

use crate::math::{Coord, Real};
use crate::model::Transform;

/// A point in `D`-dimensional space carrying two coordinates:
///
/// - `l`: the *local* coordinate in the origin frame, fixed after
///   construction,
/// - `w`: the *world* coordinate, mutated by [`Point::apply`].
///
/// Both live in the same dimension by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point<const D: usize> {
    l: Coord<D>,
    w: Coord<D>,
}

impl<const D: usize> Point<D> {
    /// Create a point whose world coordinate starts at its local coordinate.
    pub fn new(l: Coord<D>) -> Self {
        Self { l, w: l }
    }

    /// Create a point with distinct local and world coordinates.
    pub fn with_world(l: Coord<D>, w: Coord<D>) -> Self {
        Self { l, w }
    }

    /// Local coordinate (origin frame).
    pub fn l(&self) -> &Coord<D> {
        &self.l
    }

    /// World coordinate.
    pub fn w(&self) -> &Coord<D> {
        &self.w
    }

    /// Overwrite the world coordinate.
    pub fn set_w(&mut self, w: Coord<D>) {
        self.w = w;
    }

    /// Mutable access to the world coordinate.
    pub fn w_mut(&mut self) -> &mut Coord<D> {
        &mut self.w
    }

    /// Reset the world coordinate to the local coordinate.
    pub fn reset_world(&mut self) {
        self.w = self.l;
    }

    /// Apply a transform: `w = t(l)`.
    pub fn apply<T: Transform<D> + ?Sized>(&mut self, t: &T) {
        self.w = t.apply(self.l);
    }

    /// Apply a transform partially: `w += amount * (t(l) - w)`.
    ///
    /// `amount == 1` is a full [`Point::apply`]; `amount == 0` leaves the
    /// world coordinate untouched.
    pub fn apply_amount<T: Transform<D> + ?Sized>(&mut self, t: &T, amount: Real) {
        let target = t.apply(self.l);
        self.w += (target - self.w) * amount;
    }

    /// Euclidean distance between the world coordinates of two points.
    pub fn distance(a: &Self, b: &Self) -> Real {
        (a.w - b.w).norm()
    }

    /// Squared Euclidean distance between the world coordinates.
    pub fn square_distance(a: &Self, b: &Self) -> Real {
        (a.w - b.w).norm_squared()
    }

    /// Euclidean distance between the local coordinates of two points.
    pub fn local_distance(a: &Self, b: &Self) -> Real {
        (a.l - b.l).norm()
    }

    /// Squared Euclidean distance between the local coordinates.
    pub fn square_local_distance(a: &Self, b: &Self) -> Real {
        (a.l - b.l).norm_squared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Coord;

    struct Shift(Coord<2>);

    impl Transform<2> for Shift {
        fn apply(&self, p: Coord<2>) -> Coord<2> {
            p + self.0
        }
    }

    #[test]
    fn apply_maps_local_to_world() {
        let mut p = Point::new(Coord::<2>::new(1.0, 2.0));
        p.apply(&Shift(Coord::<2>::new(3.0, -1.0)));
        assert_eq!(*p.w(), Coord::<2>::new(4.0, 1.0));
        assert_eq!(*p.l(), Coord::<2>::new(1.0, 2.0));
    }

    #[test]
    fn apply_amount_interpolates() {
        let mut p = Point::new(Coord::<2>::new(0.0, 0.0));
        p.apply_amount(&Shift(Coord::<2>::new(2.0, 0.0)), 0.5);
        assert_eq!(*p.w(), Coord::<2>::new(1.0, 0.0));
        p.apply_amount(&Shift(Coord::<2>::new(2.0, 0.0)), 1.0);
        assert_eq!(*p.w(), Coord::<2>::new(2.0, 0.0));
    }

    #[test]
    fn distances() {
        let a = Point::with_world(Coord::<2>::new(0.0, 0.0), Coord::<2>::new(3.0, 4.0));
        let b = Point::new(Coord::<2>::new(0.0, 0.0));
        assert_eq!(Point::distance(&a, &b), 5.0);
        assert_eq!(Point::square_distance(&a, &b), 25.0);
        assert_eq!(Point::local_distance(&a, &b), 0.0);
    }
}
