//! Hooke springs with a tearing cutoff.

use mosaic_core::{Coord, Real};
use rand::{rngs::StdRng, Rng};

/// A spring between two vertices: rest length, a stack of weight factors and
/// a stretch limit.
///
/// Pure data plus the force law; which two vertices it connects is stored by
/// the owning mesh.
#[derive(Debug, Clone)]
pub struct Spring {
    length: Real,
    weights: Vec<Real>,
    weight: Real,
    max_stretch: Real,
}

impl Spring {
    /// A spring with one weight factor.
    pub fn new(length: Real, weight: Real, max_stretch: Real) -> Self {
        Self {
            length,
            weights: vec![weight],
            weight,
            max_stretch,
        }
    }

    /// Rest length.
    pub fn rest_length(&self) -> Real {
        self.length
    }

    /// Effective weight: the product of all stacked factors.
    pub fn weight(&self) -> Real {
        self.weight
    }

    /// Stretch limit beyond which the spring is considered torn.
    pub fn max_stretch(&self) -> Real {
        self.max_stretch
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

    /// Force exerted on the vertex at `from` by the spring towards `to`.
    ///
    /// Hooke's law along the connecting direction,
    /// `force = (current − rest) · weight`. A spring stretched or compressed
    /// beyond `max_stretch` is torn and contributes nothing. A degenerate
    /// zero-length configuration yields a randomly axis-aligned force of the
    /// same magnitude to break the singularity.
    pub fn force(&self, from: &Coord<2>, to: &Coord<2>, rng: &mut StdRng) -> Coord<2> {
        let d = to - from;
        let current = d.norm();
        let e = current - self.length;
        if e.abs() > self.max_stretch {
            return Coord::<2>::zeros();
        }
        let magnitude = e * self.weight;
        if current > 0.0 {
            d * (magnitude / current)
        } else {
            let m = magnitude.abs();
            match rng.random_range(0..4u8) {
                0 => Coord::<2>::new(m, 0.0),
                1 => Coord::<2>::new(-m, 0.0),
                2 => Coord::<2>::new(0.0, m),
                _ => Coord::<2>::new(0.0, -m),
            }
        }
    }
}
