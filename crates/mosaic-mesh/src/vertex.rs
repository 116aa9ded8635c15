//! Per-vertex spring dynamics.

use mosaic_core::{Coord, Real};

/// Dynamic state of one mesh vertex: velocity, accumulated force and the
/// springs it participates in.
///
/// Positions live in the mesh's vertex arena; this struct only carries what
/// the integrator needs. Spring links are index pairs `(other_vertex,
/// spring)` and are always wired symmetrically by the owning mesh: if
/// vertex `a` links to `b` through spring `s`, then `b` links back to `a`
/// through the same `s`.
#[derive(Debug, Clone, Default)]
pub struct SpringVertex {
    direction: Coord<2>,
    force: Coord<2>,
    springs: Vec<(usize, usize)>,
}

impl SpringVertex {
    /// A vertex at rest with no springs.
    pub fn new() -> Self {
        Self {
            direction: Coord::<2>::zeros(),
            force: Coord::<2>::zeros(),
            springs: Vec::new(),
        }
    }

    /// The spring links `(other_vertex, spring)` of this vertex.
    pub fn springs(&self) -> &[(usize, usize)] {
        &self.springs
    }

    pub(crate) fn add_spring_link(&mut self, other: usize, spring: usize) {
        self.springs.push((other, spring));
    }

    /// Net force accumulated in the current iteration.
    pub fn force(&self) -> &Coord<2> {
        &self.force
    }

    pub(crate) fn set_force(&mut self, f: Coord<2>) {
        self.force = f;
    }

    /// Current velocity.
    pub fn direction(&self) -> &Coord<2> {
        &self.direction
    }

    /// Current speed `|velocity|`.
    pub fn speed(&self) -> Real {
        self.direction.norm()
    }

    /// Integrate the force into the velocity with exponential damping:
    /// `v = (v + F·dt) · damp^dt`.
    pub(crate) fn update_velocity(&mut self, damp: Real, dt: Real) {
        self.direction = (self.direction + self.force * dt) * damp.powf(dt);
    }

    /// Displacement for this step: `v·dt`.
    pub(crate) fn step_offset(&self, dt: Real) -> Coord<2> {
        self.direction * dt
    }
}
