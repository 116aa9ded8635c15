//! Spring-mass relaxation of a transform mesh.

use std::collections::{HashMap, HashSet};

use log::debug;
use mosaic_core::{
    Coord, ErrorStatistic, FitError, InvertibleTransform, NoninvertibleModelError, PlateauCriteria,
    Point, Real, Transform,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::MeshError;
use crate::spring::Spring;
use crate::transform_mesh::TransformMesh;
use crate::vertex::SpringVertex;

/// Options for the explicit-Euler relaxation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaxOptions {
    /// Hard bound on the number of iterations.
    pub max_iterations: usize,
    /// Mean force below which the mesh counts as settled.
    pub max_allowed_error: Real,
    /// Window width of the plateau detector.
    pub max_plateau_width: usize,
    /// Upper bound on per-iteration vertex displacement.
    pub max_step: Real,
    /// Seed for the degenerate-spring direction kick.
    pub seed: u64,
}

impl Default for RelaxOptions {
    fn default() -> Self {
        Self {
            max_iterations: 3000,
            max_allowed_error: 1e-3,
            max_plateau_width: 200,
            max_step: 0.5,
            seed: 69,
        }
    }
}

/// Outcome of a relaxation run.
#[derive(Debug, Clone)]
pub struct RelaxReport {
    /// Iterations actually performed.
    pub iterations: usize,
    /// Mean force at the last iteration.
    pub final_error: Real,
    /// Whether the plateau/threshold rule fired before the iteration cap.
    pub converged: bool,
}

/// A vertex moved by reapplying its enclosing triangle's affine transform
/// instead of by spring forces.
#[derive(Debug, Clone)]
struct PassiveVertex {
    point: Point<2>,
    triangle: usize,
}

/// A [`TransformMesh`] whose vertices are relaxed as a mass-spring system.
///
/// Two vertices are spring-connected iff they co-occur in a mesh triangle;
/// the springs' rest lengths are the undeformed distances, so the fully
/// relaxed free mesh reproduces the original grid. Additional off-grid
/// vertices can be attached with springs ([`SpringMesh::add_vertex`]) or
/// passively bound to one triangle ([`SpringMesh::add_passive_vertex`]).
pub struct SpringMesh {
    mesh: TransformMesh,
    dynamics: Vec<SpringVertex>,
    springs: Vec<Spring>,
    fixed: HashSet<usize>,
    passive: Vec<PassiveVertex>,
    damp: Real,
    dt_stat: ErrorStatistic,
}

impl SpringMesh {
    /// Build the spring system over a fresh triangulated rectangle.
    ///
    /// `spring_weight` scales every spring's force; `max_stretch_factor` is
    /// the tearing limit as a fraction of each spring's rest length; `damp`
    /// is the per-unit-time velocity retention (`damp^dt` after each step).
    pub fn new(
        num_x: usize,
        width: Real,
        height: Real,
        spring_weight: Real,
        max_stretch_factor: Real,
        damp: Real,
    ) -> Self {
        let mesh = TransformMesh::new(num_x, width, height);
        let mut dynamics: Vec<SpringVertex> = (0..mesh.num_vertices())
            .map(|_| SpringVertex::new())
            .collect();
        let mut springs = Vec::new();

        let mut seen: HashMap<(usize, usize), usize> = HashMap::new();
        let triples: Vec<[usize; 3]> = mesh.triangle_vertices().collect();
        for t in triples {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[0], t[2])] {
                let key = (a.min(b), a.max(b));
                if seen.contains_key(&key) {
                    continue;
                }
                let rest = Point::local_distance(mesh.vertex(a), mesh.vertex(b));
                let spring = Spring::new(rest, spring_weight, max_stretch_factor * rest);
                let idx = springs.len();
                springs.push(spring);
                seen.insert(key, idx);
                dynamics[a].add_spring_link(b, idx);
                dynamics[b].add_spring_link(a, idx);
            }
        }

        Self {
            mesh,
            dynamics,
            springs,
            fixed: HashSet::new(),
            passive: Vec::new(),
            damp,
            dt_stat: ErrorStatistic::new(100),
        }
    }

    /// The underlying piecewise-affine mesh.
    pub fn mesh(&self) -> &TransformMesh {
        &self.mesh
    }

    /// Number of springs.
    pub fn num_springs(&self) -> usize {
        self.springs.len()
    }

    /// Dynamic state of a vertex.
    pub fn vertex_dynamics(&self, i: usize) -> &SpringVertex {
        &self.dynamics[i]
    }

    /// Pin a vertex: it exerts forces but never moves.
    pub fn fix_vertex(&mut self, i: usize) -> Result<(), MeshError> {
        if i >= self.dynamics.len() {
            return Err(MeshError::InvalidVertex(i));
        }
        self.fixed.insert(i);
        Ok(())
    }

    /// Displace a vertex's world coordinate and refresh the affected
    /// triangle transforms.
    pub fn set_vertex_world(&mut self, i: usize, w: Coord<2>) -> Result<(), FitError> {
        self.mesh.set_world(i, w);
        self.mesh.update_affine(i)
    }

    /// Attach an off-grid vertex by springs to the corners of its enclosing
    /// triangle. Returns the new vertex index.
    pub fn add_vertex(&mut self, l: Coord<2>, weight: Real) -> Result<usize, MeshError> {
        let triangle = self
            .mesh
            .locate_local(l)
            .ok_or(MeshError::OutsideDomain(l.x, l.y))?;
        let corners: Vec<usize> = self
            .mesh
            .triangle_vertices()
            .nth(triangle)
            .expect("located triangle exists")
            .to_vec();

        let idx = self.mesh.push_extra_vertex(Point::new(l));
        self.dynamics.push(SpringVertex::new());
        for c in corners {
            let rest = Point::local_distance(self.mesh.vertex(idx), self.mesh.vertex(c));
            let spring = Spring::new(rest, weight, Real::INFINITY);
            let s = self.springs.len();
            self.springs.push(spring);
            self.dynamics[idx].add_spring_link(c, s);
            self.dynamics[c].add_spring_link(idx, s);
        }
        Ok(idx)
    }

    /// Bind a location to its enclosing triangle: the point follows that
    /// triangle's affine transform instead of spring dynamics. Returns the
    /// passive-vertex index.
    pub fn add_passive_vertex(&mut self, l: Coord<2>) -> Result<usize, MeshError> {
        let triangle = self
            .mesh
            .locate_local(l)
            .ok_or(MeshError::OutsideDomain(l.x, l.y))?;
        self.passive.push(PassiveVertex {
            point: Point::new(l),
            triangle,
        });
        Ok(self.passive.len() - 1)
    }

    /// Current world position of a passive vertex.
    pub fn passive_world(&self, i: usize) -> Coord<2> {
        *self.passive[i].point.w()
    }

    /// One integration step; returns the mean force magnitude over the
    /// movable vertices.
    ///
    /// `external` may supply one extra force per vertex on top of the spring
    /// forces (the elastic moving-least-squares mesh feeds its control
    /// attraction through this).
    pub(crate) fn step_with_forces(
        &mut self,
        rng: &mut StdRng,
        max_step: Real,
        external: Option<&[Coord<2>]>,
    ) -> Result<Real, FitError> {
        let n = self.dynamics.len();

        // Accumulate forces.
        let mut max_force = 0.0;
        let mut force_sum = 0.0;
        let mut movable = 0usize;
        for i in 0..n {
            let mut f = Coord::<2>::zeros();
            let links: Vec<(usize, usize)> = self.dynamics[i].springs().to_vec();
            for (other, s) in links {
                f += self.springs[s].force(self.mesh.vertex(i).w(), self.mesh.vertex(other).w(), rng);
            }
            if let Some(ext) = external {
                f += ext[i];
            }
            self.dynamics[i].set_force(f);
            if !self.fixed.contains(&i) {
                let m = f.norm();
                max_force = Real::max(max_force, m);
                force_sum += m;
                movable += 1;
            }
        }
        let mean_force = if movable > 0 {
            force_sum / movable as Real
        } else {
            0.0
        };

        if max_force > 0.0 {
            // Adaptive step: displacement per iteration stays under max_step.
            let mut dt = max_step / max_force;
            if !self.dt_stat.is_empty() {
                dt = dt.min(self.dt_stat.mean());
            }

            let mut max_speed = 0.0;
            for i in 0..n {
                if self.fixed.contains(&i) {
                    continue;
                }
                self.dynamics[i].update_velocity(self.damp, dt);
                max_speed = Real::max(max_speed, self.dynamics[i].speed());
            }
            if max_speed > 0.0 {
                dt = dt.min(max_step / max_speed);
            }
            self.dt_stat.add(dt);

            // Integrate positions.
            for i in 0..n {
                if self.fixed.contains(&i) {
                    continue;
                }
                let offset = self.dynamics[i].step_offset(dt);
                let w = *self.mesh.vertex(i).w() + offset;
                self.mesh.set_world(i, w);
            }
        }

        // Refresh the piecewise transforms and drag the passive vertices
        // along.
        self.mesh.update_affines()?;
        for p in &mut self.passive {
            let model = self.mesh.triangle_model(p.triangle);
            p.point.apply(model);
        }

        Ok(mean_force)
    }

    /// Relax until the mean force settles (plateau/threshold rule) or the
    /// iteration cap is reached.
    ///
    /// Fit errors from degenerate (flipped/collapsed) triangles propagate to
    /// the caller; a single broken triangle aborts the run.
    pub fn optimize(&mut self, opts: &RelaxOptions) -> Result<RelaxReport, FitError> {
        let mut rng = StdRng::seed_from_u64(opts.seed);
        let criteria = PlateauCriteria {
            max_allowed_error: opts.max_allowed_error,
            max_plateau_width: opts.max_plateau_width,
            slope_epsilon: 1e-4,
        };
        let mut observer = ErrorStatistic::new(opts.max_plateau_width + 1);

        let mut error = 0.0;
        for i in 0..opts.max_iterations {
            error = self.step_with_forces(&mut rng, opts.max_step, None)?;
            observer.add(error);
            if criteria.converged(&observer, i) {
                debug!("spring mesh settled after {} iterations, mean force {}", i + 1, error);
                return Ok(RelaxReport {
                    iterations: i + 1,
                    final_error: error,
                    converged: true,
                });
            }
        }
        debug!(
            "spring mesh hit the iteration cap {}, mean force {}",
            opts.max_iterations, error
        );
        Ok(RelaxReport {
            iterations: opts.max_iterations,
            final_error: error,
            converged: false,
        })
    }
}

impl Transform<2> for SpringMesh {
    fn apply(&self, p: Coord<2>) -> Coord<2> {
        self.mesh.apply(p)
    }
}

impl InvertibleTransform<2> for SpringMesh {
    fn apply_inverse(&self, p: Coord<2>) -> Result<Coord<2>, NoninvertibleModelError> {
        self.mesh.apply_inverse(p)
    }
}

/// Relax several meshes in lockstep: one sequential pass per iteration
/// across all meshes, no inter-mesh parallelism.
///
/// The shared convergence observer tracks the mean of the per-mesh mean
/// forces, so a group of meshes settles together rather than one by one.
pub fn optimize_meshes(
    meshes: &mut [SpringMesh],
    opts: &RelaxOptions,
) -> Result<RelaxReport, FitError> {
    if meshes.is_empty() {
        return Ok(RelaxReport {
            iterations: 0,
            final_error: 0.0,
            converged: true,
        });
    }
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let criteria = PlateauCriteria {
        max_allowed_error: opts.max_allowed_error,
        max_plateau_width: opts.max_plateau_width,
        slope_epsilon: 1e-4,
    };
    let mut observer = ErrorStatistic::new(opts.max_plateau_width + 1);

    let mut error = 0.0;
    for i in 0..opts.max_iterations {
        let mut sum = 0.0;
        for mesh in meshes.iter_mut() {
            sum += mesh.step_with_forces(&mut rng, opts.max_step, None)?;
        }
        error = sum / meshes.len() as Real;
        observer.add(error);
        if criteria.converged(&observer, i) {
            debug!(
                "{} meshes settled after {} iterations, mean force {}",
                meshes.len(),
                i + 1,
                error
            );
            return Ok(RelaxReport {
                iterations: i + 1,
                final_error: error,
                converged: true,
            });
        }
    }
    Ok(RelaxReport {
        iterations: opts.max_iterations,
        final_error: error,
        converged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_mesh() -> SpringMesh {
        SpringMesh::new(3, 20.0, 20.0, 1.0, 1000.0, 0.6)
    }

    fn relax_opts() -> RelaxOptions {
        RelaxOptions {
            max_iterations: 4000,
            max_allowed_error: 1e-4,
            max_plateau_width: 100,
            max_step: 0.4,
            seed: 7,
        }
    }

    #[test]
    fn springs_come_from_triangle_adjacency() {
        let mesh = small_mesh();
        // Every spring's rest length equals the undeformed vertex distance,
        // so the initial configuration carries no force at all.
        let report = {
            let mut m = small_mesh();
            m.optimize(&RelaxOptions {
                max_iterations: 5,
                ..relax_opts()
            })
            .unwrap()
        };
        assert!(report.final_error == 0.0);
        assert!(mesh.num_springs() > 0);
    }

    #[test]
    fn displaced_vertex_relaxes_back() {
        let mut mesh = small_mesh();
        // Fix everything except one interior vertex, displace it, relax.
        let movable = (0..mesh.mesh().num_vertices())
            .find(|&i| {
                let l = mesh.mesh().vertex(i).l();
                l.x > 0.0 && l.x < 20.0 && l.y > 0.0 && l.y < 20.0
            })
            .expect("interior vertex exists");
        for i in 0..mesh.mesh().num_vertices() {
            if i != movable {
                mesh.fix_vertex(i).unwrap();
            }
        }
        let home = *mesh.mesh().vertex(movable).l();
        mesh.set_vertex_world(movable, home + Coord::<2>::new(1.5, -0.8))
            .unwrap();

        let report = mesh.optimize(&relax_opts()).unwrap();
        let settled = *mesh.mesh().vertex(movable).w();
        assert!(
            (settled - home).norm() < 0.05,
            "vertex settled at ({}, {}), home ({}, {}), report {:?}",
            settled.x,
            settled.y,
            home.x,
            home.y,
            report
        );
    }

    #[test]
    fn passive_vertex_follows_its_triangle() {
        let mut mesh = small_mesh();
        let p = mesh.add_passive_vertex(Coord::<2>::new(1.0, 1.0)).unwrap();

        // Shear the whole mesh rigidly and run a single no-force step: the
        // passive vertex must be re-expressed through its triangle's affine.
        for i in 0..mesh.mesh().num_vertices() {
            let l = *mesh.mesh().vertex(i).l();
            mesh.mesh.set_world(i, l + Coord::<2>::new(5.0, 0.0));
        }
        mesh.mesh.update_affines().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        mesh.step_with_forces(&mut rng, 0.1, None).unwrap();

        let w = mesh.passive_world(p);
        assert!(
            (w - Coord::<2>::new(6.0, 1.0)).norm() < 1e-9,
            "passive vertex at ({}, {})",
            w.x,
            w.y
        );
    }

    #[test]
    fn attached_vertex_is_spring_coupled() {
        let mut mesh = small_mesh();
        let before = mesh.num_springs();
        let idx = mesh.add_vertex(Coord::<2>::new(4.0, 4.0), 1.0).unwrap();
        assert_eq!(mesh.num_springs(), before + 3);
        assert_eq!(mesh.vertex_dynamics(idx).springs().len(), 3);
    }

    #[test]
    fn lockstep_relaxation_settles_all_meshes() {
        let mut meshes = vec![small_mesh(), small_mesh()];
        // Perturb one vertex in each mesh, everything else fixed.
        for mesh in meshes.iter_mut() {
            for i in 1..mesh.mesh().num_vertices() {
                mesh.fix_vertex(i).unwrap();
            }
            let home = *mesh.mesh().vertex(0).l();
            mesh.set_vertex_world(0, home + Coord::<2>::new(0.9, 0.4))
                .unwrap();
        }
        let report = optimize_meshes(&mut meshes, &relax_opts()).unwrap();
        assert!(report.final_error < 1e-3, "report {:?}", report);
    }
}
