//! Spring-regularized moving-least-squares mesh.

use log::debug;
use mosaic_core::{
    Coord, ErrorStatistic, FitError, InvertibleTransform, Model, NoninvertibleModelError,
    PlateauCriteria, Point, PointMatch, Real, Transform,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::spring_mesh::{RelaxOptions, RelaxReport, SpringMesh};

/// A spring mesh whose vertices are additionally attracted towards a
/// per-vertex moving-least-squares estimate.
///
/// Each relaxation pass computes, for every grid vertex, a local model fit
/// against the control correspondences weighted by
/// `w₀ · d(vertex, control)^(-alpha)` and pulls the vertex towards where
/// that model sends it. The spring system smooths the result, so sparse or
/// noisy control points deform the mesh without ripping it apart.
pub struct ElasticMovingLeastSquaresMesh<M: Model<2>> {
    mesh: SpringMesh,
    template: M,
    alpha: Real,
    matches: Vec<PointMatch<2>>,
    /// Attraction strength towards the per-vertex estimate.
    control_weight: Real,
}

impl<M: Model<2>> ElasticMovingLeastSquaresMesh<M> {
    /// Build over a fresh triangulated rectangle.
    ///
    /// `alpha` is the moving-least-squares falloff exponent;
    /// `control_weight` scales the attraction towards the per-vertex
    /// estimates relative to the unit spring weights.
    pub fn new(
        num_x: usize,
        width: Real,
        height: Real,
        template: M,
        alpha: Real,
        control_weight: Real,
    ) -> Self {
        Self {
            mesh: SpringMesh::new(num_x, width, height, 1.0, 1000.0, 0.6),
            template,
            alpha,
            matches: Vec::new(),
            control_weight,
        }
    }

    /// The underlying spring mesh.
    pub fn spring_mesh(&self) -> &SpringMesh {
        &self.mesh
    }

    /// Add one control correspondence.
    pub fn add_match(&mut self, m: PointMatch<2>) {
        self.matches.push(m);
    }

    /// Replace the control-point set.
    ///
    /// Fails with `NotEnoughDataPoints` when fewer correspondences are given
    /// than the model template requires.
    pub fn set_matches(&mut self, matches: Vec<PointMatch<2>>) -> Result<(), FitError> {
        let required = self.template.min_num_matches();
        if matches.len() < required {
            return Err(FitError::NotEnoughDataPoints {
                required,
                given: matches.len(),
            });
        }
        self.matches = matches;
        Ok(())
    }

    /// The moving-least-squares estimate for one location: where the
    /// locally weighted model sends it, or `None` when the local fit is
    /// degenerate.
    fn mls_target(&self, l: &Coord<2>) -> Option<Coord<2>> {
        let mut weighted = Vec::with_capacity(self.matches.len());
        for m in &self.matches {
            let d = (l - m.p1().l()).norm();
            if d == 0.0 {
                return Some(*m.p2().w());
            }
            weighted.push(PointMatch::with_weight(
                Point::new(*m.p1().l()),
                Point::new(*m.p2().w()),
                m.weight() * d.powf(-self.alpha),
            ));
        }
        let mut scratch = self.template.clone();
        scratch.fit(&weighted).ok()?;
        Some(scratch.apply(*l))
    }

    /// Relax the mesh towards the control field until the mean force
    /// settles or the iteration cap is reached.
    pub fn optimize(&mut self, opts: &RelaxOptions) -> Result<RelaxReport, FitError> {
        let mut rng = StdRng::seed_from_u64(opts.seed);
        let criteria = PlateauCriteria {
            max_allowed_error: opts.max_allowed_error,
            max_plateau_width: opts.max_plateau_width,
            slope_epsilon: 1e-4,
        };
        let mut observer = ErrorStatistic::new(opts.max_plateau_width + 1);

        let n = self.mesh.mesh().num_vertices();
        let mut error = 0.0;
        for i in 0..opts.max_iterations {
            // Control attraction, recomputed each pass from the current
            // vertex positions.
            let mut external = vec![Coord::<2>::zeros(); n];
            for (v, ext) in external.iter_mut().enumerate() {
                let l = *self.mesh.mesh().vertex(v).l();
                if let Some(target) = self.mls_target(&l) {
                    let w = self.mesh.mesh().vertex(v).w();
                    *ext = (target - w) * self.control_weight;
                }
            }

            error = self
                .mesh
                .step_with_forces(&mut rng, opts.max_step, Some(&external))?;
            observer.add(error);
            if criteria.converged(&observer, i) {
                debug!(
                    "elastic mls mesh settled after {} iterations, mean force {}",
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
}

impl<M: Model<2>> Transform<2> for ElasticMovingLeastSquaresMesh<M> {
    fn apply(&self, p: Coord<2>) -> Coord<2> {
        self.mesh.apply(p)
    }
}

impl<M: Model<2>> InvertibleTransform<2> for ElasticMovingLeastSquaresMesh<M> {
    fn apply_inverse(&self, p: Coord<2>) -> Result<Coord<2>, NoninvertibleModelError> {
        self.mesh.apply_inverse(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::synthetic::grid_matches_2d;
    use mosaic_models::TranslationModel2D;

    #[test]
    fn pure_translation_field_moves_the_whole_mesh() {
        let delta = Coord::<2>::new(2.0, -1.0);
        let controls = grid_matches_2d(4, 4, 6.0, |p| p + delta, 0.0, 0);

        let mut mesh = ElasticMovingLeastSquaresMesh::new(
            3,
            18.0,
            18.0,
            TranslationModel2D::new(),
            1.0,
            1.0,
        );
        mesh.set_matches(controls).unwrap();

        let report = mesh
            .optimize(&RelaxOptions {
                max_iterations: 4000,
                max_allowed_error: 1e-4,
                max_plateau_width: 100,
                max_step: 0.4,
                seed: 3,
            })
            .unwrap();

        let p = Coord::<2>::new(9.0, 9.0);
        let q = mesh.apply(p);
        assert!(
            (q - (p + delta)).norm() < 0.1,
            "query mapped to ({}, {}), report {:?}",
            q.x,
            q.y,
            report
        );
    }

    #[test]
    fn too_few_controls_are_rejected() {
        let mut mesh = ElasticMovingLeastSquaresMesh::new(
            3,
            10.0,
            10.0,
            TranslationModel2D::new(),
            1.0,
            1.0,
        );
        assert!(mesh.set_matches(Vec::new()).is_err());
    }
}
