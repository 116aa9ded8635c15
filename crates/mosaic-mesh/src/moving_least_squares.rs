//! Moving-least-squares deformation.

use mosaic_core::{Coord, FitError, Model, Point, PointMatch, Real, Transform};

/// A non-parametric deformation computed per query by a freshly weighted
/// local model fit.
///
/// The transform keeps a fixed set of control-point correspondences in
/// flattened arrays. For every query location each control point gets the
/// weight `w₀ · d(location, control)^(-alpha)` and a scratch copy of the
/// model template is fit on the spot; the query then maps through that local
/// model. A query coinciding exactly with a control point short-circuits to
/// the control point's target unmodified.
///
/// The scratch model is created per call rather than shared as a mutable
/// field, so one instance can serve concurrent queries.
#[derive(Debug, Clone)]
pub struct MovingLeastSquaresTransform<M, const D: usize> {
    template: M,
    alpha: Real,
    sources: Vec<Coord<D>>,
    targets: Vec<Coord<D>>,
    weights: Vec<Real>,
}

impl<M: Model<D>, const D: usize> MovingLeastSquaresTransform<M, D> {
    /// Create an empty transform around a model template.
    ///
    /// `alpha` controls how fast control-point influence falls off with
    /// distance; `1.0` is the customary default.
    pub fn new(template: M, alpha: Real) -> Self {
        Self {
            template,
            alpha,
            sources: Vec::new(),
            targets: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// The distance-falloff exponent.
    pub fn alpha(&self) -> Real {
        self.alpha
    }

    /// Adjust the distance-falloff exponent.
    pub fn set_alpha(&mut self, alpha: Real) {
        self.alpha = alpha;
    }

    /// Number of control points.
    pub fn num_controls(&self) -> usize {
        self.sources.len()
    }

    /// Replace the control-point set.
    ///
    /// Fails with `NotEnoughDataPoints` when fewer correspondences are given
    /// than the model template requires.
    pub fn set_matches(&mut self, matches: &[PointMatch<D>]) -> Result<(), FitError> {
        let required = self.template.min_num_matches();
        if matches.len() < required {
            return Err(FitError::NotEnoughDataPoints {
                required,
                given: matches.len(),
            });
        }
        self.sources = matches.iter().map(|m| *m.p1().l()).collect();
        self.targets = matches.iter().map(|m| *m.p2().w()).collect();
        self.weights = matches.iter().map(|m| m.weight()).collect();
        Ok(())
    }
}

impl<M: Model<D>, const D: usize> Transform<D> for MovingLeastSquaresTransform<M, D> {
    fn apply(&self, location: Coord<D>) -> Coord<D> {
        let mut weighted = Vec::with_capacity(self.sources.len());
        for ((s, t), w0) in self
            .sources
            .iter()
            .zip(self.targets.iter())
            .zip(self.weights.iter())
        {
            let d = (location - s).norm();
            if d == 0.0 {
                // Exact coincidence pins the query to the control target.
                return *t;
            }
            let w = w0 * d.powf(-self.alpha);
            weighted.push(PointMatch::with_weight(
                Point::new(*s),
                Point::new(*t),
                w,
            ));
        }

        let mut scratch = self.template.clone();
        match scratch.fit(&weighted) {
            Ok(()) => scratch.apply(location),
            // An unfittable neighbourhood leaves the query where it was.
            Err(_) => location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::synthetic::grid_matches_2d;
    use mosaic_models::{AffineModel2D, TranslationModel2D};

    fn control_grid(f: impl Fn(Coord<2>) -> Coord<2>) -> Vec<PointMatch<2>> {
        grid_matches_2d(4, 4, 10.0, f, 0.0, 0)
    }

    #[test]
    fn exact_control_point_passes_through() {
        let matches = control_grid(|p| p + Coord::<2>::new(3.0, -1.0));
        let mut mls = MovingLeastSquaresTransform::new(AffineModel2D::new(), 1.0);
        mls.set_matches(&matches).unwrap();

        let control = matches[5].p1().l();
        let target = matches[5].p2().w();
        assert_eq!(mls.apply(*control), *target);
    }

    #[test]
    fn uniform_translation_field_is_reproduced_everywhere() {
        let delta = Coord::<2>::new(-2.0, 5.0);
        let matches = control_grid(|p| p + delta);
        let mut mls = MovingLeastSquaresTransform::new(TranslationModel2D::new(), 1.0);
        mls.set_matches(&matches).unwrap();

        for p in [
            Coord::<2>::new(4.2, 7.7),
            Coord::<2>::new(25.0, 13.0),
            Coord::<2>::new(-3.0, -3.0),
        ] {
            assert!((mls.apply(p) - (p + delta)).norm() < 1e-9);
        }
    }

    #[test]
    fn deformation_is_local() {
        // Identity field with one displaced control point: queries near it
        // bend, queries far away barely move.
        let mut matches = control_grid(|p| p);
        let moved = Coord::<2>::new(15.0, 15.0);
        matches.push(PointMatch::new(
            Point::new(moved),
            Point::new(moved + Coord::<2>::new(4.0, 0.0)),
        ));

        let mut mls = MovingLeastSquaresTransform::new(AffineModel2D::new(), 2.0);
        mls.set_matches(&matches).unwrap();

        let near = Coord::<2>::new(15.0, 14.0);
        let far = Coord::<2>::new(0.5, 0.5);
        let near_shift = (mls.apply(near) - near).norm();
        let far_shift = (mls.apply(far) - far).norm();
        assert!(near_shift > 0.5, "near shift {}", near_shift);
        assert!(far_shift < 0.2, "far shift {}", far_shift);
        assert!(near_shift > far_shift);
    }

    #[test]
    fn too_few_controls_are_rejected() {
        let matches = control_grid(|p| p);
        let mut mls = MovingLeastSquaresTransform::new(AffineModel2D::new(), 1.0);
        assert!(mls.set_matches(&matches[..2]).is_err());
    }
}
