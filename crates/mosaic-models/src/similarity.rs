//! Similarity (isotropic scale + rotation + translation) models.

use mosaic_core::{
    Coord, FitError, InvertibleTransform, Mat3, Model, NoninvertibleModelError, PointMatch, Real,
    Transform, Vec3,
};
use serde::{Deserialize, Serialize};

use crate::centroid::{require_matches, weighted_centroids};
use crate::rigid::horn_rotation;

/// A 2D similarity `p ↦ s·R·p + t`, stored as the scaled rotation
/// `(s·cos, s·sin)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityModel2D {
    scos: Real,
    ssin: Real,
    tx: Real,
    ty: Real,
    // cached inverse
    icos: Real,
    isin: Real,
    itx: Real,
    ity: Real,
    invertible: bool,
    cost: Real,
}

impl SimilarityModel2D {
    /// Identity transform with unset cost.
    pub fn new() -> Self {
        Self {
            scos: 1.0,
            ssin: 0.0,
            tx: 0.0,
            ty: 0.0,
            icos: 1.0,
            isin: 0.0,
            itx: 0.0,
            ity: 0.0,
            invertible: true,
            cost: -1.0,
        }
    }

    /// Isotropic scale factor.
    pub fn scale(&self) -> Real {
        (self.scos * self.scos + self.ssin * self.ssin).sqrt()
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> Real {
        self.ssin.atan2(self.scos)
    }

    /// Translation component.
    pub fn translation(&self) -> Coord<2> {
        Coord::<2>::new(self.tx, self.ty)
    }

    /// Overwrite scale, rotation (radians) and translation.
    pub fn set(&mut self, scale: Real, angle: Real, tx: Real, ty: Real) {
        self.scos = scale * angle.cos();
        self.ssin = scale * angle.sin();
        self.tx = tx;
        self.ty = ty;
        self.update_inverse();
    }

    fn update_inverse(&mut self) {
        let det = self.scos * self.scos + self.ssin * self.ssin;
        if det == 0.0 {
            self.invertible = false;
            return;
        }
        self.invertible = true;
        self.icos = self.scos / det;
        self.isin = -self.ssin / det;
        self.itx = -(self.icos * self.tx - self.isin * self.ty);
        self.ity = -(self.isin * self.tx + self.icos * self.ty);
    }
}

impl Default for SimilarityModel2D {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<2> for SimilarityModel2D {
    fn apply(&self, p: Coord<2>) -> Coord<2> {
        Coord::<2>::new(
            self.scos * p.x - self.ssin * p.y + self.tx,
            self.ssin * p.x + self.scos * p.y + self.ty,
        )
    }
}

impl InvertibleTransform<2> for SimilarityModel2D {
    fn apply_inverse(&self, p: Coord<2>) -> Result<Coord<2>, NoninvertibleModelError> {
        if !self.invertible {
            return Err(NoninvertibleModelError);
        }
        Ok(Coord::<2>::new(
            self.icos * p.x - self.isin * p.y + self.itx,
            self.isin * p.x + self.icos * p.y + self.ity,
        ))
    }
}

impl Model<2> for SimilarityModel2D {
    fn min_num_matches(&self) -> usize {
        2
    }

    fn fit(&mut self, matches: &[PointMatch<2>]) -> Result<(), FitError> {
        require_matches(matches, self.min_num_matches())?;
        let (pc, qc, _) = weighted_centroids(matches)?;

        let mut a = 0.0; // Σ w (dp · dq)
        let mut b = 0.0; // Σ w (dp × dq)
        let mut d = 0.0; // Σ w |dp|²
        for m in matches {
            let w = m.weight();
            let dx = m.p1().l().x - pc.x;
            let dy = m.p1().l().y - pc.y;
            let qdx = m.p2().w().x - qc.x;
            let qdy = m.p2().w().y - qc.y;
            a += w * (dx * qdx + dy * qdy);
            b += w * (dx * qdy - dy * qdx);
            d += w * (dx * dx + dy * dy);
        }
        if d == 0.0 {
            return Err(FitError::IllDefinedDataPoints(
                "all weighted source points coincide",
            ));
        }
        self.scos = a / d;
        self.ssin = b / d;
        self.tx = qc.x - self.scos * pc.x + self.ssin * pc.y;
        self.ty = qc.y - self.ssin * pc.x - self.scos * pc.y;
        self.update_inverse();
        Ok(())
    }

    fn cost(&self) -> Real {
        self.cost
    }

    fn set_cost(&mut self, cost: Real) {
        self.cost = cost;
    }
}

/// A 3D similarity `p ↦ s·R·p + t`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityModel3D {
    r: Mat3,
    s: Real,
    t: Vec3,
    cost: Real,
}

impl SimilarityModel3D {
    /// Identity transform with unset cost.
    pub fn new() -> Self {
        Self {
            r: Mat3::identity(),
            s: 1.0,
            t: Vec3::zeros(),
            cost: -1.0,
        }
    }

    /// Rotation, scale and translation.
    pub fn parameters(&self) -> (Mat3, Real, Vec3) {
        (self.r, self.s, self.t)
    }
}

impl Default for SimilarityModel3D {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<3> for SimilarityModel3D {
    fn apply(&self, p: Coord<3>) -> Coord<3> {
        self.r * p * self.s + self.t
    }
}

impl InvertibleTransform<3> for SimilarityModel3D {
    fn apply_inverse(&self, p: Coord<3>) -> Result<Coord<3>, NoninvertibleModelError> {
        if self.s == 0.0 {
            return Err(NoninvertibleModelError);
        }
        Ok(self.r.transpose() * (p - self.t) / self.s)
    }
}

impl Model<3> for SimilarityModel3D {
    fn min_num_matches(&self) -> usize {
        3
    }

    fn fit(&mut self, matches: &[PointMatch<3>]) -> Result<(), FitError> {
        require_matches(matches, self.min_num_matches())?;
        let (pc, qc, _) = weighted_centroids(matches)?;
        let r = horn_rotation(matches, &pc, &qc)?;

        // Scale: projection of the rotated sources onto the targets.
        let mut num = 0.0;
        let mut den = 0.0;
        for m in matches {
            let w = m.weight();
            let dp = m.p1().l() - pc;
            let dq = m.p2().w() - qc;
            num += w * dq.dot(&(r * dp));
            den += w * dp.norm_squared();
        }
        if den == 0.0 {
            return Err(FitError::IllDefinedDataPoints(
                "all weighted source points coincide",
            ));
        }
        self.r = r;
        self.s = num / den;
        self.t = qc - r * pc * self.s;
        Ok(())
    }

    fn cost(&self) -> Real {
        self.cost
    }

    fn set_cost(&mut self, cost: Real) {
        self.cost = cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::synthetic::{grid_matches_2d, scatter_matches_3d};
    use nalgebra::UnitQuaternion;

    #[test]
    fn similarity2d_recovers_scaled_rotation() {
        let angle: Real = -0.4;
        let scale = 1.75;
        let (s, c) = angle.sin_cos();
        let matches = grid_matches_2d(
            5,
            5,
            1.0,
            |p| {
                Coord::<2>::new(
                    scale * (c * p.x - s * p.y) + 2.0,
                    scale * (s * p.x + c * p.y) - 7.0,
                )
            },
            0.0,
            0,
        );
        let mut model = SimilarityModel2D::new();
        model.fit(&matches).unwrap();
        assert!((model.scale() - scale).abs() < 1e-12);
        assert!((model.angle() - angle).abs() < 1e-12);
        assert!((model.translation() - Coord::<2>::new(2.0, -7.0)).norm() < 1e-10);
    }

    #[test]
    fn similarity2d_inverse_round_trip() {
        let mut model = SimilarityModel2D::new();
        model.set(0.5, 2.2, 10.0, -3.0);
        let p = Coord::<2>::new(-1.0, 6.0);
        let back = model.apply_inverse(model.apply(p)).unwrap();
        assert!((back - p).norm() < 1e-12);
    }

    #[test]
    fn similarity2d_zero_scale_inverse_fails() {
        let mut model = SimilarityModel2D::new();
        model.set(0.0, 0.0, 1.0, 1.0);
        assert_eq!(
            model.apply_inverse(Coord::<2>::zeros()),
            Err(NoninvertibleModelError)
        );
    }

    #[test]
    fn similarity3d_recovers_scale() {
        let rot = UnitQuaternion::from_axis_angle(&Vec3::z_axis(), 0.9);
        let r = *rot.to_rotation_matrix().matrix();
        let matches = scatter_matches_3d(25, 4.0, |p| r * p * 0.6 + Vec3::new(0.0, 1.0, 2.0), 0.0, 3);
        let mut model = SimilarityModel3D::new();
        model.fit(&matches).unwrap();
        let (gr, gs, gt) = model.parameters();
        assert!((gs - 0.6).abs() < 1e-9);
        assert!((gr - r).norm() < 1e-9);
        assert!((gt - Vec3::new(0.0, 1.0, 2.0)).norm() < 1e-9);
    }
}
