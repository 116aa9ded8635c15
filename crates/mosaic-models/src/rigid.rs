//! Rigid (rotation + translation) models.
//!
//! The 2D fit is the closed-form Procrustes solution on demeaned
//! coordinates; the 3D fit uses Horn's quaternion method, taking the
//! eigenvector of the largest eigenvalue of the symmetric 4×4 moment matrix.

use mosaic_core::{
    Coord, FitError, InvertibleTransform, Mat3, Mat4, Model, NoninvertibleModelError, PointMatch,
    Real, Transform, Vec3,
};
use nalgebra::{Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::centroid::{require_matches, weighted_centroids};

/// A 2D rotation + translation `p ↦ R·p + t`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RigidModel2D {
    cos: Real,
    sin: Real,
    tx: Real,
    ty: Real,
    cost: Real,
}

impl RigidModel2D {
    /// Identity transform with unset cost.
    pub fn new() -> Self {
        Self {
            cos: 1.0,
            sin: 0.0,
            tx: 0.0,
            ty: 0.0,
            cost: -1.0,
        }
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> Real {
        self.sin.atan2(self.cos)
    }

    /// Translation component.
    pub fn translation(&self) -> Coord<2> {
        Coord::<2>::new(self.tx, self.ty)
    }

    /// Overwrite rotation (radians) and translation.
    pub fn set(&mut self, angle: Real, tx: Real, ty: Real) {
        self.cos = angle.cos();
        self.sin = angle.sin();
        self.tx = tx;
        self.ty = ty;
    }
}

impl Default for RigidModel2D {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<2> for RigidModel2D {
    fn apply(&self, p: Coord<2>) -> Coord<2> {
        Coord::<2>::new(
            self.cos * p.x - self.sin * p.y + self.tx,
            self.sin * p.x + self.cos * p.y + self.ty,
        )
    }
}

impl InvertibleTransform<2> for RigidModel2D {
    fn apply_inverse(&self, p: Coord<2>) -> Result<Coord<2>, NoninvertibleModelError> {
        // A rotation is always invertible; the inverse rotation is the
        // transpose.
        let x = p.x - self.tx;
        let y = p.y - self.ty;
        Ok(Coord::<2>::new(
            self.cos * x + self.sin * y,
            -self.sin * x + self.cos * y,
        ))
    }
}

impl Model<2> for RigidModel2D {
    fn min_num_matches(&self) -> usize {
        2
    }

    fn fit(&mut self, matches: &[PointMatch<2>]) -> Result<(), FitError> {
        require_matches(matches, self.min_num_matches())?;
        let (pc, qc, _) = weighted_centroids(matches)?;

        let mut a = 0.0; // Σ w (dp · dq)
        let mut b = 0.0; // Σ w (dp × dq)
        for m in matches {
            let w = m.weight();
            let dx = m.p1().l().x - pc.x;
            let dy = m.p1().l().y - pc.y;
            let qdx = m.p2().w().x - qc.x;
            let qdy = m.p2().w().y - qc.y;
            a += w * (dx * qdx + dy * qdy);
            b += w * (dx * qdy - dy * qdx);
        }
        let norm = (a * a + b * b).sqrt();
        if norm == 0.0 {
            return Err(FitError::IllDefinedDataPoints(
                "rotation is unconstrained by the weighted points",
            ));
        }
        self.cos = a / norm;
        self.sin = b / norm;
        self.tx = qc.x - self.cos * pc.x + self.sin * pc.y;
        self.ty = qc.y - self.sin * pc.x - self.cos * pc.y;
        Ok(())
    }

    fn cost(&self) -> Real {
        self.cost
    }

    fn set_cost(&mut self, cost: Real) {
        self.cost = cost;
    }
}

/// A 3D rotation + translation `p ↦ R·p + t`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RigidModel3D {
    r: Mat3,
    t: Vec3,
    cost: Real,
}

impl RigidModel3D {
    /// Identity transform with unset cost.
    pub fn new() -> Self {
        Self {
            r: Mat3::identity(),
            t: Vec3::zeros(),
            cost: -1.0,
        }
    }

    /// Rotation matrix and translation.
    pub fn parameters(&self) -> (Mat3, Vec3) {
        (self.r, self.t)
    }

    /// Overwrite rotation and translation. The caller is responsible for
    /// passing a proper rotation matrix.
    pub fn set(&mut self, r: Mat3, t: Vec3) {
        self.r = r;
        self.t = t;
    }
}

impl Default for RigidModel3D {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<3> for RigidModel3D {
    fn apply(&self, p: Coord<3>) -> Coord<3> {
        self.r * p + self.t
    }
}

impl InvertibleTransform<3> for RigidModel3D {
    fn apply_inverse(&self, p: Coord<3>) -> Result<Coord<3>, NoninvertibleModelError> {
        Ok(self.r.transpose() * (p - self.t))
    }
}

impl Model<3> for RigidModel3D {
    fn min_num_matches(&self) -> usize {
        3
    }

    fn fit(&mut self, matches: &[PointMatch<3>]) -> Result<(), FitError> {
        require_matches(matches, self.min_num_matches())?;
        let (pc, qc, _) = weighted_centroids(matches)?;
        let r = horn_rotation(matches, &pc, &qc)?;
        self.r = r;
        self.t = qc - r * pc;
        Ok(())
    }

    fn cost(&self) -> Real {
        self.cost
    }

    fn set_cost(&mut self, cost: Real) {
        self.cost = cost;
    }
}

/// Best rotation mapping the demeaned sources onto the demeaned targets,
/// via the quaternion eigenvector of Horn's symmetric 4×4 matrix.
pub(crate) fn horn_rotation<'a, I>(
    matches: I,
    pc: &Coord<3>,
    qc: &Coord<3>,
) -> Result<Mat3, FitError>
where
    I: IntoIterator<Item = &'a PointMatch<3>>,
{
    let mut s = Mat3::zeros(); // Σ w dp dqᵀ
    for m in matches {
        let w = m.weight();
        let dp = m.p1().l() - pc;
        let dq = m.p2().w() - qc;
        s += w * dp * dq.transpose();
    }
    if s.norm() == 0.0 {
        return Err(FitError::IllDefinedDataPoints(
            "rotation is unconstrained by the weighted points",
        ));
    }

    let (sxx, sxy, sxz) = (s[(0, 0)], s[(0, 1)], s[(0, 2)]);
    let (syx, syy, syz) = (s[(1, 0)], s[(1, 1)], s[(1, 2)]);
    let (szx, szy, szz) = (s[(2, 0)], s[(2, 1)], s[(2, 2)]);

    let n = Mat4::new(
        sxx + syy + szz,
        syz - szy,
        szx - sxz,
        sxy - syx,
        syz - szy,
        sxx - syy - szz,
        sxy + syx,
        szx + sxz,
        szx - sxz,
        sxy + syx,
        -sxx + syy - szz,
        syz + szy,
        sxy - syx,
        szx + sxz,
        syz + szy,
        -sxx - syy + szz,
    );

    let eigen = n.symmetric_eigen();
    let mut best = 0;
    for i in 1..4 {
        if eigen.eigenvalues[i] > eigen.eigenvalues[best] {
            best = i;
        }
    }
    let q = eigen.eigenvectors.column(best);
    let quat = Quaternion::new(q[0], q[1], q[2], q[3]);
    let unit = UnitQuaternion::from_quaternion(quat);
    Ok(*unit.to_rotation_matrix().matrix())
}
