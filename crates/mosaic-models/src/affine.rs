//! Affine models in one, two and three dimensions.
//!
//! All fits remove the weighted centroids first and solve the remaining
//! homogeneous problem on the demeaned coordinates: a scalar division in 1D,
//! a direct 2×2 normal-matrix solve in 2D and a 3×3 moment-matrix inverse in
//! 3D. Singular moment matrices (collinear/coplanar input) fail with
//! `IllDefinedDataPoints`.

use mosaic_core::{
    Coord, FitError, InvertibleTransform, Mat3, Model, NoninvertibleModelError, PointMatch, Real,
    Transform, Vec3,
};
use serde::{Deserialize, Serialize};

use crate::centroid::{require_matches, weighted_centroids};

// ─────────────────────────────────────────────────────────────────────────────
// 1D
// ─────────────────────────────────────────────────────────────────────────────

/// A 1D affine map `x ↦ m·x + t`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AffineModel1D {
    m: Real,
    t: Real,
    // cached inverse
    im: Real,
    it: Real,
    invertible: bool,
    cost: Real,
}

impl AffineModel1D {
    /// Identity map with unset cost.
    pub fn new() -> Self {
        Self {
            m: 1.0,
            t: 0.0,
            im: 1.0,
            it: 0.0,
            invertible: true,
            cost: -1.0,
        }
    }

    /// Current `(scale, offset)`.
    pub fn parameters(&self) -> (Real, Real) {
        (self.m, self.t)
    }

    /// Overwrite the parameters.
    pub fn set(&mut self, m: Real, t: Real) {
        self.m = m;
        self.t = t;
        self.update_inverse();
    }

    fn update_inverse(&mut self) {
        if self.m == 0.0 {
            self.invertible = false;
        } else {
            self.invertible = true;
            self.im = 1.0 / self.m;
            self.it = -self.t / self.m;
        }
    }
}

impl Default for AffineModel1D {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<1> for AffineModel1D {
    fn apply(&self, p: Coord<1>) -> Coord<1> {
        Coord::<1>::new(self.m * p[0] + self.t)
    }
}

impl InvertibleTransform<1> for AffineModel1D {
    fn apply_inverse(&self, p: Coord<1>) -> Result<Coord<1>, NoninvertibleModelError> {
        if !self.invertible {
            return Err(NoninvertibleModelError);
        }
        Ok(Coord::<1>::new(self.im * p[0] + self.it))
    }
}

impl Model<1> for AffineModel1D {
    fn min_num_matches(&self) -> usize {
        2
    }

    fn fit(&mut self, matches: &[PointMatch<1>]) -> Result<(), FitError> {
        require_matches(matches, self.min_num_matches())?;
        let (pc, qc, _) = weighted_centroids(matches)?;

        let mut spp = 0.0;
        let mut spq = 0.0;
        for m in matches {
            let w = m.weight();
            let dp = m.p1().l()[0] - pc[0];
            let dq = m.p2().w()[0] - qc[0];
            spp += w * dp * dp;
            spq += w * dp * dq;
        }
        if spp == 0.0 {
            return Err(FitError::IllDefinedDataPoints(
                "all weighted points share one abscissa",
            ));
        }
        self.m = spq / spp;
        self.t = qc[0] - self.m * pc[0];
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

// ─────────────────────────────────────────────────────────────────────────────
// 2D
// ─────────────────────────────────────────────────────────────────────────────

/// A 2D affine map
///
/// ```text
/// | x' |   | m00 m01 |   | x |   | m02 |
/// |    | = |         | · |   | + |     |
/// | y' |   | m10 m11 |   | y |   | m12 |
/// ```
///
/// The inverse coefficients are cached and refreshed on every mutation, so
/// `apply_inverse` costs the same as `apply` once fitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AffineModel2D {
    m00: Real,
    m01: Real,
    m02: Real,
    m10: Real,
    m11: Real,
    m12: Real,
    // cached inverse
    i00: Real,
    i01: Real,
    i02: Real,
    i10: Real,
    i11: Real,
    i12: Real,
    invertible: bool,
    cost: Real,
}

impl AffineModel2D {
    /// Identity map with unset cost.
    pub fn new() -> Self {
        Self {
            m00: 1.0,
            m01: 0.0,
            m02: 0.0,
            m10: 0.0,
            m11: 1.0,
            m12: 0.0,
            i00: 1.0,
            i01: 0.0,
            i02: 0.0,
            i10: 0.0,
            i11: 1.0,
            i12: 0.0,
            invertible: true,
            cost: -1.0,
        }
    }

    /// The six coefficients `(m00, m01, m02, m10, m11, m12)` in row order.
    pub fn coefficients(&self) -> [Real; 6] {
        [self.m00, self.m01, self.m02, self.m10, self.m11, self.m12]
    }

    /// Overwrite the six coefficients in row order.
    pub fn set(&mut self, c: [Real; 6]) {
        self.m00 = c[0];
        self.m01 = c[1];
        self.m02 = c[2];
        self.m10 = c[3];
        self.m11 = c[4];
        self.m12 = c[5];
        self.update_inverse();
    }

    /// The transform as a homogeneous 3×3 matrix.
    pub fn matrix(&self) -> Mat3 {
        Mat3::new(
            self.m00, self.m01, self.m02, self.m10, self.m11, self.m12, 0.0, 0.0, 1.0,
        )
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> Real {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    /// Whether the cached inverse is valid.
    pub fn is_invertible(&self) -> bool {
        self.invertible
    }

    /// Append `other`: the combined map applies `other` first, then `self`.
    pub fn concatenate(&mut self, other: &Self) {
        let a = self.matrix() * other.matrix();
        self.set([
            a[(0, 0)],
            a[(0, 1)],
            a[(0, 2)],
            a[(1, 0)],
            a[(1, 1)],
            a[(1, 2)],
        ]);
    }

    /// Prepend `other`: the combined map applies `self` first, then `other`.
    pub fn pre_concatenate(&mut self, other: &Self) {
        let a = other.matrix() * self.matrix();
        self.set([
            a[(0, 0)],
            a[(0, 1)],
            a[(0, 2)],
            a[(1, 0)],
            a[(1, 1)],
            a[(1, 2)],
        ]);
    }

    /// Parameter-wise blend `(1 - lambda)·a + lambda·b`.
    ///
    /// Used to regularize a higher-order fit with a lower-order one that was
    /// flattened to affine form beforehand.
    pub fn interpolate(a: &Self, b: &Self, lambda: Real) -> Self {
        let l1 = 1.0 - lambda;
        let ca = a.coefficients();
        let cb = b.coefficients();
        let mut out = Self::new();
        out.set([
            l1 * ca[0] + lambda * cb[0],
            l1 * ca[1] + lambda * cb[1],
            l1 * ca[2] + lambda * cb[2],
            l1 * ca[3] + lambda * cb[3],
            l1 * ca[4] + lambda * cb[4],
            l1 * ca[5] + lambda * cb[5],
        ]);
        out
    }

    fn update_inverse(&mut self) {
        let det = self.determinant();
        if det == 0.0 {
            self.invertible = false;
            return;
        }
        self.invertible = true;
        self.i00 = self.m11 / det;
        self.i01 = -self.m01 / det;
        self.i10 = -self.m10 / det;
        self.i11 = self.m00 / det;
        self.i02 = -self.i00 * self.m02 - self.i01 * self.m12;
        self.i12 = -self.i10 * self.m02 - self.i11 * self.m12;
    }
}

impl Default for AffineModel2D {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<2> for AffineModel2D {
    fn apply(&self, p: Coord<2>) -> Coord<2> {
        Coord::<2>::new(
            self.m00 * p.x + self.m01 * p.y + self.m02,
            self.m10 * p.x + self.m11 * p.y + self.m12,
        )
    }
}

impl InvertibleTransform<2> for AffineModel2D {
    fn apply_inverse(&self, p: Coord<2>) -> Result<Coord<2>, NoninvertibleModelError> {
        if !self.invertible {
            return Err(NoninvertibleModelError);
        }
        Ok(Coord::<2>::new(
            self.i00 * p.x + self.i01 * p.y + self.i02,
            self.i10 * p.x + self.i11 * p.y + self.i12,
        ))
    }
}

impl Model<2> for AffineModel2D {
    fn min_num_matches(&self) -> usize {
        3
    }

    fn fit(&mut self, matches: &[PointMatch<2>]) -> Result<(), FitError> {
        require_matches(matches, self.min_num_matches())?;
        let (pc, qc, _) = weighted_centroids(matches)?;

        // Second moments of the demeaned sources and the cross terms.
        let mut a = 0.0; // Σ w dx²
        let mut b = 0.0; // Σ w dx dy
        let mut c = 0.0; // Σ w dy²
        let mut qx_x = 0.0; // Σ w dx qdx
        let mut qx_y = 0.0; // Σ w dy qdx
        let mut qy_x = 0.0; // Σ w dx qdy
        let mut qy_y = 0.0; // Σ w dy qdy
        for m in matches {
            let w = m.weight();
            let dx = m.p1().l().x - pc.x;
            let dy = m.p1().l().y - pc.y;
            let qdx = m.p2().w().x - qc.x;
            let qdy = m.p2().w().y - qc.y;
            a += w * dx * dx;
            b += w * dx * dy;
            c += w * dy * dy;
            qx_x += w * dx * qdx;
            qx_y += w * dy * qdx;
            qy_x += w * dx * qdy;
            qy_y += w * dy * qdy;
        }

        let det = a * c - b * b;
        if det == 0.0 {
            return Err(FitError::IllDefinedDataPoints(
                "source points are collinear",
            ));
        }

        self.m00 = (c * qx_x - b * qx_y) / det;
        self.m01 = (a * qx_y - b * qx_x) / det;
        self.m10 = (c * qy_x - b * qy_y) / det;
        self.m11 = (a * qy_y - b * qy_x) / det;
        self.m02 = qc.x - self.m00 * pc.x - self.m01 * pc.y;
        self.m12 = qc.y - self.m10 * pc.x - self.m11 * pc.y;
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

// ─────────────────────────────────────────────────────────────────────────────
// 3D
// ─────────────────────────────────────────────────────────────────────────────

/// A 3D affine map `p ↦ M·p + t` with `M` a full 3×3 matrix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AffineModel3D {
    m: Mat3,
    t: Vec3,
    im: Mat3,
    it: Vec3,
    invertible: bool,
    cost: Real,
}

impl AffineModel3D {
    /// Identity map with unset cost.
    pub fn new() -> Self {
        Self {
            m: Mat3::identity(),
            t: Vec3::zeros(),
            im: Mat3::identity(),
            it: Vec3::zeros(),
            invertible: true,
            cost: -1.0,
        }
    }

    /// Linear part and offset.
    pub fn parameters(&self) -> (Mat3, Vec3) {
        (self.m, self.t)
    }

    /// Overwrite linear part and offset.
    pub fn set(&mut self, m: Mat3, t: Vec3) {
        self.m = m;
        self.t = t;
        self.update_inverse();
    }

    fn update_inverse(&mut self) {
        match self.m.try_inverse() {
            Some(im) => {
                self.invertible = true;
                self.im = im;
                self.it = -(im * self.t);
            }
            None => self.invertible = false,
        }
    }
}

impl Default for AffineModel3D {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<3> for AffineModel3D {
    fn apply(&self, p: Coord<3>) -> Coord<3> {
        self.m * p + self.t
    }
}

impl InvertibleTransform<3> for AffineModel3D {
    fn apply_inverse(&self, p: Coord<3>) -> Result<Coord<3>, NoninvertibleModelError> {
        if !self.invertible {
            return Err(NoninvertibleModelError);
        }
        Ok(self.im * p + self.it)
    }
}

impl Model<3> for AffineModel3D {
    fn min_num_matches(&self) -> usize {
        4
    }

    fn fit(&mut self, matches: &[PointMatch<3>]) -> Result<(), FitError> {
        require_matches(matches, self.min_num_matches())?;
        let (pc, qc, _) = weighted_centroids(matches)?;

        let mut pp = Mat3::zeros(); // Σ w dp dpᵀ
        let mut qp = Mat3::zeros(); // Σ w dq dpᵀ
        for m in matches {
            let w = m.weight();
            let dp = m.p1().l() - pc;
            let dq = m.p2().w() - qc;
            pp += w * dp * dp.transpose();
            qp += w * dq * dp.transpose();
        }

        let Some(pp_inv) = pp.try_inverse() else {
            return Err(FitError::IllDefinedDataPoints("source points are coplanar"));
        };
        self.m = qp * pp_inv;
        self.t = qc - self.m * pc;
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

// ─────────────────────────────────────────────────────────────────────────────
