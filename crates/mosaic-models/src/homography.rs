//! 2D homography (plane projective transform).
//!
//! Four correspondences are solved exactly by composing two unit-square
//! projective maps; more than four go through a weighted, Hartley-normalized
//! DLT and the right singular vector of the smallest singular value, the
//! standard way of solving `A h = 0`.

use mosaic_core::{
    sanitize_coordinate, Coord, FitError, InvertibleTransform, Mat3, Model,
    NoninvertibleModelError, PointMatch, Real, Transform, Vec2, Vec3,
};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::centroid::require_matches;

/// A homogeneous 3×3 projective transform of the plane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HomographyModel2D {
    h: Mat3,
    ih: Mat3,
    invertible: bool,
    cost: Real,
}

impl HomographyModel2D {
    /// Identity transform with unset cost.
    pub fn new() -> Self {
        Self {
            h: Mat3::identity(),
            ih: Mat3::identity(),
            invertible: true,
            cost: -1.0,
        }
    }

    /// The homogeneous matrix.
    pub fn matrix(&self) -> Mat3 {
        self.h
    }

    /// Overwrite the homogeneous matrix.
    pub fn set(&mut self, h: Mat3) {
        self.h = h;
        self.update_inverse();
    }

    /// Whether the cached inverse is valid.
    pub fn is_invertible(&self) -> bool {
        self.invertible
    }

    fn update_inverse(&mut self) {
        match self.h.try_inverse() {
            Some(ih) => {
                self.invertible = true;
                self.ih = ih;
            }
            None => self.invertible = false,
        }
    }
}

impl Default for HomographyModel2D {
    fn default() -> Self {
        Self::new()
    }
}

fn project(h: &Mat3, p: Coord<2>) -> Coord<2> {
    let v = h * Vec3::new(p.x, p.y, 1.0);
    Coord::<2>::new(v.x / v.z, v.y / v.z)
}

impl Transform<2> for HomographyModel2D {
    fn apply(&self, p: Coord<2>) -> Coord<2> {
        project(&self.h, p)
    }
}

impl InvertibleTransform<2> for HomographyModel2D {
    fn apply_inverse(&self, p: Coord<2>) -> Result<Coord<2>, NoninvertibleModelError> {
        if !self.invertible {
            return Err(NoninvertibleModelError);
        }
        Ok(project(&self.ih, p))
    }
}

impl Model<2> for HomographyModel2D {
    fn min_num_matches(&self) -> usize {
        4
    }

    fn fit(&mut self, matches: &[PointMatch<2>]) -> Result<(), FitError> {
        require_matches(matches, self.min_num_matches())?;

        // Decompositions do not tolerate NaN/Inf; clamp to 1.0 up front.
        let sources: Vec<Vec2> = matches
            .iter()
            .map(|m| sanitize_coordinate(m.p1().l()))
            .collect();
        let targets: Vec<Vec2> = matches
            .iter()
            .map(|m| sanitize_coordinate(m.p2().w()))
            .collect();

        let h = if matches.len() == 4 {
            exact_homography(&sources, &targets)?
        } else {
            let weights: Vec<Real> = matches.iter().map(|m| m.weight()).collect();
            dlt_homography(&sources, &targets, &weights)?
        };

        // Normalize such that h22 == 1 when possible.
        let scale = h[(2, 2)];
        self.h = if scale.abs() > Real::EPSILON {
            h / scale
        } else {
            h
        };
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

/// Projective map sending the unit square corners
/// `(0,0), (1,0), (1,1), (0,1)` onto the four given points.
fn square_to_quad(q: &[Vec2]) -> Result<Mat3, FitError> {
    let (x0, y0) = (q[0].x, q[0].y);
    let (x1, y1) = (q[1].x, q[1].y);
    let (x2, y2) = (q[2].x, q[2].y);
    let (x3, y3) = (q[3].x, q[3].y);

    let sx = x0 - x1 + x2 - x3;
    let sy = y0 - y1 + y2 - y3;
    let dx1 = x1 - x2;
    let dx2 = x3 - x2;
    let dy1 = y1 - y2;
    let dy2 = y3 - y2;

    let det = dx1 * dy2 - dx2 * dy1;
    if det == 0.0 {
        return Err(FitError::IllDefinedDataPoints("degenerate quadrilateral"));
    }
    let g = (sx * dy2 - sy * dx2) / det;
    let h = (dx1 * sy - dy1 * sx) / det;

    Ok(Mat3::new(
        x1 - x0 + g * x1,
        x3 - x0 + h * x3,
        x0,
        y1 - y0 + g * y1,
        y3 - y0 + h * y3,
        y0,
        g,
        h,
        1.0,
    ))
}

/// Exact four-point solution: compose the unit-square maps of both quads.
fn exact_homography(sources: &[Vec2], targets: &[Vec2]) -> Result<Mat3, FitError> {
    let hp = square_to_quad(sources)?;
    let hq = square_to_quad(targets)?;
    let hp_inv = hp
        .try_inverse()
        .ok_or(FitError::IllDefinedDataPoints("degenerate quadrilateral"))?;
    Ok(hq * hp_inv)
}

/// Hartley normalization: zero mean, average distance `√2`.
fn normalize_points(points: &[Vec2]) -> Result<(Vec<Vec2>, Mat3), FitError> {
    let n = points.len() as Real;
    let mut c = Vec2::zeros();
    for p in points {
        c += p;
    }
    c /= n;

    let mut mean_dist = 0.0;
    for p in points {
        mean_dist += (p - c).norm();
    }
    mean_dist /= n;
    if mean_dist == 0.0 {
        return Err(FitError::IllDefinedDataPoints("all points coincide"));
    }

    let s = (2.0 as Real).sqrt() / mean_dist;
    let t = Mat3::new(s, 0.0, -s * c.x, 0.0, s, -s * c.y, 0.0, 0.0, 1.0);
    let normalized = points.iter().map(|p| (p - c) * s).collect();
    Ok((normalized, t))
}

/// Weighted DLT: solve `A h = 0` via SVD, rows scaled by `√w`.
fn dlt_homography(sources: &[Vec2], targets: &[Vec2], weights: &[Real]) -> Result<Mat3, FitError> {
    let n = sources.len();
    let (src_n, t_p) = normalize_points(sources)?;
    let (dst_n, t_q) = normalize_points(targets)?;

    let mut a = DMatrix::<Real>::zeros(2 * n, 9);
    for (i, ((p, q), w)) in src_n.iter().zip(dst_n.iter()).zip(weights.iter()).enumerate() {
        let sw = w.max(0.0).sqrt();
        let x = p.x;
        let y = p.y;
        let u = q.x;
        let v = q.y;

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = sw * -x;
        a[(r0, 1)] = sw * -y;
        a[(r0, 2)] = sw * -1.0;
        a[(r0, 6)] = sw * u * x;
        a[(r0, 7)] = sw * u * y;
        a[(r0, 8)] = sw * u;

        a[(r1, 3)] = sw * -x;
        a[(r1, 4)] = sw * -y;
        a[(r1, 5)] = sw * -1.0;
        a[(r1, 6)] = sw * v * x;
        a[(r1, 7)] = sw * v * y;
        a[(r1, 8)] = sw * v;
    }

    // Smallest singular value's right singular vector solves A h = 0.
    let svd = a.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or(FitError::IllDefinedDataPoints("svd failed"))?;
    let h_vec = v_t.row(v_t.nrows() - 1);

    let mut h_n = Mat3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_n[(r, c)] = h_vec[3 * r + c];
        }
    }

    let t_q_inv = t_q
        .try_inverse()
        .ok_or(FitError::IllDefinedDataPoints("svd failed"))?;
    Ok(t_q_inv * h_n * t_p)
}
