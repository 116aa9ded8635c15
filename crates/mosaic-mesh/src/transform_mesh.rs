//! Piecewise-affine transform over a triangulated rectangle.

use mosaic_core::{
    Coord, FitError, InvertibleTransform, Model, NoninvertibleModelError, Point, PointMatch, Real,
    Transform,
};
use mosaic_models::AffineModel2D;

/// One triangle of the mesh: three vertex indices and the affine transform
/// currently fit to their local/world coordinates.
#[derive(Debug, Clone)]
pub(crate) struct Triangle {
    pub(crate) v: [usize; 3],
    pub(crate) model: AffineModel2D,
}

/// A `width × height` rectangle triangulated into a regular grid of up- and
/// down-pointing triangles, each carrying its own [`AffineModel2D`].
///
/// Vertices live in an index-addressed arena; each vertex is a
/// [`Point`] whose local coordinate is the undeformed grid position and
/// whose world coordinate is moved by the caller (or by an optimizer built
/// on top). Every triangle's affine is refit from its three vertices before
/// it is queried: [`TransformMesh::update_affine`] after moving one vertex,
/// [`TransformMesh::update_affines`] after moving many.
///
/// The forward direction locates the query among the triangles' *local*
/// coordinates (the source frame); the inverse direction among their
/// *world* coordinates. A forward query outside the domain passes through
/// unchanged; an inverse query outside the deformed domain has no preimage
/// and fails.
#[derive(Debug, Clone)]
pub struct TransformMesh {
    width: Real,
    height: Real,
    num_x: usize,
    num_y: usize,
    vertices: Vec<Point<2>>,
    triangles: Vec<Triangle>,
    incident: Vec<Vec<usize>>,
}

impl TransformMesh {
    /// Triangulate `width × height` with `num_x` vertex columns.
    ///
    /// The number of rows is derived so triangles come out near-equilateral.
    /// Odd rows are offset by half a column and carry one extra vertex on
    /// each border so the rectangle stays exactly covered.
    ///
    /// # Panics
    ///
    /// Panics if `num_x < 2` or the extent is not positive.
    pub fn new(num_x: usize, width: Real, height: Real) -> Self {
        assert!(num_x >= 2, "a mesh needs at least two vertex columns");
        assert!(
            width > 0.0 && height > 0.0,
            "mesh extent must be positive"
        );

        let dx = width / (num_x - 1) as Real;
        let dy_ideal = dx * (3.0 as Real).sqrt() / 2.0;
        let num_y = ((height / dy_ideal).round() as usize + 1).max(2);
        let dy = height / (num_y - 1) as Real;

        let mut vertices = Vec::new();
        let mut row_start = Vec::with_capacity(num_y);
        for r in 0..num_y {
            let y = r as Real * dy;
            row_start.push(vertices.len());
            if r % 2 == 0 {
                for i in 0..num_x {
                    vertices.push(Point::new(Coord::<2>::new(i as Real * dx, y)));
                }
            } else {
                vertices.push(Point::new(Coord::<2>::new(0.0, y)));
                for i in 1..num_x {
                    vertices.push(Point::new(Coord::<2>::new((i as Real - 0.5) * dx, y)));
                }
                vertices.push(Point::new(Coord::<2>::new(width, y)));
            }
        }

        let mut triangles = Vec::new();
        for r in 0..num_y - 1 {
            let top = row_start[r];
            let bot = row_start[r + 1];
            if r % 2 == 0 {
                // Even row (num_x) over odd row (num_x + 1).
                for i in 0..num_x - 1 {
                    triangles.push(Triangle {
                        v: [top + i, top + i + 1, bot + i + 1],
                        model: AffineModel2D::new(),
                    });
                }
                for i in 0..num_x {
                    triangles.push(Triangle {
                        v: [bot + i, bot + i + 1, top + i],
                        model: AffineModel2D::new(),
                    });
                }
            } else {
                // Odd row (num_x + 1) over even row (num_x).
                for i in 0..num_x {
                    triangles.push(Triangle {
                        v: [top + i, top + i + 1, bot + i],
                        model: AffineModel2D::new(),
                    });
                }
                for i in 0..num_x - 1 {
                    triangles.push(Triangle {
                        v: [bot + i, top + i + 1, bot + i + 1],
                        model: AffineModel2D::new(),
                    });
                }
            }
        }

        let mut incident = vec![Vec::new(); vertices.len()];
        for (t, tri) in triangles.iter().enumerate() {
            for &v in &tri.v {
                incident[v].push(t);
            }
        }

        let mut mesh = Self {
            width,
            height,
            num_x,
            num_y,
            vertices,
            triangles,
            incident,
        };
        mesh.update_affines()
            .expect("a fresh regular grid has no degenerate triangle");
        mesh
    }

    /// Domain extent `(width, height)`.
    pub fn extent(&self) -> (Real, Real) {
        (self.width, self.height)
    }

    /// Number of vertex columns/rows `(num_x, num_y)`.
    pub fn grid_size(&self) -> (usize, usize) {
        (self.num_x, self.num_y)
    }

    /// Number of vertices in the arena.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// A vertex by index.
    pub fn vertex(&self, i: usize) -> &Point<2> {
        &self.vertices[i]
    }

    /// Move a vertex's world coordinate. The caller must refresh the
    /// affected affines afterwards.
    pub fn set_world(&mut self, i: usize, w: Coord<2>) {
        self.vertices[i].set_w(w);
    }

    /// Indices of the triangles touching a vertex.
    pub fn incident_triangles(&self, i: usize) -> &[usize] {
        &self.incident[i]
    }

    /// Vertex index triples of all triangles, in arena order.
    pub fn triangle_vertices(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.triangles.iter().map(|t| t.v)
    }

    /// The affine currently fit to a triangle.
    pub fn triangle_model(&self, t: usize) -> &AffineModel2D {
        &self.triangles[t].model
    }

    /// Append a vertex that is not part of the triangulation.
    ///
    /// Extra vertices participate in nothing here; spring meshes use them to
    /// attach off-grid handles to the same arena.
    pub(crate) fn push_extra_vertex(&mut self, p: Point<2>) -> usize {
        self.vertices.push(p);
        self.incident.push(Vec::new());
        self.vertices.len() - 1
    }

    /// Axis-aligned bounding box of the world coordinates,
    /// `(min, max)` corners.
    pub fn bounding_box(&self) -> (Coord<2>, Coord<2>) {
        let mut min = Coord::<2>::new(Real::INFINITY, Real::INFINITY);
        let mut max = Coord::<2>::new(Real::NEG_INFINITY, Real::NEG_INFINITY);
        for v in &self.vertices {
            let w = v.w();
            min.x = min.x.min(w.x);
            min.y = min.y.min(w.y);
            max.x = max.x.max(w.x);
            max.y = max.y.max(w.y);
        }
        (min, max)
    }

    /// Scale all world coordinates about the origin.
    pub fn scale(&mut self, sx: Real, sy: Real) -> Result<(), FitError> {
        for v in &mut self.vertices {
            let w = *v.w();
            v.set_w(Coord::<2>::new(w.x * sx, w.y * sy));
        }
        self.update_affines()
    }

    /// Refit the affines of all triangles touching one vertex.
    pub fn update_affine(&mut self, vertex: usize) -> Result<(), FitError> {
        let touched = self.incident[vertex].clone();
        for t in touched {
            self.refit_triangle(t)?;
        }
        Ok(())
    }

    /// Refit the affines of all triangles.
    pub fn update_affines(&mut self) -> Result<(), FitError> {
        for t in 0..self.triangles.len() {
            self.refit_triangle(t)?;
        }
        Ok(())
    }

    fn refit_triangle(&mut self, t: usize) -> Result<(), FitError> {
        let vs = self.triangles[t].v;
        let matches: Vec<PointMatch<2>> = vs
            .iter()
            .map(|&i| {
                let v = &self.vertices[i];
                PointMatch::new(Point::new(*v.l()), Point::with_world(*v.l(), *v.w()))
            })
            .collect();
        self.triangles[t].model.fit(&matches)
    }

    /// Index of the first triangle whose *local* corners contain `p`.
    pub fn locate_local(&self, p: Coord<2>) -> Option<usize> {
        self.triangles
            .iter()
            .position(|t| self.contains(t, p, |v| *v.l()))
    }

    /// Index of the first triangle whose *world* corners contain `p`.
    pub fn locate_world(&self, p: Coord<2>) -> Option<usize> {
        self.triangles
            .iter()
            .position(|t| self.contains(t, p, |v| *v.w()))
    }

    fn contains<F>(&self, t: &Triangle, p: Coord<2>, coord: F) -> bool
    where
        F: Fn(&Point<2>) -> Coord<2>,
    {
        let a = coord(&self.vertices[t.v[0]]);
        let b = coord(&self.vertices[t.v[1]]);
        let c = coord(&self.vertices[t.v[2]]);
        point_in_triangle(&a, &b, &c, &p)
    }
}

/// Sign-consistent cross-product containment test; points on an edge count
/// as inside.
fn point_in_triangle(a: &Coord<2>, b: &Coord<2>, c: &Coord<2>, p: &Coord<2>) -> bool {
    let mut sign = 0i8;
    for (s, e) in [(a, b), (b, c), (c, a)] {
        let cross = (e.x - s.x) * (p.y - s.y) - (e.y - s.y) * (p.x - s.x);
        if cross < 0.0 {
            if sign > 0 {
                return false;
            }
            sign = -1;
        } else if cross > 0.0 {
            if sign < 0 {
                return false;
            }
            sign = 1;
        }
    }
    true
}

impl Transform<2> for TransformMesh {
    fn apply(&self, p: Coord<2>) -> Coord<2> {
        match self.locate_local(p) {
            Some(t) => self.triangles[t].model.apply(p),
            None => p,
        }
    }
}

impl InvertibleTransform<2> for TransformMesh {
    fn apply_inverse(&self, p: Coord<2>) -> Result<Coord<2>, NoninvertibleModelError> {
        let t = self.locate_world(p).ok_or(NoninvertibleModelError)?;
        self.triangles[t].model.apply_inverse(p)
    }
}
