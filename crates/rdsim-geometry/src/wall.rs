//! Triangular walls and the edges that join them.

use rdsim_core::id::{SurfaceClassId, WallIndex};
use rdsim_core::rng::SimRng;
use rdsim_core::vec::{Vec2, Vec3};

/// One side of a wall and the map into the neighbor across it.
///
/// Edge `i` runs from vertex `i` to vertex `(i + 1) % 3`. The transform
/// takes a point in this wall's 2-D frame to the neighbor's 2-D frame,
/// as if the neighbor were unfolded into this wall's plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    /// Wall on the other side, or `None` for an open boundary.
    pub neighbor: Option<WallIndex>,
    /// Cosine of the frame rotation.
    pub cos_theta: f64,
    /// Sine of the frame rotation.
    pub sin_theta: f64,
    /// Translation applied after the rotation.
    pub translate: Vec2,
}

impl Edge {
    /// An edge with no neighbor.
    pub fn open() -> Self {
        Self {
            neighbor: None,
            cos_theta: 1.0,
            sin_theta: 0.0,
            translate: Vec2::zero(),
        }
    }

    /// Map a point into the neighbor's frame.
    pub fn map_point(&self, p: Vec2) -> Vec2 {
        p.rotate(self.cos_theta, self.sin_theta) + self.translate
    }

    /// Map a direction into the neighbor's frame.
    pub fn map_direction(&self, d: Vec2) -> Vec2 {
        d.rotate(self.cos_theta, self.sin_theta)
    }
}

/// A triangle with its precomputed plane, local frame and adjacency.
///
/// The local frame has vertex 0 at the origin, `unit_u` along the first
/// edge and `unit_v = normal × unit_u`, so the vertices are
/// counter-clockwise in 2-D.
#[derive(Clone, Debug, PartialEq)]
pub struct Wall {
    /// Position in the geometry's wall list.
    pub index: WallIndex,
    /// Corner positions.
    pub vertices: [Vec3; 3],
    /// Unit normal, right-handed with respect to the vertex order.
    pub normal: Vec3,
    /// `normal · p` for any point `p` on the plane.
    pub plane_offset: f64,
    /// First in-plane basis vector.
    pub unit_u: Vec3,
    /// Second in-plane basis vector.
    pub unit_v: Vec3,
    /// Corner positions in the local frame.
    pub uv_vertices: [Vec2; 3],
    /// Triangle area in µm².
    pub area: f64,
    /// Behavior toward molecules hitting the wall.
    pub surface_class: SurfaceClassId,
    /// Maximum number of surface molecules the wall holds.
    pub capacity: usize,
    /// Edges and adjacency.
    pub edges: [Edge; 3],
}

impl Wall {
    /// Build the plane and frame for a triangle.
    ///
    /// Returns `None` for a degenerate triangle.
    pub fn new(
        index: WallIndex,
        vertices: [Vec3; 3],
        surface_class: SurfaceClassId,
        surface_grid_density: f64,
    ) -> Option<Self> {
        let [v0, v1, v2] = vertices;
        if !(v0.is_finite() && v1.is_finite() && v2.is_finite()) {
            return None;
        }
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let n = e1.cross(e2);
        let twice_area = n.length();
        let scale = e1.length().max(e2.length());
        if twice_area <= f64::EPSILON * scale * scale {
            return None;
        }
        let normal = n * (1.0 / twice_area);
        let unit_u = e1.normalized()?;
        let unit_v = normal.cross(unit_u);
        let area = 0.5 * twice_area;
        let capacity = (area * surface_grid_density).floor().max(1.0) as usize;
        Some(Self {
            index,
            vertices,
            normal,
            plane_offset: normal.dot(v0),
            unit_u,
            unit_v,
            uv_vertices: [
                Vec2::zero(),
                Vec2::new(e1.dot(unit_u), 0.0),
                Vec2::new(e2.dot(unit_u), e2.dot(unit_v)),
            ],
            area,
            surface_class,
            capacity,
            edges: [Edge::open(); 3],
        })
    }

    /// Signed distance of `p` from the plane, positive on the normal side.
    pub fn signed_distance(&self, p: Vec3) -> f64 {
        self.normal.dot(p) - self.plane_offset
    }

    /// Project a 3-D point into the local frame.
    pub fn to_local(&self, p: Vec3) -> Vec2 {
        let d = p - self.vertices[0];
        Vec2::new(d.dot(self.unit_u), d.dot(self.unit_v))
    }

    /// Lift a local point back to 3-D.
    pub fn to_world(&self, uv: Vec2) -> Vec3 {
        self.vertices[0] + self.unit_u * uv.u + self.unit_v * uv.v
    }

    /// Signed distance of a local point from each edge line, positive inside.
    pub fn edge_distances(&self, uv: Vec2) -> [f64; 3] {
        std::array::from_fn(|i| {
            let a = self.uv_vertices[i];
            let b = self.uv_vertices[(i + 1) % 3];
            let edge = b - a;
            edge.cross(uv - a) / edge.length()
        })
    }

    /// Whether a local point lies inside the triangle (edges included).
    pub fn contains_local(&self, uv: Vec2) -> bool {
        self.edge_distances(uv).iter().all(|&d| d >= 0.0)
    }

    /// Axis-aligned bounding box `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let [a, b, c] = self.vertices;
        (a.min(b).min(c), a.max(b).max(c))
    }

    /// Uniform random point inside the triangle, in the local frame.
    pub fn random_local_point(&self, rng: &mut SimRng) -> Vec2 {
        let mut s = rng.uniform();
        let mut t = rng.uniform();
        if s + t > 1.0 {
            s = 1.0 - s;
            t = 1.0 - t;
        }
        let [a, b, c] = self.uv_vertices;
        a + (b - a) * s + (c - a) * t
    }

    /// Centroid in the local frame.
    pub fn local_centroid(&self) -> Vec2 {
        let [a, b, c] = self.uv_vertices;
        (a + b + c) * (1.0 / 3.0)
    }
}
