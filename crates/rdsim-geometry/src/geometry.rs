//! Building walls and their adjacency from a triangle list.

use indexmap::IndexMap;
use smallvec::SmallVec;

use rdsim_core::id::{SurfaceClassId, WallIndex};
use rdsim_core::vec::{Vec2, Vec3};

use crate::error::GeometryError;
use crate::surface_class::SurfaceClass;
use crate::wall::{Edge, Wall};

/// Indexed triangle input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Vec3>,
    /// Vertex indices per triangle, counter-clockwise seen from the front.
    pub triangles: Vec<[usize; 3]>,
    /// Surface class per triangle.
    pub classes: Vec<SurfaceClassId>,
}

/// Immutable walls plus the surface classes they refer to.
#[derive(Clone, Debug)]
pub struct Geometry {
    walls: Vec<Wall>,
    surface_classes: Vec<SurfaceClass>,
    bounds: (Vec3, Vec3),
}

impl Geometry {
    /// Geometry with no walls.
    pub fn empty(surface_classes: Vec<SurfaceClass>) -> Self {
        Self {
            walls: Vec::new(),
            surface_classes,
            bounds: (Vec3::zero(), Vec3::zero()),
        }
    }

    /// Build walls, frames and shared-edge transforms.
    ///
    /// `surface_grid_density` (tiles per µm²) sets each wall's capacity
    /// for surface molecules.
    pub fn from_triangles(
        mesh: &TriangleMesh,
        surface_classes: Vec<SurfaceClass>,
        surface_grid_density: f64,
    ) -> Result<Self, GeometryError> {
        if mesh.classes.len() != mesh.triangles.len() {
            return Err(GeometryError::ClassCountMismatch {
                expected: mesh.triangles.len(),
                got: mesh.classes.len(),
            });
        }

        let mut walls = Vec::with_capacity(mesh.triangles.len());
        for (ti, (tri, &class)) in mesh.triangles.iter().zip(&mesh.classes).enumerate() {
            if class.0 as usize >= surface_classes.len() {
                return Err(GeometryError::UnknownSurfaceClass {
                    triangle: ti,
                    class,
                });
            }
            let mut corners = [Vec3::zero(); 3];
            for (corner, &vi) in corners.iter_mut().zip(tri) {
                *corner = *mesh
                    .vertices
                    .get(vi)
                    .ok_or(GeometryError::VertexOutOfRange {
                        triangle: ti,
                        vertex: vi,
                    })?;
            }
            let wall = Wall::new(WallIndex(ti as u32), corners, class, surface_grid_density)
                .ok_or(GeometryError::DegenerateTriangle { triangle: ti })?;
            walls.push(wall);
        }

        // Undirected edge -> (wall, edge slot) of every triangle using it.
        let mut shared: IndexMap<(usize, usize), SmallVec<[(usize, usize); 2]>> = IndexMap::new();
        for (ti, tri) in mesh.triangles.iter().enumerate() {
            for slot in 0..3 {
                let a = tri[slot];
                let b = tri[(slot + 1) % 3];
                shared.entry((a.min(b), a.max(b))).or_default().push((ti, slot));
            }
        }
        for (&(a, b), users) in &shared {
            match users.as_slice() {
                [_] => {}
                [(wa, ea), (wb, eb)] => {
                    let (p, q) = (mesh.vertices[a], mesh.vertices[b]);
                    let forward = edge_transform(&walls[*wa], &walls[*wb], p, q);
                    let backward = edge_transform(&walls[*wb], &walls[*wa], p, q);
                    walls[*wa].edges[*ea] = Edge {
                        neighbor: Some(WallIndex(*wb as u32)),
                        ..forward
                    };
                    walls[*wb].edges[*eb] = Edge {
                        neighbor: Some(WallIndex(*wa as u32)),
                        ..backward
                    };
                }
                _ => return Err(GeometryError::NonManifoldEdge { a, b }),
            }
        }

        let bounds = walls
            .iter()
            .map(Wall::bounds)
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
            .unwrap_or((Vec3::zero(), Vec3::zero()));

        Ok(Self {
            walls,
            surface_classes,
            bounds,
        })
    }

    /// All walls, indexed by [`WallIndex`].
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// One wall.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn wall(&self, index: WallIndex) -> &Wall {
        &self.walls[index.0 as usize]
    }

    /// Number of walls.
    pub fn wall_count(&self) -> usize {
        self.walls.len()
    }

    /// Surface class by id.
    pub fn surface_class(&self, id: SurfaceClassId) -> Option<&SurfaceClass> {
        self.surface_classes.get(id.0 as usize)
    }

    /// All surface classes.
    pub fn surface_classes(&self) -> &[SurfaceClass] {
        &self.surface_classes
    }

    /// Bounding box of every wall.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.bounds
    }
}

/// Rotation and translation taking `from`'s frame to `to`'s frame across
/// the edge `p`-`q` they share.
fn edge_transform(from: &Wall, to: &Wall, p: Vec3, q: Vec3) -> Edge {
    let (fa, fb) = (from.to_local(p), from.to_local(q));
    let (ta, tb) = (to.to_local(p), to.to_local(q));
    let theta = angle(tb - ta) - angle(fb - fa);
    let (sin_theta, cos_theta) = theta.sin_cos();
    let translate = ta - fa.rotate(cos_theta, sin_theta);
    Edge {
        neighbor: None,
        cos_theta,
        sin_theta,
        translate,
    }
}

fn angle(d: Vec2) -> f64 {
    d.v.atan2(d.u)
}
