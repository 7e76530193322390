//! The subpartition grid: a cube split into equal cells.
//!
//! Each cell remembers which walls overlap it, so a diffusing molecule
//! only tests walls near its own cell.

use rdsim_core::id::{SubpartIndex, WallIndex};
use rdsim_core::time::EPS_C;
use rdsim_core::vec::Vec3;

use crate::error::GeometryError;
use crate::geometry::Geometry;

/// A cubic partition divided into `n³` subpartitions.
#[derive(Clone, Debug)]
pub struct SubpartGrid {
    origin: Vec3,
    edge_length: f64,
    per_axis: u32,
    cell: f64,
    walls: Vec<Vec<WallIndex>>,
}

impl SubpartGrid {
    /// Grid covering `[origin, origin + edge_length)` on every axis, with
    /// walls of `geometry` registered in every cell their bounding box
    /// touches.
    pub fn new(
        origin: Vec3,
        edge_length: f64,
        per_axis: u32,
        geometry: &Geometry,
    ) -> Result<Self, GeometryError> {
        if !(edge_length.is_finite() && edge_length > 0.0) {
            return Err(GeometryError::InvalidGrid {
                reason: format!("edge length {edge_length} must be positive"),
            });
        }
        if per_axis == 0 || per_axis > 1024 {
            return Err(GeometryError::InvalidGrid {
                reason: format!("{per_axis} subpartitions per axis is outside 1..=1024"),
            });
        }
        if !origin.is_finite() {
            return Err(GeometryError::InvalidGrid {
                reason: "origin is not finite".into(),
            });
        }
        let n = per_axis as usize;
        let mut grid = Self {
            origin,
            edge_length,
            per_axis,
            cell: edge_length / per_axis as f64,
            walls: vec![Vec::new(); n * n * n],
        };
        for wall in geometry.walls() {
            let (lo, hi) = wall.bounds();
            let margin = Vec3::splat(EPS_C * (1.0 + lo.max_abs().max(hi.max_abs())));
            for sp in grid.subparts_overlapping(lo - margin, hi + margin) {
                grid.walls[sp.0 as usize].push(wall.index);
            }
        }
        Ok(grid)
    }

    /// Lower corner of the partition.
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Edge length of the partition.
    pub fn edge_length(&self) -> f64 {
        self.edge_length
    }

    /// Number of subpartitions along each axis.
    pub fn per_axis(&self) -> u32 {
        self.per_axis
    }

    /// Total number of subpartitions.
    pub fn len(&self) -> usize {
        self.walls.len()
    }

    /// Always false; a grid has at least one cell.
    pub fn is_empty(&self) -> bool {
        self.walls.is_empty()
    }

    /// Whether `p` lies inside the partition.
    pub fn contains(&self, p: Vec3) -> bool {
        let hi = self.origin + Vec3::splat(self.edge_length);
        (0..3).all(|a| p.axis(a) >= self.origin.axis(a) && p.axis(a) < hi.axis(a))
    }

    /// Subpartition owning `p`, or `None` outside the partition.
    pub fn subpart_index(&self, p: Vec3) -> Option<SubpartIndex> {
        if !self.contains(p) {
            return None;
        }
        let c = self.coords_of(p);
        Some(self.index_of(c))
    }

    /// Cell coordinates of a subpartition.
    pub fn coords(&self, index: SubpartIndex) -> [u32; 3] {
        let n = self.per_axis;
        let i = index.0;
        [i / (n * n), (i / n) % n, i % n]
    }

    /// Subpartition at cell coordinates.
    pub fn index_of(&self, c: [u32; 3]) -> SubpartIndex {
        let n = self.per_axis;
        SubpartIndex(c[0] * n * n + c[1] * n + c[2])
    }

    /// Lower and upper corners of a subpartition.
    pub fn subpart_bounds(&self, index: SubpartIndex) -> (Vec3, Vec3) {
        let c = self.coords(index);
        let lo = self.origin
            + Vec3::new(
                c[0] as f64 * self.cell,
                c[1] as f64 * self.cell,
                c[2] as f64 * self.cell,
            );
        // The last cell ends exactly at the partition edge.
        let corner = |k: u32, o: f64| {
            if k + 1 == self.per_axis {
                o + self.edge_length
            } else {
                o + (k + 1) as f64 * self.cell
            }
        };
        let hi = Vec3::new(
            corner(c[0], self.origin.x),
            corner(c[1], self.origin.y),
            corner(c[2], self.origin.z),
        );
        (lo, hi)
    }

    /// Neighbor across one face: `axis` in `0..3`, `positive` picks the
    /// upper face. `None` at the partition boundary.
    pub fn neighbor(&self, index: SubpartIndex, axis: usize, positive: bool) -> Option<SubpartIndex> {
        let mut c = self.coords(index);
        if positive {
            if c[axis] + 1 >= self.per_axis {
                return None;
            }
            c[axis] += 1;
        } else {
            if c[axis] == 0 {
                return None;
            }
            c[axis] -= 1;
        }
        Some(self.index_of(c))
    }

    /// Every subpartition an axis-aligned box touches, in index order.
    pub fn subparts_overlapping(&self, lo: Vec3, hi: Vec3) -> Vec<SubpartIndex> {
        let last = self.per_axis as i64 - 1;
        let range = |a: usize| {
            let from = ((lo.axis(a) - self.origin.axis(a)) / self.cell).floor() as i64;
            let to = ((hi.axis(a) - self.origin.axis(a)) / self.cell).floor() as i64;
            (from.max(0), to.min(last))
        };
        let (x0, x1) = range(0);
        let (y0, y1) = range(1);
        let (z0, z1) = range(2);
        let mut out = Vec::new();
        for x in x0..=x1 {
            for y in y0..=y1 {
                for z in z0..=z1 {
                    out.push(self.index_of([x as u32, y as u32, z as u32]));
                }
            }
        }
        out
    }

    /// Walls whose bounding box touches a subpartition.
    pub fn walls_in(&self, index: SubpartIndex) -> &[WallIndex] {
        &self.walls[index.0 as usize]
    }

    fn coords_of(&self, p: Vec3) -> [u32; 3] {
        let last = self.per_axis - 1;
        std::array::from_fn(|a| {
            let k = ((p.axis(a) - self.origin.axis(a)) / self.cell).floor();
            (k.max(0.0) as u32).min(last)
        })
    }
}
