//! Reusable geometry and species fixtures.
//!
//! - [`box_mesh`]: an axis-aligned box as 12 outward-facing triangles.
//! - [`box_geometry`]: the same box built into walls with one class.
//! - [`volume_species`]: a volume species with a given diffusion constant.

use rdsim_core::id::{SpeciesId, SurfaceClassId};
use rdsim_core::species::Species;
use rdsim_core::vec::Vec3;
use rdsim_geometry::{Geometry, SurfaceClass, TriangleMesh};

/// Axis-aligned box `[lo, hi]` with outward normals, every wall in class 0.
pub fn box_mesh(lo: Vec3, hi: Vec3) -> TriangleMesh {
    // Corner i has x from bit 0, y from bit 1, z from bit 2.
    let vertices = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            )
        })
        .collect();
    let triangles = vec![
        [0, 2, 1],
        [1, 2, 3],
        [4, 5, 6],
        [5, 7, 6],
        [0, 1, 4],
        [1, 5, 4],
        [2, 6, 3],
        [3, 6, 7],
        [0, 4, 2],
        [2, 4, 6],
        [1, 3, 5],
        [3, 7, 5],
    ];
    TriangleMesh {
        vertices,
        classes: vec![SurfaceClassId(0); triangles.len()],
        triangles,
    }
}

/// A class reflecting every species.
pub fn reflective_class() -> SurfaceClass {
    SurfaceClass::reflective(SurfaceClassId(0), "reflective")
}

/// Box `[lo, hi]` whose walls all use `class` (which must have id 0).
///
/// # Panics
///
/// Panics if the box is degenerate.
pub fn box_geometry(lo: Vec3, hi: Vec3, class: SurfaceClass) -> Geometry {
    Geometry::from_triangles(&box_mesh(lo, hi), vec![class], 10_000.0)
        .expect("box mesh is well formed")
}

/// Volume species `id` named `S<id>`.
pub fn volume_species(id: u32, diffusion_constant: f64) -> Species {
    Species::volume(SpeciesId(id), format!("S{id}"), diffusion_constant)
}
