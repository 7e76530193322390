//! In-memory records produced by count and visualization events.

use rdsim_core::id::{MoleculeId, SpeciesId, WallIndex};
use rdsim_core::vec::Vec3;
use rdsim_geometry::Geometry;

use crate::molecule::{Location, Molecule};

/// Region a count term covers.
#[derive(Clone, Debug, PartialEq)]
pub enum CountRegion {
    /// Every live molecule.
    World,
    /// Molecules whose 3-D position lies in `[lo, hi]`.
    Box {
        /// Lower corner.
        lo: Vec3,
        /// Upper corner.
        hi: Vec3,
    },
    /// Surface molecules on any of these walls.
    Walls(Vec<WallIndex>),
}

impl CountRegion {
    pub(crate) fn contains(&self, m: &Molecule, geometry: &Geometry) -> bool {
        match self {
            Self::World => true,
            Self::Box { lo, hi } => {
                let p = world_position(m, geometry);
                (0..3).all(|a| p.axis(a) >= lo.axis(a) && p.axis(a) <= hi.axis(a))
            }
            Self::Walls(walls) => m.wall().is_some_and(|w| walls.contains(&w)),
        }
    }
}

/// One observable: a species counted over a region.
#[derive(Clone, Debug, PartialEq)]
pub struct CountTerm {
    /// Label copied into every record.
    pub label: String,
    /// Species counted.
    pub species: SpeciesId,
    /// Where to count.
    pub region: CountRegion,
}

impl CountTerm {
    /// Count `species` everywhere.
    pub fn world(label: impl Into<String>, species: SpeciesId) -> Self {
        Self {
            label: label.into(),
            species,
            region: CountRegion::World,
        }
    }

    /// Count `species` inside `region`.
    pub fn in_region(label: impl Into<String>, species: SpeciesId, region: CountRegion) -> Self {
        Self {
            label: label.into(),
            species,
            region,
        }
    }
}

/// Value of one count term at one barrier.
#[derive(Clone, Debug, PartialEq)]
pub struct CountRecord {
    /// Simulation time in iterations.
    pub time: f64,
    /// Term label.
    pub label: String,
    /// Live molecules matched.
    pub count: usize,
}

/// One molecule in a visualization frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VizMolecule {
    /// Molecule id.
    pub id: MoleculeId,
    /// Species.
    pub species: SpeciesId,
    /// 3-D position; surface molecules lie in their wall plane.
    pub position: Vec3,
    /// Carrying wall for surface molecules.
    pub wall: Option<WallIndex>,
}

/// Snapshot of every live molecule at one barrier.
#[derive(Clone, Debug, PartialEq)]
pub struct VizFrame {
    /// Simulation time in iterations.
    pub time: f64,
    /// Molecules in partition storage order.
    pub molecules: Vec<VizMolecule>,
}

/// 3-D position of a molecule.
pub fn world_position(m: &Molecule, geometry: &Geometry) -> Vec3 {
    match m.location {
        Location::Volume { pos, .. } => pos,
        Location::Surface { wall, pos2d, .. } => geometry.wall(wall).to_world(pos2d),
    }
}
