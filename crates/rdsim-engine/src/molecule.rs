//! Molecule records.

use rdsim_core::id::{MoleculeId, SpeciesId, SubpartIndex, WallIndex};
use rdsim_core::vec::{Vec2, Vec3};

/// Where a molecule is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Location {
    /// Free in the volume.
    Volume {
        /// Position in µm.
        pos: Vec3,
        /// Subpartition containing `pos`.
        subpart: SubpartIndex,
    },
    /// Bound to a wall.
    Surface {
        /// The wall carrying the molecule.
        wall: WallIndex,
        /// Position in the wall's local frame.
        pos2d: Vec2,
        /// `+1` facing along the wall normal, `-1` against it.
        orientation: i8,
    },
}

/// One molecule in a partition's dense storage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Molecule {
    /// Stable id, unique within the partition.
    pub id: MoleculeId,
    /// Species of this molecule.
    pub species: SpeciesId,
    /// Current location.
    pub location: Location,
    /// Time up to which this molecule has been simulated, in iterations.
    pub diffusion_time: f64,
    /// Scheduled unimolecular reaction time, once drawn.
    pub unimol_rxn_time: Option<f64>,
    /// Removed from the simulation; storage is reclaimed by compaction.
    pub defunct: bool,
    /// Wall this molecule was created on during the current window. The
    /// first march ignores it so a product does not collide with its birth
    /// surface.
    pub birth_wall: Option<WallIndex>,
}

impl Molecule {
    /// Whether the molecule is free in the volume.
    pub fn is_volume(&self) -> bool {
        matches!(self.location, Location::Volume { .. })
    }

    /// Volume position, if any.
    pub fn volume_pos(&self) -> Option<Vec3> {
        match self.location {
            Location::Volume { pos, .. } => Some(pos),
            Location::Surface { .. } => None,
        }
    }

    /// Wall carrying the molecule, if it is a surface molecule.
    pub fn wall(&self) -> Option<WallIndex> {
        match self.location {
            Location::Surface { wall, .. } => Some(wall),
            Location::Volume { .. } => None,
        }
    }
}
