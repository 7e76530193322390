//! Strongly-typed identifiers.
//!
//! Every record the engine stores in a dense table (species, walls,
//! molecules, subpartitions) is addressed through one of these handles
//! rather than by reference, so storage can be compacted or reordered
//! without dangling pointers.

use std::fmt;

/// Identifies a molecular species.
///
/// `SpeciesId(n)` corresponds to the n-th species handed to the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeciesId(pub u32);

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SpeciesId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a single molecule for its whole lifetime.
///
/// Ids are allocated monotonically by a partition and never reused, so
/// a stale id can always be detected through the id-to-index map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoleculeId(pub u32);

impl fmt::Display for MoleculeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for MoleculeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Index of a triangular wall within the geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WallIndex(pub u32);

impl fmt::Display for WallIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for WallIndex {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Linear index of a subpartition cell within a partition grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubpartIndex(pub u32);

impl fmt::Display for SubpartIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a surface class attached to walls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceClassId(pub u32);

impl fmt::Display for SurfaceClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed ordering key of an event kind.
///
/// Among events scheduled for the same instant, the one with the lower
/// type index executes first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTypeIndex(pub u32);

impl fmt::Display for EventTypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_inner_value() {
        assert!(MoleculeId(3) < MoleculeId(10));
        assert!(EventTypeIndex(100) < EventTypeIndex(500));
        assert_eq!(SpeciesId::from(7), SpeciesId(7));
    }

    #[test]
    fn display_is_bare_number() {
        assert_eq!(WallIndex(12).to_string(), "12");
        assert_eq!(SubpartIndex(4).to_string(), "4");
    }
}
