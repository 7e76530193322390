//! Per-species wall behavior.

use indexmap::IndexMap;

use rdsim_core::id::{SpeciesId, SurfaceClassId};

/// What happens when a volume molecule reaches a wall.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WallInteraction {
    /// The molecule passes through.
    Transparent,
    /// The remaining displacement is mirrored about the wall plane.
    #[default]
    Reflect,
    /// The molecule is destroyed.
    Absorb,
    /// A surface reaction is attempted; on failure the molecule reflects.
    React,
}

/// A named set of wall interactions, one per species.
///
/// Species without an explicit entry are reflected.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceClass {
    /// Dense id; equals the class' position in the geometry's list.
    pub id: SurfaceClassId,
    /// Name used in diagnostics.
    pub name: String,
    interactions: IndexMap<SpeciesId, WallInteraction>,
}

impl SurfaceClass {
    /// A class that reflects every species.
    pub fn reflective(id: SurfaceClassId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            interactions: IndexMap::new(),
        }
    }

    /// Set the interaction for one species.
    pub fn with(mut self, species: SpeciesId, interaction: WallInteraction) -> Self {
        self.interactions.insert(species, interaction);
        self
    }

    /// Interaction applied to `species`.
    pub fn interaction_for(&self, species: SpeciesId) -> WallInteraction {
        self.interactions
            .get(&species)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlisted_species_reflect() {
        let class = SurfaceClass::reflective(SurfaceClassId(0), "membrane")
            .with(SpeciesId(1), WallInteraction::Absorb);
        assert_eq!(class.interaction_for(SpeciesId(1)), WallInteraction::Absorb);
        assert_eq!(class.interaction_for(SpeciesId(0)), WallInteraction::Reflect);
    }
}
