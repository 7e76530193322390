//! Everything events operate on, passed to them explicitly.

use tracing::warn;

use rdsim_core::error::{PlacementError, SimError, WarningLevel};
use rdsim_core::id::{MoleculeId, SpeciesId, WallIndex};
use rdsim_core::rng::SimRng;
use rdsim_core::species::Species;
use rdsim_core::vec::{Vec2, Vec3};
use rdsim_geometry::{Geometry, SubpartGrid};

use crate::config::{ConfigError, SimulationConfig};
use crate::output::{CountRecord, VizFrame};
use crate::partition::Partition;
use crate::reactions::{ReactionKind, ReactionTable};
use crate::stats::RunStats;

/// Mutable simulation state handed to every event's `step()`.
#[derive(Debug)]
pub struct SimulationState {
    pub(crate) config: SimulationConfig,
    pub(crate) species: Vec<Species>,
    pub(crate) geometry: Geometry,
    pub(crate) reactions: ReactionTable,
    pub(crate) partitions: Vec<Partition>,
    pub(crate) rng: SimRng,
    pub(crate) stats: RunStats,
    pub(crate) counts: Vec<CountRecord>,
    pub(crate) viz_frames: Vec<VizFrame>,
    pub(crate) checkpoints: Vec<f64>,
    pub(crate) finished: bool,
}

impl SimulationState {
    /// Validate the model and build an empty partition over the
    /// configured cube.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]: invalid configuration values, species whose
    /// ids are not dense and ordered, reactions referencing unknown
    /// species or classes, products that cannot exist where they would be
    /// created, probabilities above one under a fatal policy, or a grid
    /// the geometry cannot be registered in.
    pub fn new(
        config: SimulationConfig,
        species: Vec<Species>,
        geometry: Geometry,
        reactions: ReactionTable,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        validate_species(&species)?;
        validate_reactions(&config, &species, &geometry, &reactions)?;

        let grid = SubpartGrid::new(
            config.partition_origin,
            config.partition_edge_length,
            config.subpartitions_per_axis,
            &geometry,
        )?;
        let partition = Partition::new(grid, geometry.wall_count());
        let rng = SimRng::new(config.seed);
        Ok(Self {
            config,
            species,
            geometry,
            reactions,
            partitions: vec![partition],
            rng,
            stats: RunStats::default(),
            counts: Vec::new(),
            viz_frames: Vec::new(),
            checkpoints: Vec::new(),
            finished: false,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Species definitions indexed by id.
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// The static geometry.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// All partitions.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Run counters.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Live molecules of `species` across all partitions.
    pub fn count_species(&self, species: SpeciesId) -> usize {
        self.partitions.iter().map(|p| p.count_species(species)).sum()
    }

    /// Partition whose cube contains `pos`.
    pub(crate) fn partition_for(&self, pos: Vec3) -> Option<usize> {
        self.partitions.iter().position(|p| p.grid().contains(pos))
    }

    /// Add a volume molecule to whichever partition contains `pos`.
    pub(crate) fn place_volume(
        &mut self,
        species: SpeciesId,
        pos: Vec3,
        time: f64,
    ) -> Result<MoleculeId, SimError> {
        let Some(p) = self.partition_for(pos) else {
            return Err(PlacementError::OutsidePartition {
                position: pos,
                species,
            }
            .into());
        };
        self.partitions[p].add_volume_molecule(species, pos, time)
    }

    /// Add a surface molecule at local position `uv` of `wall`.
    pub(crate) fn place_surface(
        &mut self,
        species: SpeciesId,
        wall: WallIndex,
        uv: Vec2,
        orientation: i8,
        time: f64,
    ) -> Result<MoleculeId, SimError> {
        let w = self.geometry.wall(wall);
        let position = w.to_world(uv);
        let Some(p) = self.partition_for(position) else {
            return Err(PlacementError::OutsidePartition { position, species }.into());
        };
        self.partitions[p].add_surface_molecule(species, w, uv, orientation, time)
    }
}

/// Apply the placement-failure policy to the result of adding a molecule.
///
/// Placement errors become `Ok(None)` unless the policy is fatal; every
/// other error propagates.
pub(crate) fn classify_placement(
    policy: WarningLevel,
    stats: &mut RunStats,
    result: Result<MoleculeId, SimError>,
) -> Result<Option<MoleculeId>, SimError> {
    match result {
        Ok(id) => Ok(Some(id)),
        Err(SimError::Placement(e)) => {
            stats.placement_failures += 1;
            match policy {
                WarningLevel::Ignore => Ok(None),
                WarningLevel::Warning => {
                    warn!(error = %e, "molecule not placed");
                    Ok(None)
                }
                WarningLevel::Error => Err(SimError::Placement(e)),
            }
        }
        Err(e) => Err(e),
    }
}

/// Apply the lost-molecule policy to a molecule that left its partition.
pub(crate) fn report_lost(
    policy: WarningLevel,
    stats: &mut RunStats,
    species: SpeciesId,
    position: Vec3,
) -> Result<(), SimError> {
    stats.lost_molecules += 1;
    match policy {
        WarningLevel::Ignore => Ok(()),
        WarningLevel::Warning => {
            warn!(
                species = species.0,
                x = position.x,
                y = position.y,
                z = position.z,
                "molecule left the partition and was removed"
            );
            Ok(())
        }
        WarningLevel::Error => Err(PlacementError::OutsidePartition { position, species }.into()),
    }
}

fn validate_species(species: &[Species]) -> Result<(), ConfigError> {
    for (i, s) in species.iter().enumerate() {
        if s.id.0 as usize != i {
            return Err(ConfigError::InvalidSpecies {
                species: s.id,
                reason: format!("found at position {i}; ids must be dense and ordered"),
            });
        }
        if !s.diffusion_constant.is_finite() || s.diffusion_constant < 0.0 {
            return Err(ConfigError::InvalidSpecies {
                species: s.id,
                reason: format!(
                    "diffusion constant {} must be finite and non-negative",
                    s.diffusion_constant
                ),
            });
        }
        if !s.time_step.is_finite() || s.time_step <= 0.0 {
            return Err(ConfigError::InvalidSpecies {
                species: s.id,
                reason: format!("time step {} must be finite and positive", s.time_step),
            });
        }
    }
    Ok(())
}

fn validate_reactions(
    config: &SimulationConfig,
    species: &[Species],
    geometry: &Geometry,
    reactions: &ReactionTable,
) -> Result<(), ConfigError> {
    let lookup = |id: SpeciesId| {
        species
            .get(id.0 as usize)
            .ok_or_else(|| ConfigError::InvalidReaction {
                reason: format!("unknown species {id}"),
            })
    };

    for class in reactions.iter() {
        let mut reactant_on_surface = false;
        for &r in class.reactants() {
            reactant_on_surface |= lookup(r)?.is_surface;
        }
        let volume_only = match class.kind() {
            ReactionKind::Unimolecular => !reactant_on_surface,
            ReactionKind::Bimolecular | ReactionKind::Surface => {
                if reactant_on_surface {
                    return Err(ConfigError::InvalidReaction {
                        reason: format!(
                            "{:?} reactants {:?} must be volume species",
                            class.kind(),
                            class.reactants()
                        ),
                    });
                }
                class.kind() == ReactionKind::Bimolecular
            }
        };
        if let Some(sc) = class.surface_class() {
            if geometry.surface_class(sc).is_none() {
                return Err(ConfigError::InvalidReaction {
                    reason: format!("unknown surface class {sc}"),
                });
            }
        }
        for pathway in class.pathways() {
            for product in &pathway.products {
                if lookup(product.species)?.is_surface && volume_only {
                    return Err(ConfigError::InvalidReaction {
                        reason: format!(
                            "surface product {} cannot be created away from a wall",
                            product.species
                        ),
                    });
                }
            }
        }

        if class.kind() != ReactionKind::Unimolecular && class.max_fixed_p() > 1.0 {
            let probability = class.max_fixed_p();
            match config.warnings.high_probability {
                WarningLevel::Ignore => {}
                WarningLevel::Warning => warn!(
                    probability,
                    reactants = ?class.reactants(),
                    "reaction probability exceeds 1; every collision reacts"
                ),
                WarningLevel::Error => {
                    return Err(ConfigError::ProbabilityAboveOne { probability });
                }
            }
        }
    }
    Ok(())
}
