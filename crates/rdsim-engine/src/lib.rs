//! Particle reaction-diffusion engine for rdsim.
//!
//! A [`World`] owns a [`Scheduler`](rdsim_sched::Scheduler) of
//! [`WorldEvent`]s and the [`SimulationState`] they mutate. Molecules
//! live in a [`Partition`]: an id-indexed store with a spatial index per
//! subpartition and per wall, compacted periodically by the
//! [`DefragmentEvent`].
//!
//! Each iteration the [`DiffuseReactEvent`] walks every molecule through
//! its random displacement, resolving the first real collision at each
//! leg (subpartition face, wall or reaction partner) and firing
//! unimolecular, bimolecular and wall reactions from the
//! [`ReactionTable`]. Count and visualization events are barriers:
//! diffusion stops exactly at them, so their records see a consistent
//! population.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod diffuse_react;
pub mod events;
pub mod molecule;
pub mod output;
pub mod partition;
pub mod reactions;
pub mod state;
pub mod stats;
pub mod world;

pub use config::{ConfigError, SimulationConfig, WarningConfig};
pub use diffuse_react::DiffuseReactEvent;
pub use events::{
    event_type, CheckpointEvent, CountEvent, DefragmentEvent, ReleaseEvent, ReleaseShape,
    SimulationEndCheckEvent, VizOutputEvent, WorldEvent,
};
pub use molecule::{Location, Molecule};
pub use output::{CountRecord, CountRegion, CountTerm, VizFrame, VizMolecule};
pub use partition::Partition;
pub use reactions::{Pathway, Product, ReactionClass, ReactionKind, ReactionTable};
pub use state::SimulationState;
pub use stats::RunStats;
pub use world::{RunOutcome, World};
