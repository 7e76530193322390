//! Core types for the rdsim reaction-diffusion engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the workspace:
//! typed identifiers, small vector math, simulated-time helpers,
//! the error taxonomy, the seeded random source, and species records.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod rng;
pub mod species;
pub mod time;
pub mod vec;

pub use error::{PlacementError, ScheduleError, SimError, WarningLevel};
pub use id::{EventTypeIndex, MoleculeId, SpeciesId, SubpartIndex, SurfaceClassId, WallIndex};
pub use rng::SimRng;
pub use species::Species;
pub use vec::{Vec2, Vec3};
