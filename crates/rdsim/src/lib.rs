//! rdsim: a particle-based stochastic reaction-diffusion engine.
//!
//! This is the facade crate that re-exports the public API of every rdsim
//! sub-crate. For most users, adding `rdsim` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use rdsim::prelude::*;
//!
//! // A closed unit box whose walls reflect everything.
//! let mesh = TriangleMesh {
//!     vertices: (0..8)
//!         .map(|i| {
//!             let c = |bit| if i & bit == 0 { -0.5 } else { 0.5 };
//!             Vec3::new(c(1), c(2), c(4))
//!         })
//!         .collect(),
//!     triangles: vec![
//!         [0, 2, 1], [1, 2, 3], [4, 5, 6], [5, 7, 6],
//!         [0, 1, 4], [1, 5, 4], [2, 6, 3], [3, 6, 7],
//!         [0, 4, 2], [2, 4, 6], [1, 3, 5], [3, 7, 5],
//!     ],
//!     classes: vec![SurfaceClassId(0); 12],
//! };
//! let walls = SurfaceClass::reflective(SurfaceClassId(0), "membrane");
//! let geometry = Geometry::from_triangles(&mesh, vec![walls], 10_000.0).unwrap();
//!
//! let a = SpeciesId(0);
//! let config = SimulationConfig {
//!     iterations: 10,
//!     partition_origin: Vec3::splat(-1.0),
//!     partition_edge_length: 2.0,
//!     subpartitions_per_axis: 4,
//!     ..SimulationConfig::default()
//! };
//! let species = vec![Species::volume(a, "A", 1.0)];
//! let mut world = World::new(config, species, geometry, ReactionTable::new()).unwrap();
//!
//! let ball = ReleaseShape::Sphere { center: Vec3::zero(), radius: 0.2 };
//! world.add_release(ReleaseEvent::new(a, 100, ball, 0.0)).unwrap();
//! world.add_count(CountEvent::new(vec![CountTerm::world("A", a)], 1.0)).unwrap();
//!
//! assert_eq!(world.run().unwrap(), RunOutcome::Finished { time: 10.0 });
//! assert!(world.counts().iter().all(|r| r.count == 100));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `rdsim-core` | ids, vectors, time tolerances, errors, species, random source |
//! | [`geometry`] | `rdsim-geometry` | walls, surface classes, subpartition grid, collision tests |
//! | [`sched`] | `rdsim-sched` | event trait, calendar, scheduler |
//! | [`engine`] | `rdsim-engine` | molecules, reactions, events, the simulation world |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Ids, vectors, time tolerances, errors and species (`rdsim-core`).
pub use rdsim_core as types;

/// Walls, surface classes and collision predicates (`rdsim-geometry`).
///
/// Build a [`geometry::Geometry`] from a [`geometry::TriangleMesh`] with
/// [`geometry::Geometry::from_triangles`].
pub use rdsim_geometry as geometry;

/// Deterministic event scheduling (`rdsim-sched`).
///
/// Most users only touch [`sched::AsyncScheduler`], returned by
/// [`engine::World::async_scheduler`].
pub use rdsim_sched as sched;

/// Molecules, reactions, events and the simulation world (`rdsim-engine`).
pub use rdsim_engine as engine;

/// Common imports for typical rdsim usage.
///
/// ```rust
/// use rdsim::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use rdsim_core::error::{SimError, WarningLevel};
    pub use rdsim_core::id::{MoleculeId, SpeciesId, SurfaceClassId, WallIndex};
    pub use rdsim_core::species::Species;
    pub use rdsim_core::vec::{Vec2, Vec3};

    // Geometry
    pub use rdsim_geometry::{Geometry, SurfaceClass, TriangleMesh, WallInteraction};

    // Scheduling
    pub use rdsim_sched::AsyncScheduler;

    // Engine
    pub use rdsim_engine::{
        CheckpointEvent, ConfigError, CountEvent, CountRegion, CountTerm, Pathway, ReactionClass,
        ReactionTable, ReleaseEvent, ReleaseShape, RunOutcome, SimulationConfig, VizOutputEvent,
        World,
    };
}
