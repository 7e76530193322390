//! Geometry for rdsim: triangulated walls and the queries run against them.
//!
//! Walls are built once from a [`TriangleMesh`] by
//! [`Geometry::from_triangles`], which also links walls sharing an edge
//! with the rotation and translation between their local frames. A
//! [`SubpartGrid`] splits the simulated cube into cells and remembers
//! which walls touch each cell. The [`collision`] module holds the
//! predicates the diffusion step uses; they never fail, and report
//! degenerate configurations as a redo request instead.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod collision;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod surface_class;
pub mod wall;

pub use collision::{BoundaryExit, CollisionOutcome, EdgeCrossing, Impact};
pub use error::GeometryError;
pub use geometry::{Geometry, TriangleMesh};
pub use grid::SubpartGrid;
pub use surface_class::{SurfaceClass, WallInteraction};
pub use wall::{Edge, Wall};
