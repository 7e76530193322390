//! Test fixtures and mock events for rdsim development.
//!
//! Provides a [`MockEvent`] implementing the scheduler's event trait,
//! closed-box geometry builders, and shorthand species constructors.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
mod mock_event;

pub use fixtures::{box_geometry, box_mesh, reflective_class, volume_species};
pub use mock_event::{MockEvent, MockRecord};
