//! Error types for the rdsim engine.
//!
//! Organized by subsystem: scheduling contract violations, placement
//! failures, and the top-level [`SimError`] returned from event
//! execution. Geometric queries never produce errors; they report a
//! small outcome enum instead.

use std::error::Error;
use std::fmt;

use crate::id::{EventTypeIndex, SpeciesId, WallIndex};
use crate::vec::Vec3;

/// Errors from the event calendar and scheduler.
#[derive(Clone, Debug, PartialEq)]
pub enum ScheduleError {
    /// An event was scheduled without a time, in the past, or with
    /// inconsistent barrier flags.
    InvalidState {
        /// Type key of the offending event.
        type_index: EventTypeIndex,
        /// Human-readable description of the violated contract.
        reason: String,
    },
    /// An asynchronous submission arrived after the scheduler was dropped.
    SchedulerGone,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState { type_index, reason } => {
                write!(f, "invalid event state (type {type_index}): {reason}")
            }
            Self::SchedulerGone => write!(f, "scheduler no longer accepts events"),
        }
    }
}

impl Error for ScheduleError {}

/// A release or reaction product could not be placed.
#[derive(Clone, Debug, PartialEq)]
pub enum PlacementError {
    /// The wall already holds as many surface molecules as it has tiles.
    WallSaturated {
        /// The saturated wall.
        wall: WallIndex,
        /// Species that could not be placed.
        species: SpeciesId,
    },
    /// The requested location lies outside every partition.
    OutsidePartition {
        /// The rejected position.
        position: Vec3,
        /// Species that could not be placed.
        species: SpeciesId,
    },
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WallSaturated { wall, species } => {
                write!(f, "wall {wall} is saturated, cannot place species {species}")
            }
            Self::OutsidePartition { position, species } => write!(
                f,
                "position ({}, {}, {}) is outside all partitions, cannot place species {species}",
                position.x, position.y, position.z
            ),
        }
    }
}

impl Error for PlacementError {}

/// Errors that abandon the current event and halt the simulation.
#[derive(Clone, Debug, PartialEq)]
pub enum SimError {
    /// Growing molecule storage or the calendar failed.
    AllocationFailed {
        /// What was being grown.
        what: &'static str,
    },
    /// A scheduling contract was violated.
    Schedule(ScheduleError),
    /// A placement failure occurred and the configured policy is fatal.
    Placement(PlacementError),
    /// The calendar ran dry; a terminal event must always be scheduled.
    EmptyCalendar,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { what } => write!(f, "allocation failed while growing {what}"),
            Self::Schedule(e) => write!(f, "scheduler: {e}"),
            Self::Placement(e) => write!(f, "placement: {e}"),
            Self::EmptyCalendar => write!(f, "calendar holds no events"),
        }
    }
}

impl Error for SimError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schedule(e) => Some(e),
            Self::Placement(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ScheduleError> for SimError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

impl From<PlacementError> for SimError {
    fn from(e: PlacementError) -> Self {
        Self::Placement(e)
    }
}

/// How a recoverable condition is reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WarningLevel {
    /// Continue silently.
    Ignore,
    /// Continue and emit a warning.
    #[default]
    Warning,
    /// Treat the condition as fatal.
    Error,
}
