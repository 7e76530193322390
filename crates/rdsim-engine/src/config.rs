//! Simulation configuration, validation, and error types.
//!
//! [`SimulationConfig`] is the builder input for [`World`](crate::World).
//! [`validate()`](SimulationConfig::validate) checks every structural
//! invariant before anything is allocated; the world constructor then
//! checks the species list and reaction table against it.

use std::error::Error;
use std::fmt;

use rdsim_core::error::WarningLevel;
use rdsim_core::id::SpeciesId;
use rdsim_core::vec::Vec3;
use rdsim_geometry::GeometryError;

// ── WarningConfig ──────────────────────────────────────────────────

/// How recoverable conditions are reported.
#[derive(Clone, Debug, PartialEq)]
pub struct WarningConfig {
    /// A release or reaction product could not be placed. Default: warning.
    pub placement_failure: WarningLevel,
    /// A reaction pathway has a per-collision probability above one.
    /// Default: warning.
    pub high_probability: WarningLevel,
    /// A molecule left the partition and was removed. Default: warning.
    pub lost_molecule: WarningLevel,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            placement_failure: WarningLevel::Warning,
            high_probability: WarningLevel::Warning,
            lost_molecule: WarningLevel::Warning,
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating a configuration or building a world.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// `time_unit` is NaN, infinite, zero, or negative.
    InvalidTimeUnit {
        /// The invalid value.
        value: f64,
    },
    /// The partition cube is unusable.
    InvalidPartition {
        /// What went wrong.
        reason: String,
    },
    /// `rx_radius_3d` is NaN, infinite, or negative.
    InvalidRxRadius {
        /// The invalid value.
        value: f64,
    },
    /// `surface_grid_density` is NaN, infinite, zero, or negative.
    InvalidGridDensity {
        /// The invalid value.
        value: f64,
    },
    /// `max_redo_attempts` is zero.
    NoRedoAttempts,
    /// A species is malformed or out of place.
    InvalidSpecies {
        /// The offending species.
        species: SpeciesId,
        /// What went wrong.
        reason: String,
    },
    /// A reaction references something that does not exist or is invalid.
    InvalidReaction {
        /// What went wrong.
        reason: String,
    },
    /// An event handed to the world cannot be scheduled as described.
    InvalidEvent {
        /// What went wrong.
        reason: String,
    },
    /// A pathway probability exceeds one and the policy is fatal.
    ProbabilityAboveOne {
        /// Total per-collision probability of the reaction class.
        probability: f64,
    },
    /// Geometry could not be built or gridded.
    Geometry(GeometryError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimeUnit { value } => {
                write!(f, "time_unit must be finite and positive, got {value}")
            }
            Self::InvalidPartition { reason } => write!(f, "invalid partition: {reason}"),
            Self::InvalidRxRadius { value } => {
                write!(f, "rx_radius_3d must be finite and non-negative, got {value}")
            }
            Self::InvalidGridDensity { value } => {
                write!(f, "surface_grid_density must be finite and positive, got {value}")
            }
            Self::NoRedoAttempts => write!(f, "max_redo_attempts must be at least 1"),
            Self::InvalidSpecies { species, reason } => {
                write!(f, "invalid species {species}: {reason}")
            }
            Self::InvalidReaction { reason } => write!(f, "invalid reaction: {reason}"),
            Self::InvalidEvent { reason } => write!(f, "invalid event: {reason}"),
            Self::ProbabilityAboveOne { probability } => {
                write!(f, "reaction probability {probability} exceeds 1")
            }
            Self::Geometry(e) => write!(f, "geometry: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Geometry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GeometryError> for ConfigError {
    fn from(e: GeometryError) -> Self {
        Self::Geometry(e)
    }
}

// ── SimulationConfig ───────────────────────────────────────────────

/// Complete configuration for constructing a simulation world.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// RNG seed for deterministic simulation. Default: 1.
    pub seed: u64,
    /// Seconds per iteration. Default: 1e-6.
    pub time_unit: f64,
    /// Number of iterations to run. Default: 100.
    pub iterations: u64,
    /// Lower corner of the partition cube (µm). Default: (-5, -5, -5).
    pub partition_origin: Vec3,
    /// Edge length of the partition cube (µm). Default: 10.
    pub partition_edge_length: f64,
    /// Subpartitions along each axis. Default: 10.
    pub subpartitions_per_axis: u32,
    /// Interaction radius for volume-volume reactions (µm). Default: 0.005.
    pub rx_radius_3d: f64,
    /// Surface molecule slots per µm² of wall. Default: 10000.
    pub surface_grid_density: f64,
    /// Perturb-and-retry attempts per march before degenerate tests are
    /// resolved without perturbation. Default: 10.
    pub max_redo_attempts: u32,
    /// Reporting policy for recoverable conditions.
    pub warnings: WarningConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            time_unit: 1e-6,
            iterations: 100,
            partition_origin: Vec3::splat(-5.0),
            partition_edge_length: 10.0,
            subpartitions_per_axis: 10,
            rx_radius_3d: 0.005,
            surface_grid_density: 10_000.0,
            max_redo_attempts: 10,
            warnings: WarningConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_unit.is_finite() || self.time_unit <= 0.0 {
            return Err(ConfigError::InvalidTimeUnit {
                value: self.time_unit,
            });
        }
        if !self.partition_origin.is_finite() {
            return Err(ConfigError::InvalidPartition {
                reason: "origin is not finite".into(),
            });
        }
        if !self.partition_edge_length.is_finite() || self.partition_edge_length <= 0.0 {
            return Err(ConfigError::InvalidPartition {
                reason: format!(
                    "edge length must be finite and positive, got {}",
                    self.partition_edge_length
                ),
            });
        }
        if self.subpartitions_per_axis == 0 {
            return Err(ConfigError::InvalidPartition {
                reason: "at least one subpartition per axis is required".into(),
            });
        }
        if !self.rx_radius_3d.is_finite() || self.rx_radius_3d < 0.0 {
            return Err(ConfigError::InvalidRxRadius {
                value: self.rx_radius_3d,
            });
        }
        if !self.surface_grid_density.is_finite() || self.surface_grid_density <= 0.0 {
            return Err(ConfigError::InvalidGridDensity {
                value: self.surface_grid_density,
            });
        }
        if self.max_redo_attempts == 0 {
            return Err(ConfigError::NoRedoAttempts);
        }
        Ok(())
    }
}
