//! Species definitions consumed by the engine.

use crate::id::SpeciesId;

/// A molecular species.
///
/// Species are supplied fully resolved by the model front end; the engine
/// only reads them.
#[derive(Clone, Debug, PartialEq)]
pub struct Species {
    /// Dense id; must equal the species' position in the world's list.
    pub id: SpeciesId,
    /// Name used in diagnostics.
    pub name: String,
    /// Diffusion constant in µm²/s.
    pub diffusion_constant: f64,
    /// Surface molecules live on walls and diffuse in 2-D.
    pub is_surface: bool,
    /// Longest sub-step this species takes, in iterations.
    pub time_step: f64,
    /// Target-only molecules never initiate collisions.
    pub target_only: bool,
}

impl Species {
    /// A volume species with the default time step.
    pub fn volume(id: SpeciesId, name: impl Into<String>, diffusion_constant: f64) -> Self {
        Self {
            id,
            name: name.into(),
            diffusion_constant,
            is_surface: false,
            time_step: 1.0,
            target_only: false,
        }
    }

    /// A surface species with the default time step.
    pub fn surface(id: SpeciesId, name: impl Into<String>, diffusion_constant: f64) -> Self {
        Self {
            is_surface: true,
            ..Self::volume(id, name, diffusion_constant)
        }
    }

    /// Override the per-species time step (iterations).
    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    /// Mark the species as target-only.
    pub fn with_target_only(mut self) -> Self {
        self.target_only = true;
        self
    }

    /// Whether molecules of this species move at all.
    pub fn can_diffuse(&self) -> bool {
        self.diffusion_constant > 0.0
    }

    /// Standard deviation of a one-axis displacement over `dt` iterations.
    pub fn step_sigma(&self, dt: f64, time_unit: f64) -> f64 {
        (2.0 * self.diffusion_constant * dt * time_unit).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_diffusion_has_zero_sigma() {
        let s = Species::volume(SpeciesId(0), "A", 0.0);
        assert!(!s.can_diffuse());
        assert_eq!(s.step_sigma(1.0, 1e-6), 0.0);
    }

    #[test]
    fn sigma_scales_with_sqrt_dt() {
        let s = Species::volume(SpeciesId(0), "A", 100.0);
        let a = s.step_sigma(1.0, 1e-6);
        let b = s.step_sigma(4.0, 1e-6);
        assert!((b - 2.0 * a).abs() < 1e-15);
    }

    #[test]
    fn surface_builder_sets_flag() {
        let s = Species::surface(SpeciesId(2), "R", 0.1).with_time_step(0.5);
        assert!(s.is_surface);
        assert_eq!(s.time_step, 0.5);
    }
}
