//! Critical time step estimate.
//!
//! The P-wave time step is the time a compression wave needs to cross the
//! smallest particle radius of the stiffest material:
//!
//! ```text
//! dt_p = min_i r_i / sqrt(E_i / rho_i)
//! ```
//!
//! The bound handed to the loop is `safety_factor * dt_p`.

use crate::error::{SimError, SimResult};
use crate::simulation::material::MaterialRegistry;
use crate::simulation::states::Particle;

#[derive(Debug, Clone, Copy)]
pub struct StabilityController {
    pub safety_factor: f64, // in (0, 1]
}

impl StabilityController {
    pub fn new(safety_factor: f64) -> SimResult<Self> {
        if !(safety_factor > 0.0 && safety_factor <= 1.0) {
            return Err(SimError::config(format!(
                "time step safety factor must be in (0, 1], got {safety_factor}"
            )));
        }
        Ok(Self { safety_factor })
    }

    /// Raw P-wave estimate, `None` for an empty assembly
    pub fn p_wave_time_step(&self, particles: &[Particle], materials: &MaterialRegistry) -> Option<f64> {
        particles
            .iter()
            .map(|p| p.radius / materials.material(p.material).p_wave_speed())
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Largest time step the loop may use
    pub fn bound(&self, particles: &[Particle], materials: &MaterialRegistry) -> Option<f64> {
        self.p_wave_time_step(particles, materials)
            .map(|dt| self.safety_factor * dt)
    }

    /// Reject a time step above the bound
    pub fn check(&self, dt: f64, bound: f64) -> SimResult<()> {
        if dt > bound {
            Err(SimError::TimeStepAboveBound { dt, bound })
        } else {
            Ok(())
        }
    }
}
