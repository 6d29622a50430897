//! Numerical and physical parameters for a run
//!
//! `Parameters` holds runtime settings:
//! - time step (explicit, or derived from the stability bound),
//! - gravity and global damping,
//! - contact damping ratio,
//! - iteration budget and sampling period

use crate::configuration::config::DampingMode;
use crate::simulation::states::NVec3;

#[derive(Debug, Clone)]
pub struct Parameters {
    pub time_step: Option<f64>, // explicit dt; None = stability bound
    pub safety_factor: f64,     // fraction of the P-wave time step used as the bound
    pub gravity: NVec3,
    pub damping: f64, // global damping in [0, 1)
    pub damping_mode: DampingMode,
    pub contact_damping_ratio: f64, // fraction of critical normal damping per contact
    pub iteration_budget: u64,      // steps to run
    pub sampler_period: u64,        // steps between samples
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            time_step: None,
            safety_factor: 0.5,
            gravity: NVec3::new(0.0, 0.0, -9.81),
            damping: 0.0,
            damping_mode: DampingMode::Velocity,
            contact_damping_ratio: 0.0,
            iteration_budget: 1000,
            sampler_period: 100,
        }
    }
}
