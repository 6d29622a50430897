//! Preparing the packing before the plate is loaded
//!
//! The generated cloud is loose: no sphere touches another. [`Deposition`]
//! lets it fall under gravity with Cundall damping while every boundary,
//! the plate included, is held in place, and stops once the packing is close
//! to static equilibrium. The ratio it watches is the mean resultant force
//! on a particle over the mean contact force ([`unbalanced_force`]), which
//! tends to zero as the bed comes to rest.
//!
//! [`seat_plate`] then lowers the plate until it touches the highest sphere
//! under its footprint, and makes that the reference for settlement.

use log::{debug, info};

use crate::configuration::config::{DampingMode, DepositionConfig};
use crate::error::{SimError, SimResult};
use crate::simulation::contact::ContactLaw;
use crate::simulation::driver::{advance, select_time_step, StepSettings};
use crate::simulation::engine::Engine;
use crate::simulation::forces::{BodyForceSet, ForceAccumulator, Gravity};
use crate::simulation::integrator::Damping;
use crate::simulation::material::MaterialRegistry;
use crate::simulation::params::Parameters;
use crate::simulation::states::{BodyId, NVec3, SimulationState};

/// Mean magnitude of the resultant force on a particle divided by the mean
/// contact force. `None` while nothing carries load.
pub fn unbalanced_force(state: &SimulationState, forces: &ForceAccumulator) -> Option<f64> {
    if state.particles.is_empty() || state.contacts.is_empty() {
        return None;
    }
    let resultant: f64 = (0..state.particles.len())
        .map(|i| forces.force(BodyId::Particle(i)).norm())
        .sum::<f64>()
        / state.particles.len() as f64;
    let contact: f64 = state
        .contacts
        .values()
        .map(|c| (c.normal_force * c.normal_force + c.shear_force.norm_squared()).sqrt())
        .sum::<f64>()
        / state.contacts.len() as f64;

    if contact > 0.0 {
        Some(resultant / contact)
    } else {
        None
    }
}

/// Outcome of a deposition run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepositionReport {
    pub steps: u64,
    pub unbalanced: Option<f64>, // ratio at the last step
    pub kinetic_energy: f64,     // before velocities were cleared
    pub settled: bool,           // false when the step limit ended the run
}

/// Gravity deposition settings
#[derive(Debug, Clone, Copy)]
pub struct Deposition {
    pub max_steps: u64,
    pub tolerance: f64, // unbalanced force ratio that counts as settled
    pub damping: Damping,
}

impl From<&DepositionConfig> for Deposition {
    fn from(cfg: &DepositionConfig) -> Self {
        Self {
            max_steps: cfg.max_steps,
            tolerance: cfg.unbalanced_force,
            damping: Damping {
                mode: DampingMode::Cundall,
                coefficient: cfg.damping,
            },
        }
    }
}

impl Deposition {
    /// Let the particles fall onto the container. Boundaries do not move and
    /// boundary loads are not applied. On return every particle is at rest,
    /// the step counter and clock are back at zero, and contacts formed
    /// during deposition are kept.
    pub fn run(
        &self,
        state: &mut SimulationState,
        materials: &MaterialRegistry,
        params: &Parameters,
        engine: &Engine,
    ) -> SimResult<DepositionReport> {
        if !(0.0..1.0).contains(&self.damping.coefficient) {
            return Err(SimError::config(format!(
                "deposition damping must be in [0, 1), got {}",
                self.damping.coefficient
            )));
        }
        let (dt, _) = select_time_step(state, materials, params, engine)?;
        state.dt = dt;

        let free: Vec<[bool; 3]> = state.boundaries.iter().map(|b| b.free).collect();
        for b in state.boundaries.iter_mut() {
            b.free = [false; 3];
            b.v = NVec3::zeros();
        }

        let gravity = BodyForceSet::new().with(Gravity { g: params.gravity });
        let settings = StepSettings {
            law: ContactLaw {
                damping_ratio: params.contact_damping_ratio,
                max_overlap_ratio: engine.max_overlap_ratio,
            },
            damping: self.damping,
            parallel: engine.parallel,
            max_step_displacement_ratio: engine.max_step_displacement_ratio,
        };
        let mut forces = ForceAccumulator::for_state(state);

        info!(
            "depositing {} spheres, at most {} steps, dt = {dt:e} s",
            state.particles.len(),
            self.max_steps
        );

        let mut unbalanced = None;
        let mut settled = false;
        let outcome = loop {
            if state.step >= self.max_steps {
                break Ok(());
            }
            if let Err(e) = advance(state, materials, &gravity, &mut forces, &settings) {
                break Err(e);
            }
            state.step += 1;

            unbalanced = unbalanced_force(state, &forces);
            if state.step % 1000 == 0 {
                debug!(
                    "deposition step {}: unbalanced force {:?}, kinetic energy {:.3e} J",
                    state.step,
                    unbalanced,
                    state.kinetic_energy()
                );
            }
            if unbalanced.is_some_and(|u| u < self.tolerance) {
                settled = true;
                break Ok(());
            }
        };

        for (b, f) in state.boundaries.iter_mut().zip(free) {
            b.free = f;
        }
        outcome?;

        let report = DepositionReport {
            steps: state.step,
            unbalanced,
            kinetic_energy: state.kinetic_energy(),
            settled,
        };
        for p in state.particles.iter_mut() {
            p.v = NVec3::zeros();
            p.w = NVec3::zeros();
        }
        state.step = 0;
        state.t = 0.0;

        if settled {
            info!("packing settled after {} steps", report.steps);
        } else {
            info!(
                "deposition stopped at the step limit ({} steps, unbalanced force {:?})",
                report.steps, report.unbalanced
            );
        }
        Ok(report)
    }
}

/// Move boundary `plate` down or up along z until its lower face touches the
/// highest sphere under its footprint, and reset its displacement reference.
/// Returns the new centre height.
pub fn seat_plate(state: &mut SimulationState, plate: usize) -> SimResult<f64> {
    let Some(b) = state.boundaries.get(plate) else {
        return Err(SimError::config(format!("no boundary #{plate} to seat")));
    };
    let (c, h) = (b.x, b.half_extents);

    // highest point of each sphere whose disc reaches under the plate
    let top = state
        .particles
        .iter()
        .filter_map(|p| {
            let dx = ((p.x.x - c.x).abs() - h.x).max(0.0);
            let dy = ((p.x.y - c.y).abs() - h.y).max(0.0);
            let d2 = dx * dx + dy * dy;
            let r2 = p.radius * p.radius;
            (d2 < r2).then(|| p.x.z + (r2 - d2).sqrt())
        })
        .max_by(|a, b| a.total_cmp(b))
        .ok_or_else(|| SimError::config("no sphere lies under the plate footprint"))?;

    let z = top + h.z;
    let b = &mut state.boundaries[plate];
    b.x.z = z;
    b.x0 = b.x;
    b.v = NVec3::zeros();

    let id = BodyId::Boundary(plate);
    state.contacts.retain(|pair, _| pair.a != id && pair.b != id);
    debug!("plate seated at z = {z:.6} m");
    Ok(z)
}
