//! Explicit time integration of particles and boundaries
//!
//! Semi-implicit (symplectic) Euler: velocities are kicked with the forces
//! accumulated for this step, then positions drift with the new velocities.
//! Global damping is applied in one of two modes, see [`DampingMode`].
//! Boundary axes that are blocked have their velocity zeroed before the
//! drift, so they keep their position while still receiving forces.

use crate::configuration::config::DampingMode;
use crate::simulation::forces::ForceAccumulator;
use crate::simulation::states::{BodyId, NVec3, SimulationState};

/// Global damping settings
#[derive(Debug, Clone, Copy)]
pub struct Damping {
    pub mode: DampingMode,
    pub coefficient: f64, // in [0, 1)
}

impl Damping {
    pub fn none() -> Self {
        Self {
            mode: DampingMode::Velocity,
            coefficient: 0.0,
        }
    }
}

/// Non-viscous damping: scale each force component by 1 - d sign(F_i v_i),
/// with v taken at mid-step
fn cundall_damp(f: NVec3, v: NVec3, accel: NVec3, dt: f64, d: f64) -> NVec3 {
    NVec3::from_fn(|i, _| {
        let v_mid = v[i] + 0.5 * dt * accel[i];
        let s = f[i] * v_mid;
        if s > 0.0 {
            f[i] * (1.0 - d)
        } else if s < 0.0 {
            f[i] * (1.0 + d)
        } else {
            f[i]
        }
    })
}

/// Advance every body by one step of `state.dt` and advance `state.t`
pub fn leapfrog_step(state: &mut SimulationState, forces: &ForceAccumulator, damping: &Damping) {
    let dt = state.dt;
    let d = damping.coefficient;

    for (i, p) in state.particles.iter_mut().enumerate() {
        let id = BodyId::Particle(i);
        let mut f = forces.force(id);
        let mut t = forces.torque(id);

        if damping.mode == DampingMode::Cundall && d > 0.0 {
            f = cundall_damp(f, p.v, f / p.m, dt, d);
            t = cundall_damp(t, p.w, t / p.inertia, dt, d);
        }

        // Kick: v_n+1 = v_n + dt * F / m
        p.v += dt * f / p.m;
        p.w += dt * t / p.inertia;

        if damping.mode == DampingMode::Velocity && d > 0.0 {
            p.v *= 1.0 - d;
            p.w *= 1.0 - d;
        }

        // Drift: x_n+1 = x_n + dt * v_n+1
        p.x += dt * p.v;
    }

    for (i, b) in state.boundaries.iter_mut().enumerate() {
        if b.is_fixed() {
            b.v = NVec3::zeros();
            continue;
        }
        let mut f = forces.force(BodyId::Boundary(i));

        if damping.mode == DampingMode::Cundall && d > 0.0 {
            f = cundall_damp(f, b.v, f / b.m, dt, d);
        }

        b.v += dt * f / b.m;

        if damping.mode == DampingMode::Velocity && d > 0.0 {
            b.v *= 1.0 - d;
        }

        // constraint projection: blocked axes do not move
        for axis in 0..3 {
            if !b.free[axis] {
                b.v[axis] = 0.0;
            }
        }

        b.x += dt * b.v;
    }

    // advance time: t_n+1 = t_n + dt
    state.t += dt;
}
