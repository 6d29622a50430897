//! Contact law: linear elastic normal spring, Coulomb-capped tangential
//! spring with history, viscous normal damping.
//!
//! Stiffness combination for two bodies a and b in contact:
//!
//! ```text
//! kn = 2 Ea ra Eb rb / (Ea ra + Eb rb)
//! ks = 2 Ea ra va Eb rb vb / (Ea ra va + Eb rb vb)
//! mu = tan(min(phi_a, phi_b))
//! ```
//!
//! where `v` is the Poisson ratio and a box takes the radius of the sphere it
//! touches. Forces are computed per pair against the previous step's contact
//! map, then reduced into the accumulator in sorted pair order, so the result
//! does not depend on whether pairs were evaluated in parallel.

use std::collections::HashMap;

use crate::error::{InstabilityCause, SimError, SimResult};
use crate::simulation::collider::{narrow_phase, BodyPair, ContactGeometry, ShapePair};
use crate::simulation::forces::ForceAccumulator;
use crate::simulation::material::MaterialRegistry;
use crate::simulation::states::{BodyId, NVec3, SimulationState};

/// Persistent state of one touching pair
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub shape: ShapePair,
    pub shear: NVec3,             // accumulated tangential elastic displacement of b relative to a
    pub relative_velocity: NVec3, // velocity of b relative to a at the contact point
    pub normal: NVec3,            // from a to b
    pub overlap: f64,
    pub normal_force: f64, // >= 0
    pub shear_force: NVec3, // tangential force on b
    pub friction: f64,      // Coulomb coefficient of the pair
}

pub type ContactMap = HashMap<BodyPair, Contact>;

/// Pair-independent contact parameters
#[derive(Debug, Clone, Copy)]
pub struct ContactLaw {
    pub damping_ratio: f64,     // fraction of critical viscous damping in the normal direction
    pub max_overlap_ratio: f64, // overlap limit as a fraction of the smaller radius
}

/// Harmonic-mean style combination used for both stiffnesses
fn combine(a: f64, b: f64) -> f64 {
    if a + b <= 0.0 {
        0.0
    } else {
        2.0 * a * b / (a + b)
    }
}

/// Normal stiffness of a pair (N/m)
pub fn normal_stiffness(young_a: f64, ra: f64, young_b: f64, rb: f64) -> f64 {
    combine(young_a * ra, young_b * rb)
}

/// Tangential stiffness of a pair (N/m)
pub fn shear_stiffness(young_a: f64, ra: f64, nu_a: f64, young_b: f64, rb: f64, nu_b: f64) -> f64 {
    combine(young_a * ra * nu_a, young_b * rb * nu_b)
}

pub fn friction_coefficient(phi_a: f64, phi_b: f64) -> f64 {
    phi_a.min(phi_b).tan()
}

/// Velocity, lever arm and size of one side of a contact
struct Side {
    x: NVec3,
    v: NVec3,
    w: NVec3,
    m: f64,
    radius: f64,
    material: usize,
}

fn side(state: &SimulationState, id: BodyId, other_radius: f64) -> Side {
    match id {
        BodyId::Particle(i) => {
            let p = &state.particles[i];
            Side {
                x: p.x,
                v: p.v,
                w: p.w,
                m: p.m,
                radius: p.radius,
                material: p.material,
            }
        }
        BodyId::Boundary(i) => {
            let b = &state.boundaries[i];
            Side {
                x: b.x,
                v: b.v,
                w: NVec3::zeros(),
                m: b.m,
                radius: other_radius,
                material: b.material,
            }
        }
    }
}

/// Forces of one contact, ready to be reduced into the accumulator
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub pair: BodyPair,
    pub contact: Contact,
    pub force_b: NVec3, // force on b; a receives the opposite
    pub torque_a: NVec3,
    pub torque_b: NVec3,
}

/// Evaluate one candidate pair against the previous contact map.
/// `Ok(None)` when the pair does not overlap: its record, if any, is dropped.
pub fn evaluate_pair(
    state: &SimulationState,
    materials: &MaterialRegistry,
    law: &ContactLaw,
    pair: BodyPair,
) -> SimResult<Option<PairOutcome>> {
    let Some((shape, geom)) = narrow_phase(state, &pair)? else {
        return Ok(None);
    };

    // sphere radius drives the box side of a sphere-box contact
    let ra = match pair.a {
        BodyId::Particle(i) => state.particles[i].radius,
        BodyId::Boundary(_) => 0.0,
    };
    let a = side(state, pair.a, ra);
    let b = side(state, pair.b, a.radius);

    let limit = law.max_overlap_ratio * a.radius.min(b.radius);
    if geom.overlap > limit {
        return Err(SimError::instability(
            state.step,
            InstabilityCause::Overlap {
                a: pair.a,
                b: pair.b,
                overlap: geom.overlap,
                limit,
            },
        ));
    }

    let previous = state.contacts.get(&pair);
    Ok(Some(contact_forces(
        pair, state.dt, materials, law, shape, &geom, &a, &b, previous,
    )))
}

#[allow(clippy::too_many_arguments)]
fn contact_forces(
    pair: BodyPair,
    dt: f64,
    materials: &MaterialRegistry,
    law: &ContactLaw,
    shape: ShapePair,
    geom: &ContactGeometry,
    a: &Side,
    b: &Side,
    previous: Option<&Contact>,
) -> PairOutcome {
    let mat_a = materials.material(a.material);
    let mat_b = materials.material(b.material);
    let kn = normal_stiffness(mat_a.young, a.radius, mat_b.young, b.radius);
    let ks = shear_stiffness(
        mat_a.young,
        a.radius,
        mat_a.poisson,
        mat_b.young,
        b.radius,
        mat_b.poisson,
    );
    let mu = friction_coefficient(mat_a.friction_angle, mat_b.friction_angle);

    let n = geom.normal;
    let arm_a = geom.point - a.x;
    let arm_b = geom.point - b.x;

    // relative velocity of b with respect to a at the contact point
    let v_rel = (b.v + b.w.cross(&arm_b)) - (a.v + a.w.cross(&arm_a));
    let v_n = v_rel.dot(&n); // > 0 when separating
    let v_t = v_rel - n * v_n;

    // effective mass for damping; a box stands in with the sphere's own mass
    let m_eff = match shape {
        ShapePair::SphereSphere => a.m * b.m / (a.m + b.m),
        ShapePair::SphereBox => a.m,
    };
    let c_n = 2.0 * law.damping_ratio * (kn * m_eff).sqrt();

    // never tensile
    let f_n = (kn * geom.overlap - c_n * v_n).max(0.0);

    // rotate the stored shear into the current tangent plane, keeping its length
    let mut shear = match previous {
        Some(c) => {
            let s = c.shear - n * c.shear.dot(&n);
            let len = s.norm();
            let old = c.shear.norm();
            if len > 0.0 {
                s * (old / len)
            } else {
                s
            }
        }
        None => NVec3::zeros(),
    };
    shear += v_t * dt;

    let mut f_t = -ks * shear;
    let cap = mu * f_n;
    let f_t_norm = f_t.norm();
    if f_t_norm > cap {
        // sliding: clamp the force and keep the spring consistent with it
        if f_t_norm > 0.0 {
            f_t *= cap / f_t_norm;
        }
        shear = if ks > 0.0 { -f_t / ks } else { NVec3::zeros() };
    }

    let force_b = n * f_n + f_t;
    PairOutcome {
        pair,
        contact: Contact {
            shape,
            shear,
            relative_velocity: v_rel,
            normal: n,
            overlap: geom.overlap,
            normal_force: f_n,
            shear_force: f_t,
            friction: mu,
        },
        force_b,
        torque_a: arm_a.cross(&(-force_b)),
        torque_b: arm_b.cross(&force_b),
    }
}

/// Evaluate every candidate, rebuild the contact map and add contact forces
/// to the accumulator. Pairs missing from `pairs` lose their history.
pub fn resolve_contacts(
    state: &mut SimulationState,
    materials: &MaterialRegistry,
    law: &ContactLaw,
    pairs: &[BodyPair],
    forces: &mut ForceAccumulator,
    parallel: bool,
) -> SimResult<()> {
    let outcomes = evaluate_all(state, materials, law, pairs, parallel);

    let mut contacts = ContactMap::with_capacity(state.contacts.len());
    for outcome in outcomes {
        let Some(o) = outcome? else {
            continue;
        };
        forces.add(o.pair.a, -o.force_b, o.torque_a);
        forces.add(o.pair.b, o.force_b, o.torque_b);
        contacts.insert(o.pair, o.contact);
    }
    state.contacts = contacts;
    Ok(())
}

fn evaluate_all(
    state: &SimulationState,
    materials: &MaterialRegistry,
    law: &ContactLaw,
    pairs: &[BodyPair],
    parallel: bool,
) -> Vec<SimResult<Option<PairOutcome>>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
        if parallel {
            return pairs
                .par_iter()
                .map(|&pair| evaluate_pair(state, materials, law, pair))
                .collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    pairs
        .iter()
        .map(|&pair| evaluate_pair(state, materials, law, pair))
        .collect()
}
