//! Per-step force and torque accumulation.
//!
//! [`ForceAccumulator`] holds one force and one torque slot per body. It is
//! reset at the top of every step and then summed into by the contact
//! resolver and by the body-force terms in a [`BodyForceSet`] (gravity,
//! constant boundary loads).

use crate::simulation::states::{BodyId, NVec3, SimulationState};

/// Force and torque totals for the current step
#[derive(Debug, Clone)]
pub struct ForceAccumulator {
    n_particles: usize,
    force: Vec<NVec3>,
    torque: Vec<NVec3>,
}

impl ForceAccumulator {
    pub fn new(n_particles: usize, n_boundaries: usize) -> Self {
        let n = n_particles + n_boundaries;
        Self {
            n_particles,
            force: vec![NVec3::zeros(); n],
            torque: vec![NVec3::zeros(); n],
        }
    }

    /// Sized for every body of `state`
    pub fn for_state(state: &SimulationState) -> Self {
        let acc = Self::new(state.particles.len(), state.boundaries.len());
        debug_assert_eq!(acc.force.len(), state.body_count());
        acc
    }

    /// Flat slot of a body. An id outside the accumulator is a caller bug.
    fn slot(&self, id: BodyId) -> usize {
        let slot = match id {
            BodyId::Particle(i) => {
                assert!(i < self.n_particles, "unknown body {id}");
                i
            }
            BodyId::Boundary(i) => self.n_particles + i,
        };
        assert!(slot < self.force.len(), "unknown body {id}");
        slot
    }

    /// Zero every slot
    pub fn reset(&mut self) {
        for f in self.force.iter_mut() {
            *f = NVec3::zeros();
        }
        for t in self.torque.iter_mut() {
            *t = NVec3::zeros();
        }
    }

    /// Add a force and a torque to a body
    pub fn add(&mut self, id: BodyId, force: NVec3, torque: NVec3) {
        let s = self.slot(id);
        self.force[s] += force;
        self.torque[s] += torque;
    }

    /// Add a constant external load (no torque)
    pub fn apply_external(&mut self, id: BodyId, force: NVec3) {
        let s = self.slot(id);
        self.force[s] += force;
    }

    pub fn force(&self, id: BodyId) -> NVec3 {
        self.force[self.slot(id)]
    }

    pub fn torque(&self, id: BodyId) -> NVec3 {
        self.torque[self.slot(id)]
    }

    /// Sum of all forces, zero for a closed system of contacts
    pub fn net_force(&self) -> NVec3 {
        self.force.iter().sum()
    }
}

/// Body force contributors operating on a [`SimulationState`].
/// Implementations add into the accumulator; they never reset it.
pub trait BodyForce {
    fn apply(&self, state: &SimulationState, out: &mut ForceAccumulator);
}

/// Uniform gravitational field, m * g on every body
pub struct Gravity {
    pub g: NVec3,
}

impl BodyForce for Gravity {
    fn apply(&self, state: &SimulationState, out: &mut ForceAccumulator) {
        for (i, p) in state.particles.iter().enumerate() {
            out.apply_external(BodyId::Particle(i), p.m * self.g);
        }
        for (i, b) in state.boundaries.iter().enumerate() {
            out.apply_external(BodyId::Boundary(i), b.m * self.g);
        }
    }
}

/// Constant load configured on each boundary (the plate pressure)
pub struct BoundaryLoads;

impl BodyForce for BoundaryLoads {
    fn apply(&self, state: &SimulationState, out: &mut ForceAccumulator) {
        for (i, b) in state.boundaries.iter().enumerate() {
            if b.is_loaded() {
                out.apply_external(BodyId::Boundary(i), b.load);
            }
        }
    }
}

/// Collection of body force terms, applied in insertion order
pub struct BodyForceSet {
    terms: Vec<Box<dyn BodyForce + Send + Sync>>,
}

impl BodyForceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Gravity followed by boundary loads
    pub fn standard(gravity: NVec3) -> Self {
        Self::new().with(Gravity { g: gravity }).with(BoundaryLoads)
    }

    /// Add a term
    pub fn with(mut self, term: impl BodyForce + Send + Sync + 'static) -> Self {
        self.terms.push(Box::new(term));
        self
    }

    /// Add every term's contribution to `out`
    pub fn apply_all(&self, state: &SimulationState, out: &mut ForceAccumulator) {
        for term in &self.terms {
            term.apply(state, out);
        }
    }
}

impl Default for BodyForceSet {
    fn default() -> Self {
        Self::new()
    }
}
