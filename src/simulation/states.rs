//! Core state types for the DEM simulation.
//!
//! Defines the bodies and the state bundle the loop steps:
//! - `Particle` : sphere with translational and rotational kinematics
//! - `Boundary` : axis-aligned rigid box (plate, floor, walls)
//! - `BodyId`   : id of either kind, ordered particles first
//! - `SimulationState` : everything that changes from step to step
//!
//! The state is owned by the simulation loop; every stage borrows it.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::Vector3;

use crate::simulation::collider::{Aabb, SweepAndPrune};
use crate::simulation::contact::ContactMap;
use crate::simulation::material::{Material, MaterialId};
use crate::simulation::sampler::Series;

pub type NVec3 = Vector3<f64>;

/// Identifies a body. Particles sort before boundaries, so in any ordered
/// pair containing a sphere and a box the sphere comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BodyId {
    Particle(usize),
    Boundary(usize),
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyId::Particle(i) => write!(f, "particle #{i}"),
            BodyId::Boundary(i) => write!(f, "boundary #{i}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub x: NVec3, // position
    pub v: NVec3, // velocity
    pub w: NVec3, // angular velocity
    pub radius: f64,
    pub material: MaterialId,
    pub m: f64,       // mass, density * 4/3 pi r^3
    pub inertia: f64, // 2/5 m r^2
}

impl Particle {
    /// Sphere at rest at `x`, mass derived from the material density
    pub fn new(x: NVec3, radius: f64, material: MaterialId, mat: &Material) -> Self {
        let m = mat.density * 4.0 / 3.0 * PI * radius.powi(3);
        Self {
            x,
            v: NVec3::zeros(),
            w: NVec3::zeros(),
            radius,
            material,
            m,
            inertia: 0.4 * m * radius * radius,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::of_sphere(&self.x, self.radius)
    }
}

/// Rigid axis-aligned box. Boundaries never rotate; each translation axis is
/// either free or blocked.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub x: NVec3,            // centre
    pub x0: NVec3,           // centre at creation, reference for displacement
    pub v: NVec3,            // velocity
    pub half_extents: NVec3, // half-sizes along x, y, z
    pub material: MaterialId,
    pub m: f64,           // mass, density * box volume
    pub free: [bool; 3],  // translation allowed along x, y, z
    pub load: NVec3,      // constant external force applied every step
}

impl Boundary {
    /// Box with every degree of freedom blocked and no load
    pub fn fixed(x: NVec3, half_extents: NVec3, material: MaterialId, mat: &Material) -> Self {
        let m = mat.density * 8.0 * half_extents.x * half_extents.y * half_extents.z;
        Self {
            x,
            x0: x,
            v: NVec3::zeros(),
            half_extents,
            material,
            m,
            free: [false; 3],
            load: NVec3::zeros(),
        }
    }

    /// Allow translation along the given axes
    pub fn with_free_axes(mut self, free: [bool; 3]) -> Self {
        self.free = free;
        self
    }

    pub fn with_load(mut self, load: NVec3) -> Self {
        self.load = load;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.load != NVec3::zeros()
    }

    pub fn is_fixed(&self) -> bool {
        !self.free.iter().any(|&f| f)
    }

    /// Displacement of the centre since creation
    pub fn displacement(&self) -> NVec3 {
        self.x - self.x0
    }

    pub fn min_half_extent(&self) -> f64 {
        self.half_extents.min()
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::of_box(&self.x, &self.half_extents)
    }
}

/// Everything the loop advances. Only `Simulation` owns one; stages get
/// `&`/`&mut` borrows for the duration of their call.
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    pub step: u64, // completed steps
    pub t: f64,    // elapsed time
    pub dt: f64,   // time step in use
    pub particles: Vec<Particle>,
    pub boundaries: Vec<Boundary>,
    pub contacts: ContactMap,  // live contacts keyed by body pair
    pub series: Series,        // sampled (step, displacement) records
    pub sweep: SweepAndPrune,  // broad-phase sort order carried between steps
}

impl SimulationState {
    pub fn new(particles: Vec<Particle>, boundaries: Vec<Boundary>) -> Self {
        Self {
            particles,
            boundaries,
            ..Default::default()
        }
    }

    pub fn body_count(&self) -> usize {
        self.particles.len() + self.boundaries.len()
    }

    /// True when `id` names a body in this state
    pub fn contains(&self, id: BodyId) -> bool {
        match id {
            BodyId::Particle(i) => i < self.particles.len(),
            BodyId::Boundary(i) => i < self.boundaries.len(),
        }
    }

    /// Id of the body stored at flat index `slot` (particles first)
    pub fn body_at(&self, slot: usize) -> BodyId {
        let n = self.particles.len();
        if slot < n {
            BodyId::Particle(slot)
        } else {
            BodyId::Boundary(slot - n)
        }
    }

    /// Index of the first boundary carrying an external load
    pub fn loaded_boundary(&self) -> Option<usize> {
        self.boundaries.iter().position(Boundary::is_loaded)
    }

    pub fn kinetic_energy(&self) -> f64 {
        let particles: f64 = self
            .particles
            .iter()
            .map(|p| 0.5 * p.m * p.v.norm_squared() + 0.5 * p.inertia * p.w.norm_squared())
            .sum();
        let boundaries: f64 = self
            .boundaries
            .iter()
            .map(|b| 0.5 * b.m * b.v.norm_squared())
            .sum();
        particles + boundaries
    }
}
