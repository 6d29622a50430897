//! Contact detection: sweep-and-prune broad phase plus exact narrow phase.
//!
//! The broad phase sorts bounding-box lower edges along x and sweeps the
//! sorted list. The order from the previous step is kept and re-sorted with
//! insertion sort, which is close to linear when bodies move a little per step.
//!
//! The narrow phase is a closed set of shape pairs. A candidate is classified
//! once into a [`ShapePair`] and dispatched to the matching overlap test.

use crate::error::{SimError, SimResult};
use crate::simulation::states::{BodyId, NVec3, SimulationState};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: NVec3,
    pub max: NVec3,
}

impl Aabb {
    pub fn new(min: NVec3, max: NVec3) -> Self {
        Self { min, max }
    }

    pub fn of_sphere(x: &NVec3, r: f64) -> Self {
        let e = NVec3::repeat(r);
        Self { min: x - e, max: x + e }
    }

    pub fn of_box(center: &NVec3, half_extents: &NVec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Closed-interval overlap on all three axes (touching counts)
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.overlaps_yz(other)
    }

    fn overlaps_yz(&self, other: &Aabb) -> bool {
        self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    pub fn contains(&self, p: &NVec3) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    pub fn center(&self) -> NVec3 {
        0.5 * (self.min + self.max)
    }

    pub fn size(&self) -> NVec3 {
        self.max - self.min
    }
}

/// Unordered pair of bodies, stored with `a < b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyPair {
    pub a: BodyId,
    pub b: BodyId,
}

impl BodyPair {
    pub fn new(i: BodyId, j: BodyId) -> Self {
        if i <= j {
            Self { a: i, b: j }
        } else {
            Self { a: j, b: i }
        }
    }
}

/// Sweep-and-prune broad phase. `order` holds flat body slots (particles
/// first, then boundaries) sorted by the x lower edge of their boxes.
#[derive(Debug, Clone, Default)]
pub struct SweepAndPrune {
    order: Vec<usize>,
}

impl SweepAndPrune {
    /// Candidate pairs whose boxes overlap, sorted and without duplicates.
    /// Boundary-boundary pairs are never reported.
    pub fn detect(&mut self, aabbs: &[Aabb], n_particles: usize) -> Vec<(usize, usize)> {
        let n = aabbs.len();
        if self.order.len() != n {
            // body set changed, start over from slot order
            self.order = (0..n).collect();
        }
        insertion_sort_by_key(&mut self.order, |i| aabbs[i].min.x);

        let mut pairs = Vec::new();
        for (k, &i) in self.order.iter().enumerate() {
            let a = &aabbs[i];
            for &j in &self.order[k + 1..] {
                let b = &aabbs[j];
                // sorted by min.x: nothing further along can reach back to `a`
                if b.min.x > a.max.x {
                    break;
                }
                if i >= n_particles && j >= n_particles {
                    continue;
                }
                if a.overlaps_yz(b) {
                    pairs.push((i.min(j), i.max(j)));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }
}

/// Insertion sort of `order` by `key`, stable and cheap for nearly sorted input
fn insertion_sort_by_key(order: &mut [usize], key: impl Fn(usize) -> f64) {
    for k in 1..order.len() {
        let cur = order[k];
        let cur_key = key(cur);
        let mut j = k;
        while j > 0 && key(order[j - 1]) > cur_key {
            order[j] = order[j - 1];
            j -= 1;
        }
        order[j] = cur;
    }
}

/// O(n^2) reference: every pair of overlapping boxes, same filtering and order
/// as [`SweepAndPrune::detect`]
pub fn brute_force_pairs(aabbs: &[Aabb], n_particles: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..aabbs.len() {
        for j in (i + 1)..aabbs.len() {
            if i >= n_particles && j >= n_particles {
                continue;
            }
            if aabbs[i].overlaps(&aabbs[j]) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Bounding boxes of every body, in flat slot order
pub fn body_aabbs(state: &SimulationState) -> Vec<Aabb> {
    state
        .particles
        .iter()
        .map(|p| p.aabb())
        .chain(state.boundaries.iter().map(|b| b.aabb()))
        .collect()
}

/// Run the broad phase over the whole state
pub fn broad_phase(state: &mut SimulationState) -> Vec<BodyPair> {
    let aabbs = body_aabbs(state);
    let n = state.particles.len();
    let slots = state.sweep.detect(&aabbs, n);
    slots
        .into_iter()
        .map(|(i, j)| BodyPair::new(state.body_at(i), state.body_at(j)))
        .collect()
}

// =========================================================================================
// Narrow phase
// =========================================================================================

/// Closed set of supported shape combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapePair {
    SphereSphere,
    SphereBox,
}

impl ShapePair {
    /// Shape pair for a candidate, `None` for box-box
    pub fn classify(pair: &BodyPair) -> Option<ShapePair> {
        match (pair.a, pair.b) {
            (BodyId::Particle(_), BodyId::Particle(_)) => Some(ShapePair::SphereSphere),
            (BodyId::Particle(_), BodyId::Boundary(_)) => Some(ShapePair::SphereBox),
            _ => None,
        }
    }
}

/// Exact contact between two bodies of a pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactGeometry {
    pub normal: NVec3, // unit normal pointing from body a towards body b
    pub overlap: f64,  // penetration depth, > 0
    pub point: NVec3,  // middle of the overlap region
}

/// Narrow phase result that has no usable normal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Degenerate;

/// Confirm a candidate and measure its overlap. `Ok(None)` when the bodies
/// do not actually touch.
pub fn narrow_phase(
    state: &SimulationState,
    pair: &BodyPair,
) -> SimResult<Option<(ShapePair, ContactGeometry)>> {
    let Some(shape) = ShapePair::classify(pair) else {
        return Ok(None);
    };

    let geometry = match (shape, pair.a, pair.b) {
        (ShapePair::SphereSphere, BodyId::Particle(i), BodyId::Particle(j)) => {
            let (pa, pb) = (&state.particles[i], &state.particles[j]);
            sphere_sphere(&pa.x, pa.radius, &pb.x, pb.radius)
        }
        (ShapePair::SphereBox, BodyId::Particle(i), BodyId::Boundary(j)) => {
            let (p, b) = (&state.particles[i], &state.boundaries[j]);
            sphere_box(&p.x, p.radius, &b.x, &b.half_extents)
        }
        _ => Err(Degenerate),
    };

    match geometry {
        Ok(g) => Ok(g.map(|g| (shape, g))),
        Err(Degenerate) => Err(SimError::DegenerateContact {
            a: pair.a,
            b: pair.b,
            shape,
        }),
    }
}

/// Sphere a against sphere b
pub fn sphere_sphere(
    xa: &NVec3,
    ra: f64,
    xb: &NVec3,
    rb: f64,
) -> Result<Option<ContactGeometry>, Degenerate> {
    let d = xb - xa;
    let dist = d.norm();
    let overlap = ra + rb - dist;
    if !overlap.is_finite() {
        return Err(Degenerate);
    }
    if overlap <= 0.0 {
        return Ok(None);
    }
    // coincident centres leave the normal undefined
    if dist <= f64::EPSILON * (ra + rb) {
        return Err(Degenerate);
    }
    let normal = d / dist;
    Ok(Some(ContactGeometry {
        normal,
        overlap,
        point: xa + normal * (ra - 0.5 * overlap),
    }))
}

/// Sphere a against an axis-aligned box b
pub fn sphere_box(
    x: &NVec3,
    r: f64,
    center: &NVec3,
    half_extents: &NVec3,
) -> Result<Option<ContactGeometry>, Degenerate> {
    let p = x - center;
    if !p.iter().all(|c| c.is_finite()) {
        return Err(Degenerate);
    }
    let inside = (0..3).all(|i| p[i].abs() <= half_extents[i]);

    // outward normal of the box at the contact, and the overlap along it
    let (outward, overlap) = if inside {
        // centre inside the box: push out through the nearest face
        let mut axis = 0;
        let mut depth = f64::INFINITY;
        for i in 0..3 {
            let d = half_extents[i] - p[i].abs();
            if d < depth {
                depth = d;
                axis = i;
            }
        }
        let mut n = NVec3::zeros();
        n[axis] = if p[axis] >= 0.0 { 1.0 } else { -1.0 };
        (n, r + depth)
    } else {
        let q = NVec3::from_fn(|i, _| p[i].clamp(-half_extents[i], half_extents[i]));
        let d = p - q;
        let dist = d.norm();
        let overlap = r - dist;
        if overlap <= 0.0 {
            return Ok(None);
        }
        if dist <= f64::EPSILON * r {
            return Err(Degenerate);
        }
        (d / dist, overlap)
    };

    Ok(Some(ContactGeometry {
        normal: -outward,
        overlap,
        point: x - outward * (r - 0.5 * overlap),
    }))
}
