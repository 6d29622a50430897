//! Loose random sphere cloud, the initial packing of a scenario.
//!
//! Radii are drawn uniformly in `mean * (1 +- fuzz)` and placed largest
//! first. Each sphere gets up to `max_attempts` random centres inside the
//! bounds; a centre is rejected if it overlaps an already placed sphere.
//! Overlap checks go through a uniform hash grid with cells of one largest
//! diameter, so only the 27 surrounding cells need to be looked at.

use std::collections::HashMap;

use log::warn;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::simulation::collider::Aabb;
use crate::simulation::states::NVec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedSphere {
    pub center: NVec3,
    pub radius: f64,
}

/// Parameters of a cloud
#[derive(Debug, Clone)]
pub struct CloudSpec {
    pub bounds: Aabb,
    pub radius_mean: f64,
    pub radius_fuzz: f64, // relative spread, in [0, 1)
    pub count: usize,
    pub max_attempts: usize, // tries per sphere before giving up
}

impl CloudSpec {
    pub fn new(bounds: Aabb, radius_mean: f64, radius_fuzz: f64, count: usize) -> Self {
        Self {
            bounds,
            radius_mean,
            radius_fuzz,
            count,
            max_attempts: 1000,
        }
    }

    pub fn max_radius(&self) -> f64 {
        self.radius_mean * (1.0 + self.radius_fuzz)
    }
}

type Cell = (i64, i64, i64);

struct HashGrid {
    origin: NVec3,
    cell: f64,
    cells: HashMap<Cell, Vec<usize>>,
}

impl HashGrid {
    fn new(origin: NVec3, cell: f64) -> Self {
        Self {
            origin,
            cell,
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, x: &NVec3) -> Cell {
        let r = (x - self.origin) / self.cell;
        (r.x.floor() as i64, r.y.floor() as i64, r.z.floor() as i64)
    }

    fn insert(&mut self, x: &NVec3, idx: usize) {
        let c = self.cell_of(x);
        self.cells.entry(c).or_default().push(idx);
    }

    fn overlaps(&self, x: &NVec3, r: f64, spheres: &[PackedSphere]) -> bool {
        let (cx, cy, cz) = self.cell_of(x);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &j in bucket {
                        let s = &spheres[j];
                        let reach = r + s.radius;
                        if (s.center - x).norm_squared() < reach * reach {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

/// Generate a non-overlapping cloud. Returns fewer than `spec.count` spheres
/// if the box fills up; a warning is logged in that case.
pub fn make_cloud(spec: &CloudSpec, seed: u64) -> Vec<PackedSphere> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let r_lo = spec.radius_mean * (1.0 - spec.radius_fuzz);
    let r_hi = spec.max_radius();
    let mut radii: Vec<f64> = (0..spec.count).map(|_| rng.gen_range(r_lo..=r_hi)).collect();
    radii.sort_by(|a, b| b.total_cmp(a));

    let mut grid = HashGrid::new(spec.bounds.min, 2.0 * r_hi);
    let mut spheres: Vec<PackedSphere> = Vec::with_capacity(spec.count);

    'spheres: for &r in &radii {
        let lo = spec.bounds.min + NVec3::repeat(r);
        let hi = spec.bounds.max - NVec3::repeat(r);
        if (0..3).any(|i| lo[i] > hi[i]) {
            warn!("sphere of radius {r} does not fit in the cloud bounds");
            break;
        }
        for _ in 0..spec.max_attempts {
            let c = NVec3::new(
                rng.gen_range(lo.x..=hi.x),
                rng.gen_range(lo.y..=hi.y),
                rng.gen_range(lo.z..=hi.z),
            );
            if !grid.overlaps(&c, r, &spheres) {
                grid.insert(&c, spheres.len());
                spheres.push(PackedSphere { center: c, radius: r });
                continue 'spheres;
            }
        }
        warn!(
            "cloud is full after {} of {} spheres ({} attempts for the next one)",
            spheres.len(),
            spec.count,
            spec.max_attempts
        );
        break;
    }
    spheres
}
