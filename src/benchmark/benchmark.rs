use std::time::Instant;

use crate::simulation::collider::{brute_force_pairs, Aabb, SweepAndPrune};
use crate::simulation::driver::{advance, StepSettings};
use crate::simulation::engine::Engine;
use crate::simulation::forces::{BodyForceSet, ForceAccumulator};
use crate::simulation::material::{Material, MaterialRegistry};
use crate::simulation::params::Parameters;
use crate::simulation::stability::StabilityController;
use crate::simulation::states::{Boundary, NVec3, Particle, SimulationState};

/// Sweep-and-prune against the O(n^2) reference on growing assemblies
pub fn bench_collider() {
    // Different assembly sizes to test
    let ns = [500, 1000, 2000, 4000, 8000];

    for n in ns {
        let state = make_state(n);
        let aabbs: Vec<Aabb> = state.particles.iter().map(|p| p.aabb()).collect();

        let mut sap = SweepAndPrune::default();

        // Warm up, also primes the sort order
        let n_sap = sap.detect(&aabbs, n).len();
        let n_brute = brute_force_pairs(&aabbs, n).len();
        if n_sap != n_brute {
            println!("N = {n:5}: sweep-and-prune found {n_sap} pairs, brute force {n_brute}");
        }

        // Time sweep-and-prune on coherent (already sorted) input
        let t0 = Instant::now();
        sap.detect(&aabbs, n);
        let dt_sap = t0.elapsed().as_secs_f64();

        // Time brute force
        let t1 = Instant::now();
        brute_force_pairs(&aabbs, n);
        let dt_brute = t1.elapsed().as_secs_f64();

        println!("N = {n:5}, pairs = {n_sap:6}, SAP = {dt_sap:8.6} s, brute = {dt_brute:8.6} s");
    }
}

/// Full pipeline step time, sequential and (with the feature) rayon contacts
pub fn bench_step() {
    let ns = [500, 1000, 2000, 4000];
    let steps = 20; // steps per measurement

    for n in ns {
        let materials = MaterialRegistry::with_defaults();
        let params = Parameters {
            damping: 0.4,
            ..Parameters::default()
        };
        let body_forces = BodyForceSet::standard(params.gravity);

        let mut per_step = Vec::new();
        for parallel in [false, true] {
            if parallel && !cfg!(feature = "parallel") {
                continue;
            }
            let mut state = make_state(n);
            state.dt = StabilityController { safety_factor: 0.5 }
                .bound(&state.particles, &materials)
                .unwrap_or(1e-5);
            let engine = Engine {
                parallel,
                ..Engine::default()
            };
            let settings = StepSettings::new(&params, &engine);
            let mut forces = ForceAccumulator::for_state(&state);

            let t0 = Instant::now();
            for _ in 0..steps {
                if let Err(e) = advance(&mut state, &materials, &body_forces, &mut forces, &settings) {
                    println!("N = {n:5}: step failed: {e}");
                    break;
                }
                state.step += 1;
            }
            per_step.push((parallel, t0.elapsed().as_secs_f64() / steps as f64));
        }

        for (parallel, t) in per_step {
            let label = if parallel { "rayon" } else { "sequential" };
            println!("N = {n:5}, {label:>10} step = {t:8.6} s");
        }
    }
}

/// Helper to build a loosely packed column of `n` spheres on a floor.
/// Deterministic positions, no rng needed.
fn make_state(n: usize) -> SimulationState {
    let materials = MaterialRegistry::with_defaults();
    let soil = materials.id_of("granular").unwrap_or(0);
    let plate = materials.id_of("plate").unwrap_or(0);
    let soil_rec: &Material = materials.material(soil);

    let r = 0.01;
    let side = ((n as f64).cbrt().ceil() as usize).max(1);
    let spacing = 2.2 * r;

    let mut particles = Vec::with_capacity(n);
    for i in 0..n {
        let i_f = i as f64;
        let (ix, iy, iz) = (i % side, (i / side) % side, i / (side * side));
        // jitter so the sort order is not trivial
        let x = NVec3::new(
            ix as f64 * spacing + (i_f * 0.37).sin() * 0.05 * r,
            iy as f64 * spacing + (i_f * 0.13).cos() * 0.05 * r,
            r + iz as f64 * spacing + (i_f * 0.07).sin() * 0.05 * r,
        );
        particles.push(Particle::new(x, r, soil, soil_rec));
    }

    let extent = side as f64 * spacing;
    let floor = Boundary::fixed(
        NVec3::new(0.5 * extent, 0.5 * extent, -0.01),
        NVec3::new(extent, extent, 0.01),
        plate,
        materials.material(plate),
    );

    SimulationState::new(particles, vec![floor])
}
