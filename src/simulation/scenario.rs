//! Build fully-initialized plate load scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime bundle
//! (`Scenario`) containing:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - material registry with the soil, plate and any extra records
//! - initial state: the sphere cloud, the loaded plate and the container
//!
//! `Scenario::settle` runs the optional gravity deposition and seats the
//! plate on the result; `Scenario::prepare` does both steps at once.
//! `Scenario::into_simulation` hands everything to the loop.

use log::info;

use crate::configuration::config::{ContainerConfig, ScenarioConfig};
use crate::error::{SimError, SimResult};
use crate::simulation::collider::Aabb;
use crate::simulation::deposition::{seat_plate, Deposition, DepositionReport};
use crate::simulation::driver::Simulation;
use crate::simulation::engine::Engine;
use crate::simulation::material::{Material, MaterialId, MaterialRegistry};
use crate::simulation::packing::{make_cloud, CloudSpec};
use crate::simulation::params::Parameters;
use crate::simulation::states::{Boundary, NVec3, Particle, SimulationState};

/// Runtime bundle built from a [`ScenarioConfig`]
pub struct Scenario {
    pub engine: Engine,
    pub parameters: Parameters,
    pub materials: MaterialRegistry,
    pub state: SimulationState,
    pub plate: usize, // boundary index of the loaded plate
    pub deposition: Option<Deposition>,
    pub seat_plate: bool,
}

fn vec3(a: &[f64; 3]) -> NVec3 {
    NVec3::new(a[0], a[1], a[2])
}

fn material_id(materials: &MaterialRegistry, name: &str) -> SimResult<MaterialId> {
    materials
        .id_of(name)
        .ok_or_else(|| SimError::config(format!("unknown material '{name}'")))
}

impl Scenario {
    pub fn build_scenario(cfg: &ScenarioConfig) -> SimResult<Self> {
        // Materials: built-in records plus whatever the scenario adds
        let mut materials = MaterialRegistry::with_defaults();
        for mc in &cfg.materials {
            materials.register(Material::new(
                &mc.name,
                mc.young,
                mc.poisson,
                mc.friction_angle_deg.to_radians(),
                mc.density,
            ))?;
        }
        let soil = material_id(&materials, &cfg.soil_material)?;
        let plate_mat = material_id(
            &materials,
            cfg.plate_geometry.material.as_deref().unwrap_or("plate"),
        )?;

        if !(cfg.particle_radius_mean > 0.0) {
            return Err(SimError::config("particleRadiusMean must be > 0"));
        }
        if !(0.0..1.0).contains(&cfg.particle_radius_fuzz) {
            return Err(SimError::config("particleRadiusFuzz must be in [0, 1)"));
        }
        if cfg.particle_count == 0 {
            return Err(SimError::config("particleCount must be > 0"));
        }
        if !(cfg.plate_load > 0.0) {
            return Err(SimError::config("plateLoad must be a positive downward force"));
        }
        let bounds = Aabb::new(
            vec3(&cfg.particle_cloud_bounds.min),
            vec3(&cfg.particle_cloud_bounds.max),
        );
        if (0..3).any(|i| bounds.min[i] >= bounds.max[i]) {
            return Err(SimError::config("particleCloudBounds min must be below max"));
        }

        // Particles: seeded random cloud
        let spec = CloudSpec::new(
            bounds,
            cfg.particle_radius_mean,
            cfg.particle_radius_fuzz,
            cfg.particle_count,
        );
        let soil_rec = materials.material(soil);
        let particles: Vec<Particle> = make_cloud(&spec, cfg.seed)
            .into_iter()
            .map(|s| Particle::new(s.center, s.radius, soil, soil_rec))
            .collect();
        if particles.is_empty() {
            return Err(SimError::config("particle cloud generation placed no spheres"));
        }
        info!(
            "generated {} of {} spheres in {:?} .. {:?}",
            particles.len(),
            cfg.particle_count,
            cfg.particle_cloud_bounds.min,
            cfg.particle_cloud_bounds.max
        );

        // Plate: free to settle along z only, loaded downwards
        let plate_geom = &cfg.plate_geometry;
        let half = vec3(&plate_geom.extents);
        if (0..3).any(|i| half[i] <= 0.0) {
            return Err(SimError::config("plate extents must be positive"));
        }
        let plate = Boundary::fixed(
            vec3(&plate_geom.center),
            half,
            plate_mat,
            materials.material(plate_mat),
        )
        .with_free_axes([false, false, true])
        .with_load(NVec3::new(0.0, 0.0, -cfg.plate_load));

        let top = bounds.max.z.max(plate.x.z + half.z);
        let mut boundaries = vec![plate];
        boundaries.extend(container(&cfg.container, &bounds, top, &materials)?);

        let state = SimulationState::new(particles, boundaries);

        let parameters = Parameters {
            time_step: cfg.time_step,
            safety_factor: cfg.time_step_safety_factor,
            gravity: vec3(&cfg.gravity),
            damping: cfg.global_damping,
            damping_mode: cfg.damping_mode,
            contact_damping_ratio: cfg.contact_damping_ratio,
            iteration_budget: cfg.iteration_budget,
            sampler_period: cfg.sampler_period,
        };

        Ok(Self {
            engine: Engine::from(&cfg.engine),
            parameters,
            materials,
            state,
            plate: 0,
            deposition: cfg.deposition.as_ref().map(Deposition::from),
            seat_plate: cfg.seat_plate,
        })
    }

    /// Build, deposit and seat the plate
    pub fn prepare(cfg: &ScenarioConfig) -> SimResult<Self> {
        let mut scenario = Self::build_scenario(cfg)?;
        scenario.settle()?;
        Ok(scenario)
    }

    /// Run the configured deposition, then seat the plate if asked to
    pub fn settle(&mut self) -> SimResult<Option<DepositionReport>> {
        let report = match self.deposition {
            Some(deposition) => Some(deposition.run(
                &mut self.state,
                &self.materials,
                &self.parameters,
                &self.engine,
            )?),
            None => None,
        };
        if self.seat_plate {
            seat_plate(&mut self.state, self.plate)?;
        }
        Ok(report)
    }

    pub fn into_simulation(self) -> Simulation {
        Simulation::new(self.state, self.materials, self.parameters, self.engine)
    }
}

/// Floor under the cloud and four walls around it, reaching up to `top`
fn container(
    cfg: &ContainerConfig,
    bounds: &Aabb,
    top: f64,
    materials: &MaterialRegistry,
) -> SimResult<Vec<Boundary>> {
    let t = cfg.thickness;
    if (cfg.floor || cfg.walls) && !(t > 0.0) {
        return Err(SimError::config("container thickness must be > 0"));
    }
    let mat = material_id(materials, cfg.material.as_deref().unwrap_or("plate"))?;
    let rec = materials.material(mat);

    let c = bounds.center();
    let size = bounds.size();
    let mut out = Vec::new();

    if cfg.floor {
        out.push(Boundary::fixed(
            NVec3::new(c.x, c.y, bounds.min.z - 0.5 * t),
            NVec3::new(0.5 * size.x + t, 0.5 * size.y + t, 0.5 * t),
            mat,
            rec,
        ));
    }
    if cfg.walls {
        let bottom = bounds.min.z - t;
        let hz = 0.5 * (top + t - bottom);
        let zc = bottom + hz;
        // x walls cover the corners, y walls fit between them
        for x in [bounds.min.x - 0.5 * t, bounds.max.x + 0.5 * t] {
            out.push(Boundary::fixed(
                NVec3::new(x, c.y, zc),
                NVec3::new(0.5 * t, 0.5 * size.y + t, hz),
                mat,
                rec,
            ));
        }
        for y in [bounds.min.y - 0.5 * t, bounds.max.y + 0.5 * t] {
            out.push(Boundary::fixed(
                NVec3::new(c.x, y, zc),
                NVec3::new(0.5 * size.x, 0.5 * t, hz),
                mat,
                rec,
            ));
        }
    }
    Ok(out)
}
