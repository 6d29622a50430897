//! Configuration types for loading plate load scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scenario. Keys are camelCase:
//!
//! - [`ScenarioConfig`]  – top-level scenario (cloud, plate, loop options)
//! - [`CloudBounds`]     – axis-aligned box the packing is generated in
//! - [`PlateConfig`]     – plate centre and half-extents
//! - [`ContainerConfig`] – floor and side walls around the packing
//! - [`MaterialConfig`]  – extra material records
//! - [`EngineConfig`]    – engine switches and instability thresholds
//! - [`DepositionConfig`] – gravity deposition run before the plate is loaded
//!
//! # YAML format
//! The granular plate load test:
//!
//! ```yaml
//! particleCloudBounds:
//!   min: [0.0, 0.0, 0.0]
//!   max: [1.0, 1.0, 0.5]
//! particleRadiusMean: 0.02
//! particleRadiusFuzz: 0.3
//! particleCount: 5000
//! soilMaterial: granular     # or "clayey", or a name from `materials`
//! plateGeometry:
//!   center: [0.5, 0.5, 0.55]
//!   extents: [0.2, 0.2, 0.01]  # half-sizes
//! plateLoad: 1.0e4           # downward force, N
//! gravity: [0.0, 0.0, -9.81]
//! globalDamping: 0.4
//! timeStepSafetyFactor: 0.5
//! iterationBudget: 5000
//! samplerPeriod: 100
//! deposition:
//!   maxSteps: 10000
//!   unbalancedForce: 0.01
//! ```
//!
//! The scenario builder maps this into the runtime state, parameters and
//! engine settings.

use serde::Deserialize;

fn default_gravity() -> [f64; 3] {
    [0.0, 0.0, -9.81]
}

fn default_safety_factor() -> f64 {
    0.5
}

fn default_sampler_period() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_thickness() -> f64 {
    0.05
}

fn default_ratio() -> f64 {
    0.5
}

fn default_unbalanced_force() -> f64 {
    0.01
}

fn default_deposition_damping() -> f64 {
    0.4
}

/// How the global damping coefficient acts on the integrator
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DampingMode {
    #[default]
    #[serde(rename = "velocity")] // velocities scaled by (1 - d) every step
    Velocity,

    #[serde(rename = "cundall")] // non-viscous local damping, each force component scaled by 1 - d sign(F v)
    Cundall,
}

/// Box the particle cloud is generated in
#[derive(Deserialize, Debug, Clone)]
pub struct CloudBounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// Plate centre and half-extents
#[derive(Deserialize, Debug, Clone)]
pub struct PlateConfig {
    pub center: [f64; 3],
    pub extents: [f64; 3], // half-sizes along x, y, z
    pub material: Option<String>, // defaults to "plate"
}

/// Rigid container closing the packing
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    #[serde(default = "default_true")]
    pub floor: bool,
    #[serde(default = "default_true")]
    pub walls: bool,
    #[serde(default = "default_thickness")]
    pub thickness: f64,
    pub material: Option<String>, // defaults to the plate material
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            floor: true,
            walls: true,
            thickness: default_thickness(),
            material: None,
        }
    }
}

/// An extra material record, friction angle in degrees
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MaterialConfig {
    pub name: String,
    pub young: f64,
    pub poisson: f64,
    pub friction_angle_deg: f64,
    pub density: f64,
}

/// Engine switches and instability thresholds
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub parallel: bool, // evaluate contacts on rayon, needs the `parallel` feature
    #[serde(default)]
    pub allow_unstable_time_step: bool, // run even if dt exceeds the stability bound
    #[serde(default = "default_ratio")]
    pub max_step_displacement_ratio: f64, // per-step travel limit as a fraction of body size
    #[serde(default = "default_ratio")]
    pub max_overlap_ratio: f64, // overlap limit as a fraction of the smaller radius
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            allow_unstable_time_step: false,
            max_step_displacement_ratio: default_ratio(),
            max_overlap_ratio: default_ratio(),
        }
    }
}

/// Gravity deposition of the cloud, run with Cundall damping and the plate
/// held in place. Ends once the unbalanced force ratio drops below
/// `unbalanced_force` or after `max_steps`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DepositionConfig {
    pub max_steps: u64,
    #[serde(default = "default_unbalanced_force")]
    pub unbalanced_force: f64, // mean particle force over mean contact force
    #[serde(default = "default_deposition_damping")]
    pub damping: f64,
}

impl DepositionConfig {
    pub fn with_max_steps(max_steps: u64) -> Self {
        Self {
            max_steps,
            unbalanced_force: default_unbalanced_force(),
            damping: default_deposition_damping(),
        }
    }
}

/// Top-level scenario configuration loaded from YAML
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    pub particle_cloud_bounds: CloudBounds,
    pub particle_radius_mean: f64,
    pub particle_radius_fuzz: f64, // relative, radii drawn in mean * (1 +- fuzz)
    pub particle_count: usize,
    pub soil_material: String,
    pub plate_geometry: PlateConfig,
    pub plate_load: f64, // downward force magnitude, N
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 3],
    pub global_damping: f64,
    #[serde(default = "default_safety_factor")]
    pub time_step_safety_factor: f64,
    pub iteration_budget: u64,
    #[serde(default = "default_sampler_period")]
    pub sampler_period: u64,

    pub time_step: Option<f64>, // explicit dt, defaults to the stability bound
    #[serde(default)]
    pub seed: u64, // packing RNG seed
    #[serde(default)]
    pub damping_mode: DampingMode,
    #[serde(default)]
    pub contact_damping_ratio: f64,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub materials: Vec<MaterialConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
    pub deposition: Option<DepositionConfig>, // none = load the cloud as generated
    #[serde(default = "default_true")]
    pub seat_plate: bool, // lower the plate onto the packing before loading
}

impl ScenarioConfig {
    /// The granular plate load test: 5000 spheres in a 1 x 1 x 0.5 m box
    /// under a 1e4 N plate, 5000 steps at half the P-wave time step
    pub fn bearing_granular() -> Self {
        Self {
            particle_cloud_bounds: CloudBounds {
                min: [0.0, 0.0, 0.0],
                max: [1.0, 1.0, 0.5],
            },
            particle_radius_mean: 0.02,
            particle_radius_fuzz: 0.3,
            particle_count: 5000,
            soil_material: "granular".to_string(),
            plate_geometry: PlateConfig {
                center: [0.5, 0.5, 0.55],
                extents: [0.2, 0.2, 0.01],
                material: None,
            },
            plate_load: 1e4,
            gravity: default_gravity(),
            global_damping: 0.4,
            time_step_safety_factor: default_safety_factor(),
            iteration_budget: 5000,
            sampler_period: default_sampler_period(),
            time_step: None,
            seed: 0,
            damping_mode: DampingMode::Velocity,
            contact_damping_ratio: 0.0,
            container: ContainerConfig::default(),
            materials: Vec::new(),
            engine: EngineConfig::default(),
            deposition: Some(DepositionConfig::with_max_steps(10_000)),
            seat_plate: true,
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}
