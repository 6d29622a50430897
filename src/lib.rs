pub mod error;
pub mod simulation;
pub mod configuration;
pub mod output;
pub mod benchmark;

pub use error::{InstabilityCause, SimError, SimResult};

pub use simulation::states::{BodyId, Boundary, NVec3, Particle, SimulationState};
pub use simulation::material::{Material, MaterialId, MaterialRegistry};
pub use simulation::collider::{Aabb, BodyPair, ContactGeometry, ShapePair, SweepAndPrune};
pub use simulation::contact::{Contact, ContactLaw, ContactMap};
pub use simulation::forces::{BodyForce, BodyForceSet, BoundaryLoads, ForceAccumulator, Gravity};
pub use simulation::integrator::{leapfrog_step, Damping};
pub use simulation::stability::StabilityController;
pub use simulation::sampler::{Sampler, Series, SeriesRecord, SeriesSink};
pub use simulation::driver::{advance, select_time_step, AbortReason, RunState, Simulation, StepSettings, StopHandle};
pub use simulation::engine::Engine;
pub use simulation::params::Parameters;
pub use simulation::packing::{make_cloud, CloudSpec, PackedSphere};
pub use simulation::scenario::Scenario;
pub use simulation::deposition::{seat_plate, unbalanced_force, Deposition, DepositionReport};

pub use configuration::config::{DampingMode, DepositionConfig, EngineConfig, ScenarioConfig};

pub use output::export::{write_series_table, write_settlement_svg, TableWriter};

pub use benchmark::benchmark::{bench_collider, bench_step};
