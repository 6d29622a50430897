//! The simulation loop.
//!
//! [`Simulation`] owns the [`SimulationState`] and runs the fixed per-step
//! pipeline:
//!
//! 1. reset forces
//! 2. broad phase
//! 3. contact resolution
//! 4. gravity and boundary loads
//! 5. integration, then the runaway-motion check
//! 6. sampling
//! 7. step counter increment
//!
//! Lifecycle: `Uninitialized -> Running -> Completed | Aborted`. A stop
//! request is honoured once per step, after sampling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::error::{InstabilityCause, SimError, SimResult};
use crate::simulation::collider::broad_phase;
use crate::simulation::contact::{resolve_contacts, ContactLaw};
use crate::simulation::engine::Engine;
use crate::simulation::forces::{BodyForceSet, ForceAccumulator};
use crate::simulation::integrator::{leapfrog_step, Damping};
use crate::simulation::material::MaterialRegistry;
use crate::simulation::params::Parameters;
use crate::simulation::sampler::{Sampler, Series, SeriesRecord, SeriesSink};
use crate::simulation::stability::StabilityController;
use crate::simulation::states::{BodyId, NVec3, SimulationState};

/// Cooperative cancellation flag, cheap to clone and share across threads
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop after the current step
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    StopRequested,
    Instability,
    DegenerateContact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    Running,
    Completed,
    Aborted(AbortReason),
}

/// Settings one pipeline step needs besides the state itself
#[derive(Debug, Clone, Copy)]
pub struct StepSettings {
    pub law: ContactLaw,
    pub damping: Damping,
    pub parallel: bool,
    pub max_step_displacement_ratio: f64,
}

impl StepSettings {
    pub fn new(params: &Parameters, engine: &Engine) -> Self {
        Self {
            law: ContactLaw {
                damping_ratio: params.contact_damping_ratio,
                max_overlap_ratio: engine.max_overlap_ratio,
            },
            damping: Damping {
                mode: params.damping_mode,
                coefficient: params.damping,
            },
            parallel: engine.parallel,
            max_step_displacement_ratio: engine.max_step_displacement_ratio,
        }
    }
}

/// Steps 1-5 of the pipeline: forces, contacts, integration and the motion
/// check. Does not sample and does not touch the step counter.
pub fn advance(
    state: &mut SimulationState,
    materials: &MaterialRegistry,
    body_forces: &BodyForceSet,
    forces: &mut ForceAccumulator,
    settings: &StepSettings,
) -> SimResult<()> {
    forces.reset();
    let pairs = broad_phase(state);
    resolve_contacts(state, materials, &settings.law, &pairs, forces, settings.parallel)?;
    body_forces.apply_all(state, forces);
    leapfrog_step(state, forces, &settings.damping);
    check_motion(state, settings.max_step_displacement_ratio)
}

fn finite(v: &NVec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Fail on non-finite state or on a body travelling more than `ratio` of its
/// size in one step
pub fn check_motion(state: &SimulationState, ratio: f64) -> SimResult<()> {
    let dt = state.dt;
    let check = |body: BodyId, speed: f64, size: f64| -> SimResult<()> {
        let limit = ratio * size / dt;
        if speed > limit {
            return Err(SimError::instability(
                state.step,
                InstabilityCause::Velocity { body, speed, limit },
            ));
        }
        Ok(())
    };

    for (i, p) in state.particles.iter().enumerate() {
        let body = BodyId::Particle(i);
        if !(finite(&p.x) && finite(&p.v) && finite(&p.w)) {
            return Err(SimError::instability(state.step, InstabilityCause::NonFinite { body }));
        }
        check(body, p.v.norm(), p.radius)?;
    }
    for (i, b) in state.boundaries.iter().enumerate() {
        let body = BodyId::Boundary(i);
        if !(finite(&b.x) && finite(&b.v)) {
            return Err(SimError::instability(state.step, InstabilityCause::NonFinite { body }));
        }
        check(body, b.v.norm(), b.min_half_extent())?;
    }
    Ok(())
}

/// Time step for a run on `state` and the stability bound it was checked
/// against: the configured step if any, otherwise the bound itself
pub fn select_time_step(
    state: &SimulationState,
    materials: &MaterialRegistry,
    params: &Parameters,
    engine: &Engine,
) -> SimResult<(f64, f64)> {
    let stability = StabilityController::new(params.safety_factor)?;
    let bound = stability
        .bound(&state.particles, materials)
        .ok_or_else(|| SimError::config("particle assembly is empty"))?;
    let dt = params.time_step.unwrap_or(bound);
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(SimError::config(format!("time step must be positive, got {dt}")));
    }
    if engine.allow_unstable_time_step {
        if dt > bound {
            warn!("time step {dt:e} s exceeds the stability bound {bound:e} s, running anyway");
        }
    } else {
        stability.check(dt, bound)?;
    }
    Ok((dt, bound))
}

pub struct Simulation {
    state: SimulationState,
    materials: MaterialRegistry,
    params: Parameters,
    engine: Engine,
    body_forces: BodyForceSet,
    forces: ForceAccumulator,
    sampler: Option<Sampler>,
    bound: Option<f64>,
    run_state: RunState,
    stop: StopHandle,
    sink: Option<Box<dyn SeriesSink + Send>>,
    sink_failed: bool,
}

impl Simulation {
    pub fn new(
        state: SimulationState,
        materials: MaterialRegistry,
        params: Parameters,
        engine: Engine,
    ) -> Self {
        let body_forces = BodyForceSet::standard(params.gravity);
        let forces = ForceAccumulator::for_state(&state);
        Self {
            state,
            materials,
            params,
            engine,
            body_forces,
            forces,
            sampler: None,
            bound: None,
            run_state: RunState::Uninitialized,
            stop: StopHandle::new(),
            sink: None,
            sink_failed: false,
        }
    }

    /// Stream every sampled record to `sink` as well as into the series
    pub fn with_sink(mut self, sink: impl SeriesSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn series(&self) -> &Series {
        &self.state.series
    }

    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Time step in use, 0 before `start`
    pub fn time_step(&self) -> f64 {
        self.state.dt
    }

    /// Stability bound computed at `start`
    pub fn stability_bound(&self) -> Option<f64> {
        self.bound
    }

    fn validate(&self) -> SimResult<usize> {
        let state = &self.state;
        if state.particles.is_empty() {
            return Err(SimError::config("particle assembly is empty"));
        }
        for (i, p) in state.particles.iter().enumerate() {
            if self.materials.get(p.material).is_none() {
                return Err(SimError::config(format!(
                    "particle #{i} references unknown material {}",
                    p.material
                )));
            }
            if !(p.radius > 0.0 && p.radius.is_finite()) {
                return Err(SimError::config(format!(
                    "particle #{i} has non-positive radius {}",
                    p.radius
                )));
            }
            if !(p.m > 0.0 && p.m.is_finite() && p.inertia > 0.0) {
                return Err(SimError::config(format!(
                    "particle #{i} has non-positive mass {}",
                    p.m
                )));
            }
        }
        for (i, b) in state.boundaries.iter().enumerate() {
            if self.materials.get(b.material).is_none() {
                return Err(SimError::config(format!(
                    "boundary #{i} references unknown material {}",
                    b.material
                )));
            }
            if !(b.min_half_extent() > 0.0 && b.m > 0.0 && b.m.is_finite()) {
                return Err(SimError::config(format!(
                    "boundary #{i} has an empty extent or non-positive mass"
                )));
            }
        }
        for (id, m) in self.materials.iter() {
            m.validate().map_err(|e| {
                SimError::config(format!("material {id}: {e}"))
            })?;
        }
        if !(0.0..1.0).contains(&self.params.damping) {
            return Err(SimError::config(format!(
                "global damping must be in [0, 1), got {}",
                self.params.damping
            )));
        }
        if self.params.contact_damping_ratio < 0.0 {
            return Err(SimError::config("contact damping ratio must be >= 0"));
        }
        if self.params.sampler_period == 0 {
            return Err(SimError::config("sampler period must be > 0"));
        }
        state
            .loaded_boundary()
            .ok_or_else(|| SimError::config("no boundary carries an applied load"))
    }

    /// Validate the setup, pick the time step and enter `Running`
    pub fn start(&mut self) -> SimResult<()> {
        if self.run_state != RunState::Uninitialized {
            return Err(SimError::config(format!(
                "cannot start a simulation in state {:?}",
                self.run_state
            )));
        }
        let plate = self.validate()?;
        let (dt, bound) = select_time_step(&self.state, &self.materials, &self.params, &self.engine)?;
        if self.engine.parallel && !cfg!(feature = "parallel") {
            warn!("parallel contacts requested but the `parallel` feature is off, running sequentially");
        }

        self.state.dt = dt;
        self.bound = Some(bound);
        self.forces = ForceAccumulator::for_state(&self.state);
        self.sampler = Some(Sampler::new(self.params.sampler_period, plate));
        self.run_state = RunState::Running;

        info!(
            "starting run: {} particles, {} boundaries, dt = {dt:e} s (bound {bound:e} s), budget {} steps",
            self.state.particles.len(),
            self.state.boundaries.len(),
            self.params.iteration_budget,
        );
        Ok(())
    }

    /// One full pipeline step. An error aborts the run.
    pub fn step(&mut self) -> SimResult<()> {
        if self.run_state != RunState::Running {
            return Err(SimError::config(format!(
                "cannot step a simulation in state {:?}",
                self.run_state
            )));
        }

        let settings = StepSettings::new(&self.params, &self.engine);
        if let Err(e) = advance(
            &mut self.state,
            &self.materials,
            &self.body_forces,
            &mut self.forces,
            &settings,
        ) {
            let reason = match e {
                SimError::DegenerateContact { .. } => AbortReason::DegenerateContact,
                _ => AbortReason::Instability,
            };
            self.run_state = RunState::Aborted(reason);
            error!("run aborted: {e}");
            self.finish_sink();
            return Err(e);
        }

        if let Some(record) = self.sampler.and_then(|s| s.sample(&self.state)) {
            let pushed = self.state.series.push(record);
            debug_assert!(pushed, "sample at step {} does not follow the series", record.step);
            debug!(
                "step {}: settlement {:.6e} m, {} contacts",
                record.step,
                record.displacement,
                self.state.contacts.len()
            );
            self.emit(&record);
        }

        self.state.step += 1;
        Ok(())
    }

    /// Run until the iteration budget is exhausted or a stop is requested
    pub fn run(&mut self) -> SimResult<RunState> {
        if self.run_state == RunState::Uninitialized {
            self.start()?;
        }
        if self.run_state != RunState::Running {
            return Ok(self.run_state);
        }

        while self.state.step < self.params.iteration_budget {
            self.step()?;
            if self.stop.is_stopped() {
                self.run_state = RunState::Aborted(AbortReason::StopRequested);
                info!("stop requested, run aborted after step {}", self.state.step);
                self.finish_sink();
                return Ok(self.run_state);
            }
        }

        self.run_state = RunState::Completed;
        info!(
            "run completed: {} steps, t = {:.4} s, {} samples",
            self.state.step,
            self.state.t,
            self.state.series.len()
        );
        self.finish_sink();
        Ok(self.run_state)
    }

    fn emit(&mut self, record: &SeriesRecord) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.record(record) {
                if !self.sink_failed {
                    warn!("series export failed at step {}: {e}; continuing run", record.step);
                    self.sink_failed = true;
                }
            }
        }
    }

    fn finish_sink(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.finish() {
                if !self.sink_failed {
                    warn!("series export failed on finish: {e}");
                    self.sink_failed = true;
                }
            }
        }
    }
}
