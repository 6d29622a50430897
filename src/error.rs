//! Error types for scenario setup and stepping.
//!
//! Configuration problems surface before the first step. Instabilities abort
//! the current run and carry the step at which they were detected together
//! with the body or contact that tripped the detector.

use std::fmt;

use thiserror::Error;

use crate::simulation::collider::ShapePair;
use crate::simulation::states::BodyId;

/// Errors raised by the simulation engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Invalid or incomplete setup (empty assembly, bad radius, unknown material, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested time step is larger than the stability bound.
    #[error("time step {dt:e} s exceeds the stability bound {bound:e} s")]
    TimeStepAboveBound {
        /// Requested time step.
        dt: f64,
        /// Bound computed by the stability controller.
        bound: f64,
    },

    /// Runaway motion or overlap detected while stepping.
    #[error("instability at step {step} (last good step: {}): {cause}", fmt_last_good(.last_good_step))]
    Instability {
        /// Step during which the violation was detected.
        step: u64,
        /// Last step whose pipeline completed cleanly, if any.
        last_good_step: Option<u64>,
        /// What was violated.
        cause: InstabilityCause,
    },

    /// Broad phase produced a pair whose narrow-phase geometry is undefined.
    #[error("degenerate {shape:?} contact between {a} and {b}")]
    DegenerateContact {
        /// First body of the pair.
        a: BodyId,
        /// Second body of the pair.
        b: BodyId,
        /// Shape pair dispatched for the candidate.
        shape: ShapePair,
    },
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }

    /// Instability detected during `step`.
    pub fn instability(step: u64, cause: InstabilityCause) -> Self {
        SimError::Instability {
            step,
            last_good_step: step.checked_sub(1),
            cause,
        }
    }
}

fn fmt_last_good(step: &Option<u64>) -> String {
    match step {
        Some(s) => s.to_string(),
        None => "none".to_string(),
    }
}

/// The violated quantity behind an [`SimError::Instability`].
#[derive(Debug, Clone, PartialEq)]
pub enum InstabilityCause {
    /// A body moved further in one step than the allowed fraction of its size.
    Velocity {
        body: BodyId,
        speed: f64, // m/s
        limit: f64, // m/s
    },
    /// Position or velocity of a body is NaN or infinite.
    NonFinite { body: BodyId },
    /// Two bodies interpenetrate deeper than the allowed fraction of the smaller radius.
    Overlap {
        a: BodyId,
        b: BodyId,
        overlap: f64, // m
        limit: f64,   // m
    },
}

impl fmt::Display for InstabilityCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstabilityCause::Velocity { body, speed, limit } => {
                write!(f, "{body} moves at {speed:e} m/s (limit {limit:e} m/s)")
            }
            InstabilityCause::NonFinite { body } => {
                write!(f, "{body} has a non-finite position or velocity")
            }
            InstabilityCause::Overlap { a, b, overlap, limit } => {
                write!(f, "overlap {overlap:e} m between {a} and {b} (limit {limit:e} m)")
            }
        }
    }
}

/// Result type for engine operations.
pub type SimResult<T> = std::result::Result<T, SimError>;
