//! High-level runtime engine settings
//!
//! Selects sequential or rayon contact evaluation and holds the thresholds
//! the loop uses to declare a run unstable.

use crate::configuration::config::EngineConfig;

#[derive(Debug, Clone)]
pub struct Engine {
    pub parallel: bool, // false = sequential contacts, true = rayon (with the `parallel` feature)
    pub allow_unstable_time_step: bool, // skip the dt <= bound check at start
    pub max_step_displacement_ratio: f64, // speed * dt / body size limit
    pub max_overlap_ratio: f64, // overlap / smaller radius limit
}

impl Default for Engine {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for Engine {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            parallel: cfg.parallel,
            allow_unstable_time_step: cfg.allow_unstable_time_step,
            max_step_displacement_ratio: cfg.max_step_displacement_ratio,
            max_overlap_ratio: cfg.max_overlap_ratio,
        }
    }
}
