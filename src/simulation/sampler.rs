//! Periodic settlement sampling
//!
//! The [`Sampler`] reads the loaded boundary's vertical displacement every
//! `period` steps. Settlement is reported positive downwards. Records go into
//! the state's [`Series`] and, optionally, to a [`SeriesSink`] that streams
//! them out while the run is in progress.

use std::io;

use crate::simulation::states::SimulationState;

/// One sampled point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesRecord {
    pub step: u64,
    pub displacement: f64, // settlement, m (positive = downwards)
}

/// Recorded time series, strictly increasing in step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    records: Vec<SeriesRecord>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Returns false, leaving the series untouched, if the
    /// step does not come after the last recorded one.
    pub fn push(&mut self, record: SeriesRecord) -> bool {
        if let Some(last) = self.records.last() {
            if record.step <= last.step {
                return false;
            }
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[SeriesRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&SeriesRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads plate settlement at a fixed step interval
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    pub period: u64,     // steps between samples, > 0
    pub boundary: usize, // index of the loaded boundary
}

impl Sampler {
    pub fn new(period: u64, boundary: usize) -> Self {
        Self { period, boundary }
    }

    /// Vertical settlement of the sampled boundary, positive downwards
    pub fn settlement(&self, state: &SimulationState) -> f64 {
        -state.boundaries[self.boundary].displacement().z
    }

    /// Record for the current step, if it falls on the sampling period
    pub fn sample(&self, state: &SimulationState) -> Option<SeriesRecord> {
        if self.period == 0 || state.step % self.period != 0 {
            return None;
        }
        Some(SeriesRecord {
            step: state.step,
            displacement: self.settlement(state),
        })
    }
}

/// Receives records as they are sampled (file export, live plots, ...)
pub trait SeriesSink {
    fn record(&mut self, record: &SeriesRecord) -> io::Result<()>;

    /// Called once when the run ends, whatever the outcome
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SeriesSink for Vec<SeriesRecord> {
    fn record(&mut self, record: &SeriesRecord) -> io::Result<()> {
        self.push(*record);
        Ok(())
    }
}
