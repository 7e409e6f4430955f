/// per-frame telemetry read back from the dispatch side
use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::params::SortingMode;

/// one frame's timing read-back.
/// `gpu_time` is the summed shader-clock total across every thread that
/// contributed; the per-thread average divides by `gpu_threads`, floored at 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameTiming {
    pub frame: u64,
    /// the mode the dispatch side says it ran; attribution trusts the
    /// pipeline queue, this field is a cross-check
    pub mode: SortingMode,
    pub gpu_time: u64,
    pub gpu_threads: u64,
    pub cpu_ms: f32,
}

impl FrameTiming {
    /// per-thread gpu average with the divisor floored at 1
    #[inline]
    pub fn gpu_average(&self) -> f64 {
        self.gpu_time as f64 / self.gpu_threads.max(1) as f64
    }

    /// per-thread gpu average, rejecting records no thread contributed to
    pub fn checked_gpu_average(&self) -> Result<f64> {
        if self.gpu_threads == 0 {
            return Err(GridError::DegenerateTiming(format!(
                "frame {} carried no threads",
                self.frame
            )));
        }
        Ok(self.gpu_time as f64 / self.gpu_threads as f64)
    }
}

/// one mode's running totals in the aggregation table
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModeTimingRow {
    pub samples: u64,
    /// sum of per-thread gpu averages
    pub gpu_total: f64,
    pub cpu_total_ms: f64,
}

impl ModeTimingRow {
    /// mean per-thread gpu time, sample count floored at 1
    #[inline]
    pub fn gpu_mean(&self) -> f64 {
        self.gpu_total / self.samples.max(1) as f64
    }

    #[inline]
    pub fn cpu_mean_ms(&self) -> f64 {
        self.cpu_total_ms / self.samples.max(1) as f64
    }
}

/// running per-mode aggregation of observed timings, profiler style.
/// one dense row per mode; untouched modes report a mean of 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModeTimingTable {
    rows: [ModeTimingRow; SortingMode::COUNT],
}

impl ModeTimingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, timing: &FrameTiming) {
        let row = &mut self.rows[timing.mode.id()];
        row.samples += 1;
        row.gpu_total += timing.gpu_average();
        row.cpu_total_ms += timing.cpu_ms as f64;
    }

    #[inline]
    pub fn row(&self, mode: SortingMode) -> &ModeTimingRow {
        &self.rows[mode.id()]
    }

    pub fn rows(&self) -> impl Iterator<Item = (SortingMode, &ModeTimingRow)> {
        SortingMode::ALL.iter().copied().zip(self.rows.iter())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
