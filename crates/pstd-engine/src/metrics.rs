//! Per-frame performance metrics.
//!
//! [`FrameMetrics`] captures phase timings for a single frame;
//! [`RunSummary`] is what a completed (or cancelled) run returns.

use serde::{Deserialize, Serialize};

/// Timing collected during one frame.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMetrics {
    /// Zero-based frame index.
    pub frame: u64,
    /// Time in derivative phases, summed over sub-stages.
    pub derivative_us: u64,
    /// Time in update phases and pressure summation, summed over sub-stages.
    pub update_us: u64,
    /// Time applying boundary absorption.
    pub absorption_us: u64,
    /// Time sampling receivers and writing the checkpoint.
    pub output_us: u64,
    /// Wall-clock time for the whole frame.
    pub total_us: u64,
}

/// Outcome of a run that did not fail.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Frames fully computed and written.
    pub frames_completed: u64,
    /// `true` if the progress consumer requested a stop.
    pub cancelled: bool,
    /// Metrics of the last completed frame.
    pub last_frame: Option<FrameMetrics>,
    /// Progress reports the sink could not deliver.
    pub dropped_progress: u64,
    /// Wall-clock time of the whole run, in microseconds.
    pub total_us: u64,
}

pub(crate) fn elapsed_us(start: std::time::Instant) -> u64 {
    start.elapsed().as_micros() as u64
}
