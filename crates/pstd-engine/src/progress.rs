//! Run progress reporting and cooperative cancellation.
//!
//! The scheduler reports a [`ProgressReport`] before the first frame, at
//! the start of every frame, and once when the run ends. A sink answers
//! each report with a [`ProgressControl`]; answering
//! [`Stop`](ProgressControl::Stop) to a frame report cancels the run before
//! that frame computes anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// Lifecycle state carried by a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Resources acquired, about to run the first frame.
    Starting,
    /// A frame is about to be computed.
    Running,
    /// Every frame completed.
    Finished,
    /// The consumer requested a stop.
    Cancelled,
    /// The run failed; no further reports follow.
    Error,
}

/// One progress record: `{status, message, frame}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Lifecycle state.
    pub status: ProgressStatus,
    /// Human-readable description.
    pub message: String,
    /// One-based frame index, where the report concerns a frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,
}

impl ProgressReport {
    /// The run is about to start.
    pub fn starting(frame_count: u64) -> Self {
        Self {
            status: ProgressStatus::Starting,
            message: format!("Starting calculation of {frame_count} frames"),
            frame: None,
        }
    }

    /// Frame `frame` (one-based) is about to be computed.
    pub fn running(frame: u64) -> Self {
        Self {
            status: ProgressStatus::Running,
            message: format!("Calculation frame:{frame}"),
            frame: Some(frame),
        }
    }

    /// The run completed `frames` frames.
    pub fn finished(frames: u64) -> Self {
        Self {
            status: ProgressStatus::Finished,
            message: format!("Finished after {frames} frames"),
            frame: Some(frames),
        }
    }

    /// The run stopped before frame `frame` (one-based).
    pub fn cancelled(frame: u64) -> Self {
        Self {
            status: ProgressStatus::Cancelled,
            message: format!("Cancelled before frame {frame}"),
            frame: Some(frame),
        }
    }

    /// The run failed; `frame` is one-based where known.
    pub fn error(frame: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Error,
            message: message.into(),
            frame,
        }
    }

    /// Returns `true` for reports after which no others follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ProgressStatus::Finished | ProgressStatus::Cancelled | ProgressStatus::Error
        )
    }
}

/// A sink's answer to a report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProgressControl {
    /// Keep going.
    #[default]
    Continue,
    /// Cancel before the next frame.
    Stop,
}

/// Receives progress reports. Must not block for long: it runs on the
/// scheduler's thread between frames.
pub trait ProgressSink {
    /// Handle one report.
    fn report(&mut self, report: &ProgressReport) -> ProgressControl;

    /// Reports that could not be delivered so far.
    fn dropped(&self) -> u64 {
        0
    }
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressReport) -> ProgressControl,
{
    fn report(&mut self, report: &ProgressReport) -> ProgressControl {
        self(report)
    }
}

/// Requests cancellation of a run fed by a [`ChannelProgress`].
#[derive(Clone, Debug)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
}

impl StopHandle {
    /// Ask the run to stop at the next frame boundary.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Forwards reports over a bounded channel without blocking.
///
/// When the channel is full the report is dropped and counted. A
/// disconnected receiver is treated the same way.
pub struct ChannelProgress {
    tx: Sender<ProgressReport>,
    stop: Arc<AtomicBool>,
    dropped: u64,
}

impl ChannelProgress {
    /// Create a sink with room for `capacity` undelivered reports.
    pub fn bounded(capacity: usize) -> (Self, Receiver<ProgressReport>, StopHandle) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let sink = Self {
            tx,
            stop: Arc::clone(&stop),
            dropped: 0,
        };
        (sink, rx, StopHandle { stop })
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&mut self, report: &ProgressReport) -> ProgressControl {
        match self.tx.try_send(report.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                tracing::warn!(
                    status = ?report.status,
                    frame = ?report.frame,
                    "progress channel full, report dropped"
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                tracing::debug!(status = ?report.status, "progress receiver gone");
            }
        }
        if self.stop.load(Ordering::Acquire) {
            ProgressControl::Stop
        } else {
            ProgressControl::Continue
        }
    }

    fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_report_matches_wire_format() {
        let json = serde_json::to_value(ProgressReport::running(3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "running", "message": "Calculation frame:3", "frame": 3})
        );
        let starting = serde_json::to_value(ProgressReport::starting(10)).unwrap();
        assert!(starting.get("frame").is_none());
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        let mut sink = |r: &ProgressReport| {
            seen.push(r.frame);
            ProgressControl::Continue
        };
        assert_eq!(sink.report(&ProgressReport::running(1)), ProgressControl::Continue);
        assert_eq!(ProgressSink::dropped(&sink), 0);
        drop(sink);
        assert_eq!(seen, vec![Some(1)]);
    }

    #[test]
    fn full_channel_drops_without_blocking() {
        let (mut sink, rx, _stop) = ChannelProgress::bounded(1);
        sink.report(&ProgressReport::running(1));
        sink.report(&ProgressReport::running(2));
        assert_eq!(sink.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap().frame, Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stop_handle_cancels_through_report() {
        let (mut sink, _rx, stop) = ChannelProgress::bounded(8);
        assert_eq!(sink.report(&ProgressReport::running(1)), ProgressControl::Continue);
        stop.stop();
        assert!(stop.is_stopped());
        assert_eq!(sink.report(&ProgressReport::running(2)), ProgressControl::Stop);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ProgressReport::running(1).is_terminal());
        assert!(ProgressReport::finished(4).is_terminal());
        assert!(ProgressReport::error(None, "boom").is_terminal());
    }
}
