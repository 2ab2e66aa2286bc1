//! Time-step scheduler and execution backends for PSTD simulations.
//!
//! [`TimeStepScheduler`] drives a [`Scene`](pstd_scene::Scene) through
//! `frame_count` frames of six-stage low-storage Runge-Kutta integration.
//! Each sub-stage runs a derivative phase and an update phase on an
//! [`ExecutionBackend`], separated by barriers. Backends differ only in
//! where the per-domain work runs: in order on the calling thread, on a
//! fixed thread pool, through an accelerator [`Device`], or across
//! distributed [`Worker`]s.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod distribute;
pub mod error;
pub mod metrics;
pub mod phase;
pub mod progress;
pub mod scheduler;
pub mod sinks;

pub use backend::{
    backend_for, AcceleratorBackend, BackendSession, Device, DeviceCounters, DistributedBackend,
    ExecutionBackend, HostDevice, SequentialBackend, SharedMemoryBackend,
};
pub use config::{
    BackendKind, ConfigError, RkCoefficients, SolverConfig, UpdatePlacement, STAGE_COUNT,
};
pub use distribute::{distribute, Worker};
pub use error::{PhaseError, RunError, StepError};
pub use metrics::{FrameMetrics, RunSummary};
pub use phase::{UpdateStep, UpdatedFields};
pub use progress::{
    ChannelProgress, ProgressControl, ProgressReport, ProgressSink, ProgressStatus, StopHandle,
};
pub use scheduler::{run, StageEvent, TimeStepScheduler};
pub use sinks::{
    CheckpointLog, CheckpointSink, FileReceiverSink, MemoryReceiverSink, NoCheckpoints,
    PressureFrameWriter, ReceiverSink,
};
