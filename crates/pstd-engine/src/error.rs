//! Run-level error types.

use std::io;

use pstd_core::{DependencyError, DomainError, Phase, ReceiverId, ResourceError};

use crate::config::ConfigError;

/// Every per-domain failure of one phase, collected at its barrier.
///
/// Failures are ordered by domain id.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error(
    "{phase} phase of stage {stage} failed for {} domain(s): {}",
    .failures.len(),
    first_failure(.failures)
)]
pub struct PhaseError {
    /// The phase that failed.
    pub phase: Phase,
    /// Zero-based sub-stage index.
    pub stage: usize,
    /// One entry per failed domain.
    pub failures: Vec<DomainError>,
}

fn first_failure(failures: &[DomainError]) -> String {
    failures.first().map(ToString::to_string).unwrap_or_default()
}

/// Why a backend phase could not complete.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum StepError {
    /// One or more domains failed.
    #[error(transparent)]
    Phase(#[from] PhaseError),
    /// A worker data exchange violated its dependency contract.
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

/// Terminal failure of [`TimeStepScheduler::run`](crate::TimeStepScheduler::run).
///
/// `frame` fields are zero-based, like checkpoints. The `error` progress
/// report for the same failure numbers it `frame + 1`, like every other
/// progress report.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The backend could not acquire its resources; no frame ran.
    #[error("backend unavailable: {0}")]
    Resource(#[from] ResourceError),
    /// A phase failed and the frame was rolled back.
    #[error("frame {frame} aborted: {source}")]
    Phase {
        /// Zero-based frame index.
        frame: u64,
        /// The collected failures.
        #[source]
        source: PhaseError,
    },
    /// A worker data exchange failed and the frame was rolled back.
    #[error("frame {frame} aborted: {source}")]
    Dependency {
        /// Zero-based frame index.
        frame: u64,
        /// The contract violation.
        #[source]
        source: DependencyError,
    },
    /// Writing a receiver sample failed.
    #[error("receiver {receiver} output failed: {source}")]
    ReceiverSink {
        /// The receiver whose sample was lost.
        receiver: ReceiverId,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },
    /// Writing a checkpoint failed.
    #[error("checkpoint of frame {frame} failed: {source}")]
    Checkpoint {
        /// Zero-based frame index.
        frame: u64,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },
}

impl RunError {
    pub(crate) fn from_step(frame: u64, err: StepError) -> Self {
        match err {
            StepError::Phase(source) => Self::Phase { frame, source },
            StepError::Dependency(source) => Self::Dependency { frame, source },
        }
    }
}
