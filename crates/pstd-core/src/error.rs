//! Error types for the PSTD engine.
//!
//! Organized by the failure taxonomy the scheduler acts on: per-domain
//! computation failures ([`DomainError`]), worker data-exchange contract
//! violations ([`DependencyError`]), and backend resource acquisition
//! failures ([`ResourceError`]). [`OperatorError`] is what an external
//! derivative operator reports; backends wrap it into a [`DomainError`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::field::{FieldName, Shape};
use crate::id::{DomainId, WorkerId};

/// The step of a sub-stage a failure occurred in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Spatial derivative computation.
    Derivative,
    /// Low-storage Runge-Kutta state update.
    Update,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Derivative => write!(f, "derivative"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// Failure reported by a derivative operator.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{reason}")]
pub struct OperatorError {
    /// Human-readable description of the failure.
    pub reason: String,
}

impl OperatorError {
    /// Create an operator error from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A single domain's derivative or update step failed.
#[derive(Clone, Debug, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum DomainError {
    /// The derivative operator (or the update) returned an error.
    #[error("domain {domain}: {phase} failed: {reason}")]
    ComputationFailed {
        /// The failing domain.
        domain: DomainId,
        /// The phase that failed.
        phase: Phase,
        /// The underlying reason.
        reason: String,
    },
    /// A NaN or infinity appeared in a freshly updated array.
    #[error("domain {domain}: non-finite value in {field} at cell {index}")]
    NonFinite {
        /// The failing domain.
        domain: DomainId,
        /// The array holding the value.
        field: FieldName,
        /// Flat cell index of the first offending value.
        index: usize,
    },
    /// An operator returned an array of the wrong length.
    #[error("domain {domain}: expected {expected} cells ({shape}), got {actual}")]
    ShapeMismatch {
        /// The failing domain.
        domain: DomainId,
        /// The domain's shape.
        shape: Shape,
        /// Expected number of cells.
        expected: usize,
        /// Number of cells returned.
        actual: usize,
    },
    /// The computation panicked inside a worker.
    #[error("domain {domain}: {phase} panicked: {message}")]
    Panicked {
        /// The failing domain.
        domain: DomainId,
        /// The phase that panicked.
        phase: Phase,
        /// The panic payload, if it was a string.
        message: String,
    },
    /// The worker executing this domain's task disappeared before replying.
    #[error("domain {domain}: worker lost during {phase}")]
    WorkerLost {
        /// The domain whose result never arrived.
        domain: DomainId,
        /// The phase that was in flight.
        phase: Phase,
    },
}

impl DomainError {
    /// The domain this failure belongs to.
    pub fn domain(&self) -> DomainId {
        match self {
            Self::ComputationFailed { domain, .. }
            | Self::NonFinite { domain, .. }
            | Self::ShapeMismatch { domain, .. }
            | Self::Panicked { domain, .. }
            | Self::WorkerLost { domain, .. } => *domain,
        }
    }
}

/// A worker received a numerical-data exchange whose key set does not
/// equal its declared dependency set.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    /// Entries were missing, unexpected, or both.
    #[error("worker {worker}: dependency mismatch (missing {missing:?}, extra {unexpected:?})")]
    Mismatch {
        /// The worker that rejected the exchange.
        worker: WorkerId,
        /// Declared dependencies absent from the exchange.
        missing: Vec<DomainId>,
        /// Supplied entries that are not declared dependencies.
        unexpected: Vec<DomainId>,
    },
    /// The worker could not be reached to deliver or fetch data.
    #[error("worker {worker}: disconnected during data exchange")]
    Disconnected {
        /// The unreachable worker.
        worker: WorkerId,
    },
}

/// A backend could not acquire the resources it needs to run.
///
/// Always fatal before the first frame executes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// A thread of the shared-memory worker pool could not be spawned.
    #[error("worker pool spawn failed: {reason}")]
    PoolSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
    /// No accelerator device (or context) is available.
    #[error("accelerator device unavailable: {reason}")]
    DeviceUnavailable {
        /// Description of the failure.
        reason: String,
    },
    /// The device execution stream could not be created.
    #[error("accelerator stream unavailable: {reason}")]
    StreamUnavailable {
        /// Description of the failure.
        reason: String,
    },
    /// The device-resident transform plan could not be built.
    #[error("transform plan failed: {reason}")]
    PlanFailed {
        /// Description of the failure.
        reason: String,
    },
    /// A distributed worker thread could not be spawned.
    #[error("distributed worker spawn failed: {reason}")]
    WorkerSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}
