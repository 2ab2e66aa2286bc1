//! Execution backends.
//!
//! An [`ExecutionBackend`] acquires its resources in
//! [`start`](ExecutionBackend::start) and hands back a [`BackendSession`]
//! that runs phases until it is dropped. Dropping the session releases
//! everything `start` acquired, on success and on abort alike.
//!
//! Every backend runs the same pure phase functions from
//! [`phase`](crate::phase); they differ only in where that work executes.

mod accelerator;
mod distributed;
mod sequential;
mod shared;

use std::sync::Arc;

use pstd_core::{DerivativeOperator, ResourceError};
use pstd_scene::Scene;

use crate::config::{BackendKind, SolverConfig};
use crate::error::StepError;
use crate::phase::UpdateStep;

pub use accelerator::{AcceleratorBackend, Device, DeviceCounters, HostDevice};
pub use distributed::DistributedBackend;
pub use sequential::SequentialBackend;
pub use shared::SharedMemoryBackend;

/// Runs derivative and update phases over a scene.
pub trait ExecutionBackend: Send {
    /// Which variant this is.
    fn kind(&self) -> BackendKind;

    /// Acquire run-scoped resources. Failure is fatal before any frame.
    fn start(&mut self, scene: &Scene) -> Result<Box<dyn BackendSession + '_>, ResourceError>;
}

/// A backend with its resources held, valid for one run.
pub trait BackendSession {
    /// Compute the derivatives of every updating domain. Returns only
    /// after all domains finished; on failure no domain is modified.
    fn derivative_phase(&mut self, scene: &mut Scene, stage: usize) -> Result<(), StepError>;

    /// Apply the Runge-Kutta update to every non-rigid domain. Same
    /// barrier and all-or-nothing rules as the derivative phase.
    fn update_phase(&mut self, scene: &mut Scene, step: UpdateStep) -> Result<(), StepError>;
}

/// Build the backend `config.backend` names.
///
/// The accelerator variant runs on a [`HostDevice`].
pub fn backend_for(
    config: &SolverConfig,
    operator: Arc<dyn DerivativeOperator>,
) -> Box<dyn ExecutionBackend> {
    match config.backend {
        BackendKind::Sequential => Box::new(SequentialBackend::new(operator)),
        BackendKind::SharedMemory => Box::new(SharedMemoryBackend::new(
            operator,
            config.resolved_pool_size(),
        )),
        BackendKind::Accelerator => Box::new(AcceleratorBackend::new(
            HostDevice::new(operator),
            config.update_placement,
        )),
        BackendKind::Distributed => Box::new(DistributedBackend::new(
            operator,
            config.resolved_worker_count(),
        )),
    }
}
