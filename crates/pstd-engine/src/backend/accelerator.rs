//! Accelerator offload through a run-scoped device context.
//!
//! The backend acquires a context, an execution stream, and a transform
//! plan once in [`start`](ExecutionBackend::start). The session releases
//! them when dropped, so an aborted run gives them back exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pstd_core::{
    DerivativeInput, DerivativeOperator, DomainError, OperatorError, Phase, ResourceError,
};
use pstd_scene::Scene;

use super::{BackendSession, ExecutionBackend};
use crate::config::{BackendKind, UpdatePlacement};
use crate::error::{PhaseError, StepError};
use crate::phase::{
    apply_derivatives, apply_updates, collect_phase, compute_update, derivative_task, derive_each,
    UpdateStep, UpdateView, UpdatedFields,
};

/// An accelerator the backend can drive.
///
/// Acquisition methods are called in order (context, stream, plan) and
/// [`release`](Device::release) must undo whatever subset succeeded.
pub trait Device: Send {
    /// Device name for logs and error messages.
    fn name(&self) -> &str;

    /// Create the device context.
    fn acquire_context(&mut self) -> Result<(), ResourceError>;

    /// Create the execution stream.
    fn acquire_stream(&mut self) -> Result<(), ResourceError>;

    /// Build the device-resident transform plan for arrays up to
    /// `size` cells along either axis.
    fn build_plan(&mut self, size: usize) -> Result<(), ResourceError>;

    /// Compute one derivative pass on the device.
    fn derive(&mut self, input: &DerivativeInput) -> Result<Vec<f64>, OperatorError>;

    /// Apply the update formulas on the device.
    fn update(&mut self, view: &UpdateView<'_>) -> Result<UpdatedFields, DomainError> {
        compute_update(view)
    }

    /// Wait for queued work to finish.
    fn synchronize(&mut self) -> Result<(), OperatorError> {
        Ok(())
    }

    /// Release plan, stream, and context, whichever are held.
    fn release(&mut self);
}

/// Runs phases through a [`Device`].
pub struct AcceleratorBackend<D> {
    device: D,
    placement: UpdatePlacement,
}

impl<D: Device> AcceleratorBackend<D> {
    /// Backend driving `device`, applying updates per `placement`.
    pub fn new(device: D, placement: UpdatePlacement) -> Self {
        Self { device, placement }
    }

    /// The driven device.
    pub fn device(&self) -> &D {
        &self.device
    }
}

/// Plan size covering the largest non-rigid extent, rounded up to a
/// power of two.
fn plan_size(scene: &Scene) -> usize {
    scene
        .domains()
        .iter()
        .filter(|d| !d.is_rigid())
        .map(|d| d.shape().rows.max(d.shape().cols))
        .max()
        .unwrap_or(1)
        .next_power_of_two()
}

impl<D: Device> ExecutionBackend for AcceleratorBackend<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerator
    }

    fn start(&mut self, scene: &Scene) -> Result<Box<dyn BackendSession + '_>, ResourceError> {
        let size = plan_size(scene);
        let device = &mut self.device;
        let acquired = device
            .acquire_context()
            .and_then(|()| device.acquire_stream())
            .and_then(|()| device.build_plan(size));
        if let Err(e) = acquired {
            tracing::error!(device = device.name(), error = %e, "accelerator acquisition failed");
            device.release();
            return Err(e);
        }
        tracing::debug!(device = device.name(), plan = size, "accelerator context acquired");
        Ok(Box::new(AcceleratorSession {
            device,
            placement: self.placement,
        }))
    }
}

struct AcceleratorSession<'a, D: Device> {
    device: &'a mut D,
    placement: UpdatePlacement,
}

impl<D: Device> AcceleratorSession<'_, D> {
    /// Wait for the device; a failed sync fails every domain of the phase.
    fn barrier(
        &mut self,
        phase: Phase,
        stage: usize,
        domains: &[pstd_core::DomainId],
    ) -> Result<(), PhaseError> {
        self.device.synchronize().map_err(|e| PhaseError {
            phase,
            stage,
            failures: domains
                .iter()
                .map(|&domain| DomainError::ComputationFailed {
                    domain,
                    phase,
                    reason: format!("device synchronize: {e}"),
                })
                .collect(),
        })
    }
}

impl<D: Device> BackendSession for AcceleratorSession<'_, D> {
    fn derivative_phase(&mut self, scene: &mut Scene, stage: usize) -> Result<(), StepError> {
        let spacing = scene.grid_spacing();
        let name = self.device.name().to_string();
        let tasks: Vec<_> = scene
            .domains()
            .iter()
            .filter_map(|d| derivative_task(d, spacing, &*scene))
            .collect();
        let domains: Vec<_> = tasks.iter().map(|t| t.domain).collect();
        let results: Vec<_> = tasks
            .iter()
            .map(|task| derive_each(task, &name, |input| self.device.derive(input)))
            .collect();
        let results = collect_phase(Phase::Derivative, stage, results)?;
        self.barrier(Phase::Derivative, stage, &domains)?;
        apply_derivatives(scene, results);
        Ok(())
    }

    fn update_phase(&mut self, scene: &mut Scene, step: UpdateStep) -> Result<(), StepError> {
        let placement = self.placement;
        let mut domains = Vec::new();
        let mut results = Vec::new();
        for view in scene.domains().iter().filter_map(|d| UpdateView::of(d, step)) {
            domains.push(view.domain);
            results.push(match placement {
                UpdatePlacement::Device => self.device.update(&view),
                UpdatePlacement::Host => compute_update(&view),
            });
        }
        let results = collect_phase(Phase::Update, step.stage, results)?;
        if placement == UpdatePlacement::Device {
            self.barrier(Phase::Update, step.stage, &domains)?;
        }
        apply_updates(scene, results);
        Ok(())
    }
}

impl<D: Device> Drop for AcceleratorSession<'_, D> {
    fn drop(&mut self) {
        self.device.release();
        tracing::debug!(device = self.device.name(), "accelerator context released");
    }
}

// ── HostDevice ─────────────────────────────────────────────────────

/// Acquisition and call counts of a [`HostDevice`], shared with callers.
#[derive(Debug, Default)]
pub struct DeviceCounters {
    contexts_acquired: AtomicU64,
    contexts_released: AtomicU64,
    streams_acquired: AtomicU64,
    streams_released: AtomicU64,
    derive_calls: AtomicU64,
    update_calls: AtomicU64,
}

impl DeviceCounters {
    /// Contexts created so far.
    pub fn contexts_acquired(&self) -> u64 {
        self.contexts_acquired.load(Ordering::Relaxed)
    }

    /// Contexts released so far.
    pub fn contexts_released(&self) -> u64 {
        self.contexts_released.load(Ordering::Relaxed)
    }

    /// Streams created so far.
    pub fn streams_acquired(&self) -> u64 {
        self.streams_acquired.load(Ordering::Relaxed)
    }

    /// Streams released so far.
    pub fn streams_released(&self) -> u64 {
        self.streams_released.load(Ordering::Relaxed)
    }

    /// Derivative passes dispatched.
    pub fn derive_calls(&self) -> u64 {
        self.derive_calls.load(Ordering::Relaxed)
    }

    /// Domain updates run on the device.
    pub fn update_calls(&self) -> u64 {
        self.update_calls.load(Ordering::Relaxed)
    }
}

/// A [`Device`] that runs on the host through a wrapped operator.
///
/// Keeps the context, stream, and plan bookkeeping of a real device so
/// the accelerator path can run without hardware.
pub struct HostDevice {
    operator: Arc<dyn DerivativeOperator>,
    counters: Arc<DeviceCounters>,
    context: bool,
    stream: bool,
    plan: Option<usize>,
    plan_limit: Option<usize>,
}

impl HostDevice {
    /// Device dispatching derivatives to `operator`.
    pub fn new(operator: Arc<dyn DerivativeOperator>) -> Self {
        Self {
            operator,
            counters: Arc::new(DeviceCounters::default()),
            context: false,
            stream: false,
            plan: None,
            plan_limit: None,
        }
    }

    /// Refuse plans larger than `limit` cells per axis.
    pub fn with_plan_limit(mut self, limit: usize) -> Self {
        self.plan_limit = Some(limit);
        self
    }

    /// Shared handle to this device's counters.
    pub fn counters(&self) -> Arc<DeviceCounters> {
        Arc::clone(&self.counters)
    }
}

impl Device for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn acquire_context(&mut self) -> Result<(), ResourceError> {
        if !self.context {
            self.context = true;
            self.counters.contexts_acquired.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn acquire_stream(&mut self) -> Result<(), ResourceError> {
        if !self.context {
            return Err(ResourceError::StreamUnavailable {
                reason: "no device context".into(),
            });
        }
        if !self.stream {
            self.stream = true;
            self.counters.streams_acquired.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn build_plan(&mut self, size: usize) -> Result<(), ResourceError> {
        if let Some(limit) = self.plan_limit {
            if size > limit {
                return Err(ResourceError::PlanFailed {
                    reason: format!("plan size {size} exceeds device limit {limit}"),
                });
            }
        }
        self.plan = Some(size);
        Ok(())
    }

    fn derive(&mut self, input: &DerivativeInput) -> Result<Vec<f64>, OperatorError> {
        let Some(plan) = self.plan.filter(|_| self.stream) else {
            return Err(OperatorError::new("no transform plan on the stream"));
        };
        let extent = input.shape.extent(input.orientation);
        if extent > plan {
            return Err(OperatorError::new(format!(
                "extent {extent} exceeds plan size {plan}"
            )));
        }
        self.counters.derive_calls.fetch_add(1, Ordering::Relaxed);
        self.operator.derive(input)
    }

    fn update(&mut self, view: &UpdateView<'_>) -> Result<UpdatedFields, DomainError> {
        self.counters.update_calls.fetch_add(1, Ordering::Relaxed);
        compute_update(view)
    }

    fn release(&mut self) {
        self.plan = None;
        if self.stream {
            self.stream = false;
            self.counters.streams_released.fetch_add(1, Ordering::Relaxed);
        }
        if self.context {
            self.context = false;
            self.counters.contexts_released.fetch_add(1, Ordering::Relaxed);
        }
    }
}
