//! In-order execution on the calling thread.

use std::sync::Arc;

use pstd_core::{DerivativeOperator, Phase, ResourceError};
use pstd_scene::Scene;

use super::{BackendSession, ExecutionBackend};
use crate::config::BackendKind;
use crate::error::StepError;
use crate::phase::{
    apply_derivatives, apply_updates, collect_phase, compute_derivatives, compute_update,
    derivative_task, UpdateStep, UpdateView,
};

/// Iterates domains in registration order with no concurrency.
pub struct SequentialBackend {
    operator: Arc<dyn DerivativeOperator>,
}

impl SequentialBackend {
    /// Backend calling `operator` directly.
    pub fn new(operator: Arc<dyn DerivativeOperator>) -> Self {
        Self { operator }
    }
}

impl ExecutionBackend for SequentialBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sequential
    }

    fn start(&mut self, _scene: &Scene) -> Result<Box<dyn BackendSession + '_>, ResourceError> {
        Ok(Box::new(SequentialSession {
            operator: self.operator.as_ref(),
        }))
    }
}

struct SequentialSession<'a> {
    operator: &'a dyn DerivativeOperator,
}

impl BackendSession for SequentialSession<'_> {
    fn derivative_phase(&mut self, scene: &mut Scene, stage: usize) -> Result<(), StepError> {
        let spacing = scene.grid_spacing();
        let results = scene
            .domains()
            .iter()
            .filter_map(|d| derivative_task(d, spacing, &*scene))
            .map(|task| compute_derivatives(self.operator, &task));
        let results = collect_phase(Phase::Derivative, stage, results)?;
        apply_derivatives(scene, results);
        Ok(())
    }

    fn update_phase(&mut self, scene: &mut Scene, step: UpdateStep) -> Result<(), StepError> {
        let results = scene
            .domains()
            .iter()
            .filter_map(|d| UpdateView::of(d, step))
            .map(|view| compute_update(&view));
        let results = collect_phase(Phase::Update, step.stage, results)?;
        apply_updates(scene, results);
        Ok(())
    }
}
