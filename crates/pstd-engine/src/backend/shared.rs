//! Fixed-size thread pool.
//!
//! Each phase sends one owned task per domain over a crossbeam channel
//! and collects replies until every task is accounted for. A domain whose
//! reply never arrives (its worker died) is reported as
//! [`DomainError::WorkerLost`]; a panic inside a task is caught and
//! reported as [`DomainError::Panicked`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use indexmap::IndexMap;
use pstd_core::{DerivativeOperator, DomainError, DomainId, Phase, ResourceError};
use pstd_scene::Scene;

use super::{BackendSession, ExecutionBackend};
use crate::config::BackendKind;
use crate::error::StepError;
use crate::phase::{
    apply_derivatives, apply_updates, collect_phase, compute_derivatives, compute_update,
    derivative_task, panic_message, DerivativeResult, DerivativeTask, UpdateStep, UpdateTask,
    UpdateView, UpdatedFields,
};

/// Fans each phase out to `pool_size` threads.
pub struct SharedMemoryBackend {
    operator: Arc<dyn DerivativeOperator>,
    pool_size: usize,
}

impl SharedMemoryBackend {
    /// Backend with a pool of `pool_size` threads (at least one).
    pub fn new(operator: Arc<dyn DerivativeOperator>, pool_size: usize) -> Self {
        Self {
            operator,
            pool_size: pool_size.max(1),
        }
    }

    /// Number of pool threads a run will use.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

impl ExecutionBackend for SharedMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SharedMemory
    }

    fn start(&mut self, _scene: &Scene) -> Result<Box<dyn BackendSession + '_>, ResourceError> {
        let pool = Pool::spawn(&self.operator, self.pool_size)?;
        Ok(Box::new(pool))
    }
}

// ── Messages ───────────────────────────────────────────────────────

enum PoolTask {
    Derivative {
        task: DerivativeTask,
        reply: Sender<(DomainId, Result<DerivativeResult, DomainError>)>,
    },
    Update {
        task: UpdateTask,
        reply: Sender<(DomainId, Result<UpdatedFields, DomainError>)>,
    },
}

// ── Pool ───────────────────────────────────────────────────────────

struct Pool {
    task_tx: Option<Sender<PoolTask>>,
    handles: Vec<JoinHandle<()>>,
}

impl Pool {
    fn spawn(operator: &Arc<dyn DerivativeOperator>, size: usize) -> Result<Self, ResourceError> {
        let (task_tx, task_rx) = crossbeam_channel::unbounded::<PoolTask>();
        let mut pool = Pool {
            task_tx: Some(task_tx),
            handles: Vec::with_capacity(size),
        };
        for i in 0..size {
            let rx = task_rx.clone();
            let op = Arc::clone(operator);
            let handle = thread::Builder::new()
                .name(format!("pstd-pool-{i}"))
                .spawn(move || worker_loop(rx, op))
                .map_err(|e| ResourceError::PoolSpawnFailed {
                    reason: format!("thread {i}: {e}"),
                })?;
            pool.handles.push(handle);
        }
        tracing::debug!(threads = size, "shared-memory pool started");
        Ok(pool)
    }

    fn sender(&self) -> Option<&Sender<PoolTask>> {
        self.task_tx.as_ref()
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop.
        self.task_tx.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("pool thread exited by panic");
            }
        }
        tracing::debug!("shared-memory pool stopped");
    }
}

fn worker_loop(task_rx: Receiver<PoolTask>, operator: Arc<dyn DerivativeOperator>) {
    while let Ok(task) = task_rx.recv() {
        match task {
            PoolTask::Derivative { task, reply } => {
                let domain = task.domain;
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    compute_derivatives(operator.as_ref(), &task)
                }))
                .unwrap_or_else(|payload| {
                    Err(DomainError::Panicked {
                        domain,
                        phase: Phase::Derivative,
                        message: panic_message(payload.as_ref()),
                    })
                });
                let _ = reply.send((domain, result));
            }
            PoolTask::Update { task, reply } => {
                let domain = task.domain;
                let result = panic::catch_unwind(AssertUnwindSafe(|| compute_update(&task.view())))
                    .unwrap_or_else(|payload| {
                        Err(DomainError::Panicked {
                            domain,
                            phase: Phase::Update,
                            message: panic_message(payload.as_ref()),
                        })
                    });
                let _ = reply.send((domain, result));
            }
        }
    }
}

/// Receive until every sender is gone, then fill in missing domains.
fn gather<T>(
    reply_rx: Receiver<(DomainId, Result<T, DomainError>)>,
    expected: &[DomainId],
    phase: Phase,
) -> Vec<Result<T, DomainError>> {
    let mut received: IndexMap<DomainId, Result<T, DomainError>> = reply_rx.iter().collect();
    expected
        .iter()
        .map(|&domain| {
            received
                .swap_remove(&domain)
                .unwrap_or(Err(DomainError::WorkerLost { domain, phase }))
        })
        .collect()
}

impl BackendSession for Pool {
    fn derivative_phase(&mut self, scene: &mut Scene, stage: usize) -> Result<(), StepError> {
        let spacing = scene.grid_spacing();
        let tasks: Vec<DerivativeTask> = scene
            .domains()
            .iter()
            .filter_map(|d| derivative_task(d, spacing, &*scene))
            .collect();
        let expected: Vec<DomainId> = tasks.iter().map(|t| t.domain).collect();

        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        if let Some(tx) = self.sender() {
            for task in tasks {
                let reply = reply_tx.clone();
                if tx.send(PoolTask::Derivative { task, reply }).is_err() {
                    break;
                }
            }
        }
        drop(reply_tx);

        let results = gather(reply_rx, &expected, Phase::Derivative);
        let results = collect_phase(Phase::Derivative, stage, results)?;
        apply_derivatives(scene, results);
        Ok(())
    }

    fn update_phase(&mut self, scene: &mut Scene, step: UpdateStep) -> Result<(), StepError> {
        let tasks: Vec<UpdateTask> = scene
            .domains()
            .iter()
            .filter_map(|d| UpdateView::of(d, step))
            .map(|view| view.to_task())
            .collect();
        let expected: Vec<DomainId> = tasks.iter().map(|t| t.domain).collect();

        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        if let Some(tx) = self.sender() {
            for task in tasks {
                let reply = reply_tx.clone();
                if tx.send(PoolTask::Update { task, reply }).is_err() {
                    break;
                }
            }
        }
        drop(reply_tx);

        let results = gather(reply_rx, &expected, Phase::Update);
        let results = collect_phase(Phase::Update, step.stage, results)?;
        apply_updates(scene, results);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pstd_test_utils::{fixtures, FailingDerivative, LinearDerivative};

    #[test]
    fn pool_matches_sequential_for_one_phase() {
        let mut a = fixtures::strip(3, 4, 4);
        let mut b = a.clone();
        let op: Arc<dyn DerivativeOperator> = Arc::new(LinearDerivative);

        let mut shared = SharedMemoryBackend::new(Arc::clone(&op), 3);
        let mut sequential = super::super::SequentialBackend::new(op);
        shared.start(&a).unwrap().derivative_phase(&mut a, 0).unwrap();
        sequential.start(&b).unwrap().derivative_phase(&mut b, 0).unwrap();
        for (x, y) in a.domains().iter().zip(b.domains()) {
            assert_eq!(x.derivatives(), y.derivatives());
        }
    }

    #[test]
    fn panics_become_domain_failures() {
        let mut scene = fixtures::strip(2, 2, 2);
        let op = Arc::new(FailingDerivative::panicking(DomainId(1), 0));
        let mut backend = SharedMemoryBackend::new(op, 2);
        let mut session = backend.start(&scene).unwrap();
        let before = scene.domain(DomainId(0)).unwrap().derivatives().clone();
        match session.derivative_phase(&mut scene, 3) {
            Err(StepError::Phase(err)) => {
                assert_eq!(err.stage, 3);
                assert_eq!(err.failures.len(), 1);
                match &err.failures[0] {
                    DomainError::Panicked { domain, .. } => assert_eq!(*domain, DomainId(1)),
                    other => panic!("expected Panicked, got {other:?}"),
                }
            }
            other => panic!("expected phase failure, got {other:?}"),
        }
        // Domain 0 succeeded but nothing was applied.
        assert_eq!(scene.domain(DomainId(0)).unwrap().derivatives(), &before);
    }

    #[test]
    fn missing_replies_are_worker_lost() {
        let (tx, rx) = crossbeam_channel::unbounded::<(DomainId, Result<u8, DomainError>)>();
        tx.send((DomainId(0), Ok(1))).unwrap();
        drop(tx);
        let results = gather(rx, &[DomainId(0), DomainId(1)], Phase::Update);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(DomainError::WorkerLost {
                domain: DomainId(1),
                phase: Phase::Update
            })
        );
    }
}
