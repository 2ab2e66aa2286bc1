//! One thread per [`Worker`], exchanging boundary data by message.
//!
//! The coordinator keeps the authoritative scene. Before each derivative
//! phase it publishes owned state to every worker, collects their
//! numerical data, and hands each worker exactly its dependency set.
//! Workers then derive their own domains and reply at the barrier.
//! Nothing is shared between worker threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use indexmap::IndexMap;
use pstd_core::{
    DependencyError, DerivativeOperator, DomainError, DomainId, FieldState, Orientation, Phase,
    ResourceError, WorkerId,
};
use pstd_scene::{DomainSnapshot, Scene};

use super::{BackendSession, ExecutionBackend};
use crate::config::BackendKind;
use crate::distribute::{distribute, Worker};
use crate::error::StepError;
use crate::phase::{
    apply_derivatives, apply_updates, collect_phase, compute_derivatives, compute_update,
    derivative_task, panic_message, DerivativeResult, UpdateStep, UpdateTask, UpdateView,
    UpdatedFields,
};

/// Distributes domains round-robin over `worker_count` worker threads.
pub struct DistributedBackend {
    operator: Arc<dyn DerivativeOperator>,
    worker_count: usize,
}

impl DistributedBackend {
    /// Backend with `worker_count` workers (at least one).
    pub fn new(operator: Arc<dyn DerivativeOperator>, worker_count: usize) -> Self {
        Self {
            operator,
            worker_count: worker_count.max(1),
        }
    }

    /// Number of workers a run will use.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl ExecutionBackend for DistributedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Distributed
    }

    fn start(&mut self, scene: &Scene) -> Result<Box<dyn BackendSession + '_>, ResourceError> {
        let workers = distribute(scene, self.worker_count);
        let mut session = Cluster {
            workers: Vec::with_capacity(workers.len()),
        };
        for worker in workers {
            let handle = WorkerHandle::spawn(worker, Arc::clone(&self.operator))?;
            session.workers.push(handle);
        }
        tracing::debug!(workers = session.workers.len(), "distributed workers started");
        Ok(Box::new(session))
    }
}

// ── Messages ───────────────────────────────────────────────────────

type Replies<T> = Vec<(DomainId, Result<T, DomainError>)>;

enum Command {
    Publish {
        fields: Vec<(DomainId, FieldState)>,
        reply: Sender<IndexMap<DomainId, DomainSnapshot>>,
    },
    Exchange {
        data: IndexMap<DomainId, DomainSnapshot>,
        reply: Sender<Result<(), DependencyError>>,
    },
    Derive {
        grid_spacing: f64,
        reply: Sender<Replies<DerivativeResult>>,
    },
    Update {
        tasks: Vec<UpdateTask>,
        reply: Sender<Replies<UpdatedFields>>,
    },
}

// ── Worker threads ─────────────────────────────────────────────────

struct WorkerHandle {
    id: WorkerId,
    owned: Vec<DomainId>,
    dependencies: Vec<DomainId>,
    tx: Option<Sender<Command>>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    fn spawn(worker: Worker, operator: Arc<dyn DerivativeOperator>) -> Result<Self, ResourceError> {
        let id = worker.id();
        let owned = worker.owned().collect();
        let dependencies = worker.dependencies().iter().copied().collect();
        let (tx, rx) = crossbeam_channel::unbounded::<Command>();
        let handle = thread::Builder::new()
            .name(format!("pstd-worker-{id}"))
            .spawn(move || worker_loop(worker, rx, operator))
            .map_err(|e| ResourceError::WorkerSpawnFailed {
                reason: format!("worker {id}: {e}"),
            })?;
        Ok(Self {
            id,
            owned,
            dependencies,
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Send `command` built around a fresh reply channel and wait for the
    /// answer. `None` if the worker is gone.
    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> Option<T> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tx.as_ref()?.send(command(reply_tx)).ok()?;
        reply_rx.recv().ok()
    }
}

fn worker_loop(
    mut worker: Worker,
    rx: crossbeam_channel::Receiver<Command>,
    operator: Arc<dyn DerivativeOperator>,
) {
    while let Ok(command) = rx.recv() {
        match command {
            Command::Publish { fields, reply } => {
                for (id, state) in &fields {
                    worker.load(*id, state);
                }
                let _ = reply.send(worker.get_numerical_data());
            }
            Command::Exchange { data, reply } => {
                let _ = reply.send(worker.set_numerical_data(data));
            }
            Command::Derive {
                grid_spacing,
                reply,
            } => {
                let ids: Vec<DomainId> = worker.owned().collect();
                let results = ids
                    .into_iter()
                    .filter_map(|id| worker.domain(id))
                    .filter_map(|domain| derivative_task(domain, grid_spacing, &worker))
                    .map(|task| {
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
                        (domain, result)
                    })
                    .collect();
                let _ = reply.send(results);
            }
            Command::Update { tasks, reply } => {
                let results = tasks
                    .iter()
                    .map(|task| {
                        let result =
                            panic::catch_unwind(AssertUnwindSafe(|| compute_update(&task.view())))
                                .unwrap_or_else(|payload| {
                                    Err(DomainError::Panicked {
                                        domain: task.domain,
                                        phase: Phase::Update,
                                        message: panic_message(payload.as_ref()),
                                    })
                                });
                        (task.domain, result)
                    })
                    .collect();
                let _ = reply.send(results);
            }
        }
    }
}

// ── Coordinator ────────────────────────────────────────────────────

struct Cluster {
    workers: Vec<WorkerHandle>,
}

impl Cluster {
    /// Publish current state and deliver every worker its dependencies.
    fn exchange(&self, scene: &Scene) -> Result<(), DependencyError> {
        let mut published: IndexMap<DomainId, DomainSnapshot> = IndexMap::new();
        for worker in &self.workers {
            let fields = worker
                .owned
                .iter()
                .filter_map(|&id| scene.domain(id))
                .filter(|d| !d.is_rigid())
                .map(|d| (d.id(), d.fields().clone()))
                .collect();
            let data = worker
                .request(|reply| Command::Publish { fields, reply })
                .ok_or(DependencyError::Disconnected { worker: worker.id })?;
            published.extend(data);
        }
        for worker in &self.workers {
            let data = worker
                .dependencies
                .iter()
                .filter_map(|id| published.get(id).map(|s| (*id, s.clone())))
                .collect();
            worker
                .request(|reply| Command::Exchange { data, reply })
                .ok_or(DependencyError::Disconnected { worker: worker.id })??;
        }
        Ok(())
    }
}

/// Order replies as `expected`, marking absent domains as lost.
fn in_order<T>(
    mut received: IndexMap<DomainId, Result<T, DomainError>>,
    expected: impl IntoIterator<Item = DomainId>,
    phase: Phase,
) -> Vec<Result<T, DomainError>> {
    expected
        .into_iter()
        .map(|domain| {
            received
                .swap_remove(&domain)
                .unwrap_or(Err(DomainError::WorkerLost { domain, phase }))
        })
        .collect()
}

impl BackendSession for Cluster {
    fn derivative_phase(&mut self, scene: &mut Scene, stage: usize) -> Result<(), StepError> {
        self.exchange(scene)?;

        let grid_spacing = scene.grid_spacing();
        let mut received = IndexMap::new();
        for worker in &self.workers {
            if let Some(replies) = worker.request(|reply| Command::Derive {
                grid_spacing,
                reply,
            }) {
                received.extend(replies);
            }
        }
        let expected = scene
            .domains()
            .iter()
            .filter(|d| !d.is_rigid() && Orientation::ALL.iter().any(|&o| d.should_update(o)))
            .map(|d| d.id());
        let results = in_order(received, expected, Phase::Derivative);
        let results = collect_phase(Phase::Derivative, stage, results)?;
        apply_derivatives(scene, results);
        Ok(())
    }

    fn update_phase(&mut self, scene: &mut Scene, step: UpdateStep) -> Result<(), StepError> {
        let mut received = IndexMap::new();
        for worker in &self.workers {
            let tasks: Vec<UpdateTask> = worker
                .owned
                .iter()
                .filter_map(|&id| scene.domain(id))
                .filter_map(|d| UpdateView::of(d, step))
                .map(|view| view.to_task())
                .collect();
            if tasks.is_empty() {
                continue;
            }
            if let Some(replies) = worker.request(|reply| Command::Update { tasks, reply }) {
                received.extend(replies);
            }
        }
        let expected = scene
            .domains()
            .iter()
            .filter_map(|d| UpdateView::of(d, step))
            .map(|view| view.domain);
        let results = in_order(received, expected, Phase::Update);
        let results = collect_phase(Phase::Update, step.stage, results)?;
        apply_updates(scene, results);
        Ok(())
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            worker.tx.take();
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    tracing::warn!(worker = %worker.id, "worker thread exited by panic");
                }
            }
        }
        tracing::debug!("distributed workers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SequentialBackend;
    use pstd_test_utils::{fixtures, FailingDerivative, LinearDerivative};

    #[test]
    fn derivatives_match_sequential() {
        let mut a = fixtures::strip(5, 3, 4);
        let mut b = a.clone();
        let op: Arc<dyn DerivativeOperator> = Arc::new(LinearDerivative);

        let mut distributed = DistributedBackend::new(Arc::clone(&op), 2);
        let mut sequential = SequentialBackend::new(op);
        distributed.start(&a).unwrap().derivative_phase(&mut a, 0).unwrap();
        sequential.start(&b).unwrap().derivative_phase(&mut b, 0).unwrap();
        for (x, y) in a.domains().iter().zip(b.domains()) {
            assert_eq!(x.derivatives(), y.derivatives());
        }
    }

    #[test]
    fn rigid_neighbours_are_exchanged() {
        let mut a = fixtures::rigid_and_air(3, 3);
        let mut b = a.clone();
        let op: Arc<dyn DerivativeOperator> = Arc::new(LinearDerivative);

        let mut distributed = DistributedBackend::new(Arc::clone(&op), 2);
        let mut sequential = SequentialBackend::new(op);
        distributed.start(&a).unwrap().derivative_phase(&mut a, 0).unwrap();
        sequential.start(&b).unwrap().derivative_phase(&mut b, 0).unwrap();
        assert_eq!(
            a.domain(DomainId(1)).unwrap().derivatives(),
            b.domain(DomainId(1)).unwrap().derivatives()
        );
    }

    #[test]
    fn worker_panic_is_a_domain_failure() {
        let mut scene = fixtures::strip(3, 2, 2);
        let op = Arc::new(FailingDerivative::panicking(DomainId(2), 0));
        let mut backend = DistributedBackend::new(op, 3);
        let mut session = backend.start(&scene).unwrap();
        match session.derivative_phase(&mut scene, 1) {
            Err(StepError::Phase(err)) => {
                assert_eq!(err.failures.len(), 1);
                assert_eq!(err.failures[0].domain(), DomainId(2));
            }
            other => panic!("expected phase failure, got {other:?}"),
        }
    }

    #[test]
    fn more_workers_than_domains() {
        let mut scene = fixtures::strip(2, 2, 2);
        let mut backend = DistributedBackend::new(Arc::new(LinearDerivative), 5);
        let mut session = backend.start(&scene).unwrap();
        session.derivative_phase(&mut scene, 0).unwrap();
    }
}
