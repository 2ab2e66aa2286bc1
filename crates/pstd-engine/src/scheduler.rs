//! Frame loop driving a scene through Runge-Kutta sub-stages.
//!
//! Each frame runs: progress report, snapshot, six sub-stages of
//! derivative phase, update phase and pressure summation, boundary
//! absorption, receiver output, and (every `checkpoint_cadence` frames)
//! a checkpoint. A failed phase rolls every domain back to the frame's
//! snapshot and ends the run; the scene is left at the last completed
//! frame.

use std::sync::Arc;
use std::time::Instant;

use pstd_core::DerivativeOperator;
use pstd_scene::Scene;
use tracing::{debug, debug_span, error, info, trace, warn};

use crate::backend::{backend_for, BackendSession, ExecutionBackend};
use crate::config::{ConfigError, SolverConfig, STAGE_COUNT};
use crate::error::{RunError, StepError};
use crate::metrics::{elapsed_us, FrameMetrics, RunSummary};
use crate::phase::UpdateStep;
use crate::progress::{ProgressControl, ProgressReport, ProgressSink};
use crate::sinks::{CheckpointSink, ReceiverSink};

/// State visible to a stage hook after a sub-stage's pressure summation.
#[derive(Clone, Copy, Debug)]
pub struct StageEvent<'a> {
    /// Zero-based frame index.
    pub frame: u64,
    /// Zero-based sub-stage index.
    pub stage: usize,
    /// The scene after summation.
    pub scene: &'a Scene,
}

type StageHook<'h> = Box<dyn FnMut(&StageEvent<'_>) + 'h>;

/// Runs frames of a validated [`SolverConfig`].
pub struct TimeStepScheduler<'h> {
    config: SolverConfig,
    on_stage: Option<StageHook<'h>>,
}

impl<'h> TimeStepScheduler<'h> {
    /// Scheduler for `config`, rejected if it fails validation.
    pub fn new(config: SolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            on_stage: None,
        })
    }

    /// Call `hook` after the pressure summation of every sub-stage.
    pub fn on_stage(mut self, hook: impl FnMut(&StageEvent<'_>) + 'h) -> Self {
        self.on_stage = Some(Box::new(hook));
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Advance `scene` by `frame_count` frames on `backend`.
    ///
    /// Returns a summary when every frame ran or the progress sink
    /// requested a stop. Any error has already been reported to
    /// `progress` as a terminal `error` status.
    pub fn run(
        &mut self,
        scene: &mut Scene,
        backend: &mut dyn ExecutionBackend,
        receivers: &mut dyn ReceiverSink,
        checkpoints: &mut dyn CheckpointSink,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunSummary, RunError> {
        let run_start = Instant::now();
        let frame_count = self.config.frame_count;
        info!(
            backend = ?backend.kind(),
            frames = frame_count,
            domains = scene.domain_count(),
            "run starting"
        );
        let mut session = match backend.start(scene) {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "backend resources unavailable");
                progress.report(&ProgressReport::error(None, e.to_string()));
                return Err(RunError::Resource(e));
            }
        };
        progress.report(&ProgressReport::starting(frame_count));

        let mut summary = RunSummary::default();
        for frame in 0..frame_count {
            let span = debug_span!("frame", frame);
            let _enter = span.enter();

            if progress.report(&ProgressReport::running(frame + 1)) == ProgressControl::Stop {
                info!(frame = frame + 1, "stop requested");
                progress.report(&ProgressReport::cancelled(frame + 1));
                summary.cancelled = true;
                break;
            }

            match self.frame(frame, scene, session.as_mut(), receivers, checkpoints) {
                Ok(metrics) => {
                    summary.frames_completed += 1;
                    summary.last_frame = Some(metrics);
                }
                Err(e) => {
                    error!(frame = frame + 1, error = %e, "frame aborted");
                    progress.report(&ProgressReport::error(Some(frame + 1), e.to_string()));
                    drop(session);
                    return Err(e);
                }
            }
        }
        drop(session);

        if !summary.cancelled {
            progress.report(&ProgressReport::finished(summary.frames_completed));
        }
        summary.dropped_progress = progress.dropped();
        summary.total_us = elapsed_us(run_start);
        info!(
            frames = summary.frames_completed,
            cancelled = summary.cancelled,
            total_us = summary.total_us,
            "run finished"
        );
        Ok(summary)
    }

    fn frame(
        &mut self,
        frame: u64,
        scene: &mut Scene,
        session: &mut dyn BackendSession,
        receivers: &mut dyn ReceiverSink,
        checkpoints: &mut dyn CheckpointSink,
    ) -> Result<FrameMetrics, RunError> {
        let frame_start = Instant::now();
        let mut metrics = FrameMetrics {
            frame,
            ..FrameMetrics::default()
        };

        scene.push_values();
        if let Err(e) = self.stages(frame, scene, session, &mut metrics) {
            let failures = match &e {
                StepError::Phase(p) => p.failures.len(),
                StepError::Dependency(_) => 1,
            };
            error!(frame, failures, "phase failed");
            scene.restore_snapshot();
            warn!(frame, "frame rolled back to its snapshot");
            return Err(RunError::from_step(frame, e));
        }

        let absorption_start = Instant::now();
        scene.apply_boundary_absorption();
        metrics.absorption_us = elapsed_us(absorption_start);

        let output_start = Instant::now();
        for (receiver, sample) in scene.sample_receivers() {
            receivers
                .write(receiver, sample)
                .map_err(|source| RunError::ReceiverSink { receiver, source })?;
        }
        if self.config.is_checkpoint_frame(frame) {
            checkpoints
                .write_checkpoint(frame, scene)
                .map_err(|source| RunError::Checkpoint { frame, source })?;
            debug!(frame, "checkpoint written");
        }
        metrics.output_us = elapsed_us(output_start);
        metrics.total_us = elapsed_us(frame_start);
        Ok(metrics)
    }

    fn stages(
        &mut self,
        frame: u64,
        scene: &mut Scene,
        session: &mut dyn BackendSession,
        metrics: &mut FrameMetrics,
    ) -> Result<(), StepError> {
        for stage in 0..STAGE_COUNT {
            let step = UpdateStep {
                stage,
                alpha: self.config.rk_coefficients.stage(stage),
                dt: self.config.dt,
                wave_speed: self.config.wave_speed,
            };

            let derivative_start = Instant::now();
            session.derivative_phase(scene, stage)?;
            metrics.derivative_us += elapsed_us(derivative_start);

            let update_start = Instant::now();
            session.update_phase(scene, step)?;
            scene.sum_pressure();
            metrics.update_us += elapsed_us(update_start);

            trace!(stage, "sub-stage complete");
            if let Some(hook) = self.on_stage.as_mut() {
                hook(&StageEvent {
                    frame,
                    stage,
                    scene: &*scene,
                });
            }
        }
        Ok(())
    }
}

/// Run `config` on `scene` with the backend it names.
pub fn run(
    config: &SolverConfig,
    scene: &mut Scene,
    operator: Arc<dyn DerivativeOperator>,
    receivers: &mut dyn ReceiverSink,
    checkpoints: &mut dyn CheckpointSink,
    progress: &mut dyn ProgressSink,
) -> Result<RunSummary, RunError> {
    let mut scheduler = TimeStepScheduler::new(config.clone())?;
    let mut backend = backend_for(config, operator);
    scheduler.run(scene, backend.as_mut(), receivers, checkpoints, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SequentialBackend;
    use crate::config::BackendKind;
    use crate::progress::ProgressStatus;
    use crate::sinks::{CheckpointLog, MemoryReceiverSink, NoCheckpoints};
    use pstd_core::{DependencyError, DomainId, ResourceError, WorkerId};
    use pstd_test_utils::{fixtures, FailingDerivative, LinearDerivative};

    fn config(frames: u64) -> SolverConfig {
        SolverConfig {
            frame_count: frames,
            ..SolverConfig::default()
        }
    }

    /// Sequential execution whose `fail_at`-th derivative phase reports
    /// a rejected data exchange.
    struct MismatchAt {
        inner: SequentialBackend,
        fail_at: usize,
    }

    struct MismatchSession<'a> {
        inner: Box<dyn BackendSession + 'a>,
        calls: usize,
        fail_at: usize,
    }

    impl ExecutionBackend for MismatchAt {
        fn kind(&self) -> BackendKind {
            BackendKind::Distributed
        }

        fn start(&mut self, scene: &Scene) -> Result<Box<dyn BackendSession + '_>, ResourceError> {
            let fail_at = self.fail_at;
            let inner = self.inner.start(scene)?;
            Ok(Box::new(MismatchSession {
                inner,
                calls: 0,
                fail_at,
            }))
        }
    }

    impl BackendSession for MismatchSession<'_> {
        fn derivative_phase(&mut self, scene: &mut Scene, stage: usize) -> Result<(), StepError> {
            let call = self.calls;
            self.calls += 1;
            if call == self.fail_at {
                return Err(DependencyError::Mismatch {
                    worker: WorkerId(0),
                    missing: vec![DomainId(1)],
                    unexpected: Vec::new(),
                }
                .into());
            }
            self.inner.derivative_phase(scene, stage)
        }

        fn update_phase(&mut self, scene: &mut Scene, step: UpdateStep) -> Result<(), StepError> {
            self.inner.update_phase(scene, step)
        }
    }

    #[test]
    fn reports_one_based_frames_then_finished() {
        let mut scene = fixtures::rigid_and_air(4, 4);
        let mut scheduler = TimeStepScheduler::new(config(3)).unwrap();
        let mut backend = SequentialBackend::new(Arc::new(LinearDerivative));
        let mut reports = Vec::new();
        let mut progress = |r: &ProgressReport| {
            reports.push(r.clone());
            ProgressControl::Continue
        };
        let summary = scheduler
            .run(
                &mut scene,
                &mut backend,
                &mut MemoryReceiverSink::new(),
                &mut NoCheckpoints,
                &mut progress,
            )
            .unwrap();
        assert_eq!(summary.frames_completed, 3);
        let running: Vec<_> = reports
            .iter()
            .filter(|r| r.status == ProgressStatus::Running)
            .map(|r| r.frame)
            .collect();
        assert_eq!(running, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(reports.first().map(|r| r.status), Some(ProgressStatus::Starting));
        assert_eq!(reports.last().map(|r| r.status), Some(ProgressStatus::Finished));
    }

    #[test]
    fn stage_hook_sees_every_sub_stage() {
        let mut scene = fixtures::rigid_and_air(3, 3);
        let mut seen = Vec::new();
        let mut scheduler = TimeStepScheduler::new(config(2))
            .unwrap()
            .on_stage(|e| seen.push((e.frame, e.stage)));
        let mut backend = SequentialBackend::new(Arc::new(LinearDerivative));
        scheduler
            .run(
                &mut scene,
                &mut backend,
                &mut MemoryReceiverSink::new(),
                &mut NoCheckpoints,
                &mut |_: &ProgressReport| ProgressControl::Continue,
            )
            .unwrap();
        drop(scheduler);
        assert_eq!(seen.len(), 2 * STAGE_COUNT);
        assert_eq!(seen[STAGE_COUNT], (1, 0));
    }

    #[test]
    fn failure_rolls_back_and_skips_checkpoint() {
        let mut scene = fixtures::strip(2, 3, 3);
        // Fail on the second frame's first derivative call for domain 1.
        let op = Arc::new(FailingDerivative::new(DomainId(1), 4 * STAGE_COUNT));
        let mut backend = SequentialBackend::new(op);
        let mut scheduler = TimeStepScheduler::new(config(3)).unwrap();
        let mut checkpoints = CheckpointLog::default();
        let mut receivers = MemoryReceiverSink::new();
        let mut statuses = Vec::new();
        let mut progress = |r: &ProgressReport| {
            statuses.push((r.status, r.frame));
            ProgressControl::Continue
        };

        // Reference: the same scene after one clean frame.
        let mut expected = scene.clone();
        TimeStepScheduler::new(config(1))
            .unwrap()
            .run(
                &mut expected,
                &mut SequentialBackend::new(Arc::new(LinearDerivative)),
                &mut MemoryReceiverSink::new(),
                &mut NoCheckpoints,
                &mut |_: &ProgressReport| ProgressControl::Continue,
            )
            .unwrap();

        let result = scheduler.run(
            &mut scene,
            &mut backend,
            &mut receivers,
            &mut checkpoints,
            &mut progress,
        );
        match result {
            Err(RunError::Phase { frame, source }) => {
                assert_eq!(frame, 1);
                assert_eq!(source.failures[0].domain(), DomainId(1));
            }
            other => panic!("expected Phase, got {other:?}"),
        }
        assert_eq!(checkpoints.frames, vec![0]);
        assert_eq!(receivers.samples(pstd_core::ReceiverId(0)).len(), 1);
        assert_eq!(statuses.last(), Some(&(ProgressStatus::Error, Some(2))));
        for (a, b) in scene.domains().iter().zip(expected.domains()) {
            assert_eq!(a.fields(), b.fields());
        }
    }

    #[test]
    fn dependency_mismatch_rolls_back_and_reports_error() {
        let mut scene = fixtures::strip(2, 3, 3);
        let mut expected = scene.clone();
        TimeStepScheduler::new(config(1))
            .unwrap()
            .run(
                &mut expected,
                &mut SequentialBackend::new(Arc::new(LinearDerivative)),
                &mut MemoryReceiverSink::new(),
                &mut NoCheckpoints,
                &mut |_: &ProgressReport| ProgressControl::Continue,
            )
            .unwrap();

        // Third sub-stage of the second frame, after two updates landed.
        let mut backend = MismatchAt {
            inner: SequentialBackend::new(Arc::new(LinearDerivative)),
            fail_at: STAGE_COUNT + 2,
        };
        let mut checkpoints = CheckpointLog::default();
        let mut statuses = Vec::new();
        let result = TimeStepScheduler::new(config(3)).unwrap().run(
            &mut scene,
            &mut backend,
            &mut MemoryReceiverSink::new(),
            &mut checkpoints,
            &mut |r: &ProgressReport| {
                statuses.push((r.status, r.frame));
                ProgressControl::Continue
            },
        );

        match result {
            Err(RunError::Dependency {
                frame,
                source: DependencyError::Mismatch { worker, missing, .. },
            }) => {
                assert_eq!(frame, 1);
                assert_eq!(worker, WorkerId(0));
                assert_eq!(missing, vec![DomainId(1)]);
            }
            other => panic!("expected Dependency, got {other:?}"),
        }
        assert_eq!(statuses.last(), Some(&(ProgressStatus::Error, Some(2))));
        assert_eq!(checkpoints.frames, vec![0]);
        for (a, b) in scene.domains().iter().zip(expected.domains()) {
            assert_eq!(a.fields(), b.fields(), "domain {}", a.id());
        }
    }

    #[test]
    fn stop_before_first_frame_runs_nothing() {
        let mut scene = fixtures::rigid_and_air(2, 2);
        let before = scene.clone();
        let mut scheduler = TimeStepScheduler::new(config(5)).unwrap();
        let mut backend = SequentialBackend::new(Arc::new(LinearDerivative));
        let summary = scheduler
            .run(
                &mut scene,
                &mut backend,
                &mut MemoryReceiverSink::new(),
                &mut NoCheckpoints,
                &mut |_: &ProgressReport| ProgressControl::Stop,
            )
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.frames_completed, 0);
        for (a, b) in scene.domains().iter().zip(before.domains()) {
            assert_eq!(a.fields(), b.fields());
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            TimeStepScheduler::new(config(0)),
            Err(ConfigError::NoFrames)
        ));
    }
}
