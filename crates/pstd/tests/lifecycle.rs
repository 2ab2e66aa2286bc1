//! Cancellation, failure rollback, and file output across a whole run.

use std::sync::Arc;

use pstd::engine::{SequentialBackend, SharedMemoryBackend, StopHandle};
use pstd::prelude::*;
use pstd_test_utils::{fixtures, FailingDerivative, LinearDerivative};

fn config(frames: u64) -> SolverConfig {
    SolverConfig {
        frame_count: frames,
        ..SolverConfig::default()
    }
}

#[test]
fn stop_handle_cancels_at_the_next_frame() {
    let mut scene = fixtures::strip(2, 4, 4);
    let (mut progress, reports, stop) = ChannelProgress::bounded(64);
    let hook_stop: StopHandle = stop.clone();
    let mut scheduler = TimeStepScheduler::new(config(10))
        .unwrap()
        .on_stage(move |e| {
            if e.frame == 1 && e.stage == 0 {
                hook_stop.stop();
            }
        });
    let summary = scheduler
        .run(
            &mut scene,
            &mut SequentialBackend::new(Arc::new(LinearDerivative)),
            &mut MemoryReceiverSink::new(),
            &mut NoCheckpoints,
            &mut progress,
        )
        .unwrap();
    drop(progress);

    assert!(summary.cancelled);
    assert!(stop.is_stopped());
    // Frame 1 finishes its sub-stages; frame 2 never starts.
    assert_eq!(summary.frames_completed, 2);
    let statuses: Vec<(ProgressStatus, Option<u64>)> =
        reports.iter().map(|r| (r.status, r.frame)).collect();
    assert_eq!(
        statuses,
        vec![
            (ProgressStatus::Starting, None),
            (ProgressStatus::Running, Some(1)),
            (ProgressStatus::Running, Some(2)),
            (ProgressStatus::Running, Some(3)),
            (ProgressStatus::Cancelled, Some(3)),
        ]
    );
}

#[test]
fn full_progress_channel_never_blocks_the_run() {
    let mut scene = fixtures::strip(2, 3, 3);
    let (mut progress, reports, _stop) = ChannelProgress::bounded(1);
    let summary = TimeStepScheduler::new(config(5))
        .unwrap()
        .run(
            &mut scene,
            &mut SequentialBackend::new(Arc::new(LinearDerivative)),
            &mut MemoryReceiverSink::new(),
            &mut NoCheckpoints,
            &mut progress,
        )
        .unwrap();
    assert_eq!(summary.frames_completed, 5);
    // Starting fits; the five running reports and finished are dropped.
    assert_eq!(summary.dropped_progress, 6);
    assert_eq!(reports.len(), 1);
}

#[test]
fn progress_reports_serialise_as_status_message_frame() {
    let json = serde_json::to_value(ProgressReport::running(4)).unwrap();
    assert_eq!(json["status"], "running");
    assert_eq!(json["message"], "Calculation frame:4");
    assert_eq!(json["frame"], 4);
}

#[test]
fn failed_frame_rolls_back_and_reports_error() {
    let mut scene = fixtures::strip(3, 4, 4);
    // Domain 2 fails during the third frame.
    let op = Arc::new(FailingDerivative::new(DomainId(2), 2 * 24 + 5));
    let mut receivers = MemoryReceiverSink::new();
    let mut reports = Vec::new();

    let mut reference = scene.clone();
    TimeStepScheduler::new(config(2))
        .unwrap()
        .run(
            &mut reference,
            &mut SequentialBackend::new(Arc::new(LinearDerivative)),
            &mut MemoryReceiverSink::new(),
            &mut NoCheckpoints,
            &mut |_: &ProgressReport| ProgressControl::Continue,
        )
        .unwrap();

    let result = TimeStepScheduler::new(config(5)).unwrap().run(
        &mut scene,
        &mut SharedMemoryBackend::new(op, 2),
        &mut receivers,
        &mut NoCheckpoints,
        &mut |r: &ProgressReport| {
            reports.push(r.clone());
            ProgressControl::Continue
        },
    );

    match result {
        Err(RunError::Phase { frame, source }) => {
            assert_eq!(frame, 2);
            assert_eq!(source.failures.len(), 1);
            assert!(matches!(
                source.failures[0],
                DomainError::ComputationFailed { domain: DomainId(2), .. }
            ));
        }
        other => panic!("expected Phase, got {other:?}"),
    }
    let last = reports.last().unwrap();
    assert_eq!(last.status, ProgressStatus::Error);
    assert_eq!(last.frame, Some(3));
    assert_eq!(receivers.samples(ReceiverId(0)).len(), 2);
    for (a, b) in scene.domains().iter().zip(reference.domains()) {
        assert_eq!(a.fields(), b.fields(), "domain {}", a.id());
    }
}

#[test]
fn file_sinks_record_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = fixtures::room_with_pml();
    let mut receivers = FileReceiverSink::for_scene(dir.path(), &scene).unwrap();
    let mut frames = PressureFrameWriter::new(dir.path().join("frames")).unwrap();
    let config = SolverConfig {
        frame_count: 4,
        checkpoint_cadence: 2,
        ..SolverConfig::default()
    };
    pstd::engine::run(
        &config,
        &mut scene,
        Arc::new(LinearDerivative),
        &mut receivers,
        &mut frames,
        &mut |_: &ProgressReport| ProgressControl::Continue,
    )
    .unwrap();

    for receiver in scene.receivers() {
        let samples = FileReceiverSink::read_samples(receivers.path(receiver.id())).unwrap();
        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.is_finite()));
    }
    for domain in scene.domains() {
        for frame in [0u64, 2] {
            let path = frames.path(domain.id(), frame);
            assert_eq!(path.exists(), !domain.is_rigid(), "{}", path.display());
        }
        assert!(!frames.path(domain.id(), 1).exists());
    }
}
