//! Criterion benchmarks comparing execution backends on the reference scene.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pstd_bench::{reference_config, reference_scene, stress_scene};
use pstd_core::DerivativeOperator;
use pstd_engine::{
    backend_for, BackendKind, MemoryReceiverSink, NoCheckpoints, ProgressControl, ProgressReport,
    TimeStepScheduler, UpdateStep,
};
use pstd_test_utils::LinearDerivative;

const KINDS: [BackendKind; 4] = [
    BackendKind::Sequential,
    BackendKind::SharedMemory,
    BackendKind::Accelerator,
    BackendKind::Distributed,
];

fn bench_derivative_phase(c: &mut Criterion) {
    let op: Arc<dyn DerivativeOperator> = Arc::new(LinearDerivative);
    let mut group = c.benchmark_group("derivative_phase_16k");
    for kind in KINDS {
        let mut scene = reference_scene().unwrap();
        let mut backend = backend_for(&reference_config(kind, 1), Arc::clone(&op));
        let mut session = backend.start(&scene).unwrap();
        group.bench_function(BenchmarkId::from_parameter(format!("{kind:?}")), |b| {
            b.iter(|| {
                session.derivative_phase(&mut scene, 0).unwrap();
                black_box(&scene);
            });
        });
    }
    group.finish();
}

fn bench_sub_stage(c: &mut Criterion) {
    let op: Arc<dyn DerivativeOperator> = Arc::new(LinearDerivative);
    let mut group = c.benchmark_group("sub_stage_16k");
    for kind in KINDS {
        let config = reference_config(kind, 1);
        let step = UpdateStep {
            stage: 0,
            alpha: config.rk_coefficients.stage(0),
            dt: config.dt,
            wave_speed: config.wave_speed,
        };
        let mut scene = reference_scene().unwrap();
        let mut backend = backend_for(&config, Arc::clone(&op));
        let mut session = backend.start(&scene).unwrap();
        group.bench_function(BenchmarkId::from_parameter(format!("{kind:?}")), |b| {
            b.iter(|| {
                scene.push_values();
                session.derivative_phase(&mut scene, 0).unwrap();
                session.update_phase(&mut scene, step).unwrap();
                scene.sum_pressure();
                scene.restore_snapshot();
                black_box(&scene);
            });
        });
    }
    group.finish();
}

fn bench_ten_frames_stress(c: &mut Criterion) {
    let op: Arc<dyn DerivativeOperator> = Arc::new(LinearDerivative);
    let initial = stress_scene().unwrap();
    let mut group = c.benchmark_group("ten_frames_147k");
    group.sample_size(10);
    for kind in [BackendKind::Sequential, BackendKind::SharedMemory] {
        let config = reference_config(kind, 10);
        group.bench_function(BenchmarkId::from_parameter(format!("{kind:?}")), |b| {
            b.iter(|| {
                let mut scene = initial.clone();
                let mut backend = backend_for(&config, Arc::clone(&op));
                let summary = TimeStepScheduler::new(config.clone())
                    .unwrap()
                    .run(
                        &mut scene,
                        backend.as_mut(),
                        &mut MemoryReceiverSink::new(),
                        &mut NoCheckpoints,
                        &mut |_: &ProgressReport| ProgressControl::Continue,
                    )
                    .unwrap();
                black_box(summary);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_derivative_phase,
    bench_sub_stage,
    bench_ten_frames_stress
);
criterion_main!(benches);
