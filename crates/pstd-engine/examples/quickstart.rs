//! PSTD quickstart: a small room simulated end to end.
//!
//! Demonstrates:
//!   1. Building a scene with an air room, a rigid wall and a PML ring
//!   2. Implementing a derivative operator
//!   3. Loading a SolverConfig from TOML
//!   4. Running with a non-blocking progress channel and file sinks
//!
//! Run with:
//!   RUST_LOG=pstd_engine=debug cargo run --example quickstart

use std::sync::Arc;
use std::thread;

use pstd_core::{DerivativeInput, DerivativeOperator, GridPoint, OperatorError, Orientation, Shape};
use pstd_engine::{
    run, ChannelProgress, FileReceiverSink, PressureFrameWriter, ProgressStatus, SolverConfig,
};
use pstd_scene::{PmlSettings, SceneBuilder};
use tracing_subscriber::EnvFilter;

// ─── Operator: central differences, mirrored at every edge ──────

struct CentralDifference;

impl DerivativeOperator for CentralDifference {
    fn name(&self) -> &str {
        "central-difference"
    }

    fn derive(&self, input: &DerivativeInput) -> Result<Vec<f64>, OperatorError> {
        let shape = input.shape;
        let scale = 1.0 / (2.0 * input.grid_spacing);
        let at = |row: usize, col: usize| input.field[shape.index(row, col)];
        let mut out = vec![0.0; shape.len()];
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                let (low, high) = match input.orientation {
                    Orientation::Horizontal => (
                        at(row, col.saturating_sub(1)),
                        at(row, (col + 1).min(shape.cols - 1)),
                    ),
                    Orientation::Vertical => (
                        at(row.saturating_sub(1), col),
                        at((row + 1).min(shape.rows - 1), col),
                    ),
                };
                out[shape.index(row, col)] = (high - low) * scale;
            }
        }
        Ok(out)
    }
}

const CONFIG: &str = r#"
frame_count = 40
wave_speed = 340.0
checkpoint_cadence = 10
backend = "shared_memory"
pool_size = 4
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // ─── Scene ──────────────────────────────────────────────────
    let mut builder = SceneBuilder::new(0.2);
    builder.domain(GridPoint::new(0, 0), Shape::new(32, 32));
    builder.rigid(GridPoint::new(32, 0), Shape::new(32, 4));
    builder.pml(PmlSettings {
        cells: 8,
        attenuation: 20.0,
    });
    builder.speaker(16.0, 16.0);
    builder.receiver(8.0, 8.0);
    builder.receiver(24.0, 20.0);
    let mut scene = builder.build()?;
    println!(
        "scene: {} domains, {} cells",
        scene.domain_count(),
        scene.cell_count()
    );

    // ─── Config ─────────────────────────────────────────────────
    let mut config = SolverConfig::from_toml(CONFIG)?;
    config.dt = SolverConfig::courant_dt(scene.grid_spacing(), 0.5, config.wave_speed);

    // ─── Sinks ──────────────────────────────────────────────────
    let out = std::env::temp_dir().join("pstd-quickstart");
    std::fs::create_dir_all(&out)?;
    let mut receivers = FileReceiverSink::for_scene(&out, &scene)?;
    let mut frames = PressureFrameWriter::new(out.join("frames"))?;

    let (mut progress, reports, _stop) = ChannelProgress::bounded(16);
    let printer = thread::spawn(move || {
        for report in reports {
            if report.status != ProgressStatus::Running {
                println!("[{:?}] {}", report.status, report.message);
            }
        }
    });

    // ─── Run ────────────────────────────────────────────────────
    let summary = run(
        &config,
        &mut scene,
        Arc::new(CentralDifference),
        &mut receivers,
        &mut frames,
        &mut progress,
    )?;
    drop(progress);
    let _ = printer.join();

    println!(
        "completed {} frames in {} us (dropped {} progress reports)",
        summary.frames_completed, summary.total_us, summary.dropped_progress
    );
    for receiver in scene.receivers() {
        let samples = FileReceiverSink::read_samples(receivers.path(receiver.id()))?;
        println!(
            "receiver {}: {} samples, last {:.6}",
            receiver.id(),
            samples.len(),
            samples.last().copied().unwrap_or(0.0)
        );
    }
    println!("output written to {}", out.display());
    Ok(())
}
