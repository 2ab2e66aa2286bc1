//! Benchmark scenes and configurations for the PSTD engine.
//!
//! - [`reference_scene`]: 4x4 tiles of 32x32 air cells (16K cells) in a PML ring
//! - [`stress_scene`]: 8x8 tiles of 48x48 air cells (~147K cells)
//! - [`reference_config`]: frame count and backend for one benchmark run

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use pstd_core::{GridPoint, Shape};
use pstd_engine::{BackendKind, SolverConfig};
use pstd_scene::{PmlSettings, Scene, SceneBuilder, SceneError};

/// Grid spacing of the benchmark scenes, in metres.
pub const GRID_SPACING: f64 = 0.2;

/// A `tiles x tiles` block of `size x size` air domains with a rigid
/// pillar on the right, a speaker in the middle, and a PML ring.
pub fn tiled_scene(tiles: usize, size: usize) -> Result<Scene, SceneError> {
    let shape = Shape::new(size, size);
    let extent = (tiles * size) as i64;
    let mut b = SceneBuilder::new(GRID_SPACING);
    for row in 0..tiles {
        for col in 0..tiles {
            b.domain(
                GridPoint::new((col * size) as i64, (row * size) as i64),
                shape,
            );
        }
    }
    b.rigid(GridPoint::new(extent, 0), Shape::new(tiles * size, 4));
    b.pml(PmlSettings {
        cells: 16,
        attenuation: 20.0,
    });
    let centre = extent as f64 / 2.0;
    b.speaker(centre, centre);
    b.receiver(centre / 2.0, centre / 2.0);
    b.receiver(centre * 1.5, centre);
    b.build()
}

/// 16K-cell reference scene.
pub fn reference_scene() -> Result<Scene, SceneError> {
    tiled_scene(4, 32)
}

/// ~147K-cell stress scene.
pub fn stress_scene() -> Result<Scene, SceneError> {
    tiled_scene(8, 48)
}

/// `frames` frames on `backend` with a CFL-0.5 time step.
pub fn reference_config(backend: BackendKind, frames: u64) -> SolverConfig {
    let wave_speed = 340.0;
    SolverConfig {
        frame_count: frames,
        dt: SolverConfig::courant_dt(GRID_SPACING, 0.5, wave_speed),
        wave_speed,
        backend,
        pool_size: Some(4),
        worker_count: Some(4),
        ..SolverConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_scene_builds() {
        let scene = reference_scene().unwrap();
        // 16 tiles, 1 pillar, and a PML layer on every free tile side.
        assert!(scene.domain_count() > 17);
        assert_eq!(scene.receivers().len(), 2);
    }

    #[test]
    fn reference_config_is_valid() {
        for kind in [BackendKind::Sequential, BackendKind::Distributed] {
            assert!(reference_config(kind, 10).validate().is_ok());
        }
    }
}
