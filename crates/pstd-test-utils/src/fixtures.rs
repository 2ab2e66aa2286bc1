//! Small reference scenes.
//!
//! Every fixture uses a grid spacing of 0.2 m, seeds a speaker pulse, and
//! places receivers at domain centres so samples are non-zero from the
//! first frame.

use pstd_core::{GridPoint, Shape};
use pstd_scene::{PmlSettings, Scene, SceneBuilder};

/// Grid spacing used by every fixture.
pub const GRID_SPACING: f64 = 0.2;

fn centre(origin: GridPoint, shape: Shape) -> (f64, f64) {
    (
        origin.x as f64 + (shape.cols / 2) as f64,
        origin.z as f64 + (shape.rows / 2) as f64,
    )
}

/// A rigid domain (id 0) with an air domain (id 1) directly to its right.
///
/// Both are `rows x cols`. One receiver and one speaker sit at the air
/// domain's centre.
pub fn rigid_and_air(rows: usize, cols: usize) -> Scene {
    let shape = Shape::new(rows, cols);
    let air_origin = GridPoint::new(cols as i64, 0);
    let mut b = SceneBuilder::new(GRID_SPACING);
    b.rigid(GridPoint::new(0, 0), shape);
    b.domain(air_origin, shape);
    let (x, z) = centre(air_origin, shape);
    b.receiver(x, z);
    b.speaker(x, z);
    b.build().expect("rigid_and_air fixture is valid")
}

/// `n` air domains of `rows x cols` side by side along x.
///
/// The speaker is at the centre of domain 0; receiver `i` is at the
/// centre of domain `i`.
pub fn strip(n: usize, rows: usize, cols: usize) -> Scene {
    let shape = Shape::new(rows, cols);
    let mut b = SceneBuilder::new(GRID_SPACING);
    for i in 0..n {
        let origin = GridPoint::new((i * cols) as i64, 0);
        b.domain(origin, shape);
        let (x, z) = centre(origin, shape);
        b.receiver(x, z);
    }
    let (x, z) = centre(GridPoint::new(0, 0), shape);
    b.speaker(x, z);
    b.build().expect("strip fixture is valid")
}

/// An 8x8 air room with a rigid wall along its right edge and a 4-cell
/// absorbing ring on the remaining free sides.
pub fn room_with_pml() -> Scene {
    let room = Shape::new(8, 8);
    let mut b = SceneBuilder::new(GRID_SPACING);
    b.domain(GridPoint::new(0, 0), room);
    b.rigid(GridPoint::new(8, 0), Shape::new(8, 2));
    b.pml(PmlSettings {
        cells: 4,
        attenuation: 20.0,
    });
    let (x, z) = centre(GridPoint::new(0, 0), room);
    b.speaker(x, z);
    b.receiver(x, z);
    b.receiver(1.0, 6.0);
    b.build().expect("room_with_pml fixture is valid")
}
