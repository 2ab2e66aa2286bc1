//! Initial-condition pressure pulses.

use pstd_core::FieldState;
use serde::{Deserialize, Serialize};

use crate::geometry::Bounds;

/// A point source contributing a Gaussian pulse to the initial pressure.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    /// x location in grid cells.
    pub x: f64,
    /// z location in grid cells.
    pub z: f64,
}

impl Speaker {
    /// Pulse amplitude at a distance (in metres) from the speaker.
    pub fn amplitude(distance: f64, bandwidth: f64) -> f64 {
        (-bandwidth * distance * distance).exp()
    }

    /// Add this speaker's pulse to `p0` and `px0` of a domain.
    ///
    /// Cell `(row, col)` is taken at its integer grid position.
    pub fn apply(&self, bounds: Bounds, grid_spacing: f64, bandwidth: f64, state: &mut FieldState) {
        let shape = bounds.shape;
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                let dx = (bounds.origin.x + col as i64) as f64 - self.x;
                let dz = (bounds.origin.z + row as i64) as f64 - self.z;
                let distance = dx.hypot(dz) * grid_spacing;
                let value = Self::amplitude(distance, bandwidth);
                let i = shape.index(row, col);
                state.p0[i] += value;
                state.px0[i] += value;
            }
        }
    }
}
