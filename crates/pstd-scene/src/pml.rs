//! Perfectly matched layer absorption.
//!
//! A PML domain is an ordinary domain whose arrays are damped after every
//! frame. The damping factor depends only on the distance (in cells) from
//! the interface with the air domain it protects, growing quadratically
//! towards the outer edge.

use pstd_core::{FieldState, Orientation, Shape, Side};
use serde::{Deserialize, Serialize};

/// How to build the absorbing ring around air domains.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PmlSettings {
    /// Thickness of each layer in cells.
    pub cells: usize,
    /// Absorption strength at the outer edge.
    pub attenuation: f64,
}

impl Default for PmlSettings {
    fn default() -> Self {
        Self {
            cells: 50,
            attenuation: 20.0,
        }
    }
}

impl PmlSettings {
    /// The damping profile for a layer of this thickness.
    ///
    /// `factors[i]` multiplies cells `i` steps away from the interface.
    pub fn factors(&self) -> Vec<f64> {
        let n = self.cells as f64;
        (0..self.cells)
            .map(|i| {
                let depth = (i as f64 + 0.5) / n;
                (-self.attenuation * depth * depth).exp()
            })
            .collect()
    }
}

/// The absorption profile carried by one PML domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PmlProfile {
    /// Side of the PML domain that touches the air domain.
    pub interface: Side,
    /// Per-depth damping factors, interface first.
    pub factors: Vec<f64>,
}

impl PmlProfile {
    /// The direction this layer absorbs in.
    pub fn orientation(&self) -> Orientation {
        self.interface.orientation()
    }

    /// Damp the velocity and pressure component aligned with the
    /// absorbing direction, then re-sum `p0`.
    pub fn apply(&self, shape: Shape, state: &mut FieldState) {
        let depth_of = |row: usize, col: usize| match self.interface {
            Side::Left => col,
            Side::Right => shape.cols - 1 - col,
            Side::Top => row,
            Side::Bottom => shape.rows - 1 - row,
        };
        let (velocity, pressure) = match self.orientation() {
            Orientation::Horizontal => (&mut state.u0, &mut state.px0),
            Orientation::Vertical => (&mut state.w0, &mut state.pz0),
        };
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                let depth = depth_of(row, col);
                let factor = self.factors.get(depth).copied().unwrap_or(0.0);
                let i = shape.index(row, col);
                velocity[i] *= factor;
                pressure[i] *= factor;
            }
        }
        state.sum_pressure();
    }
}
