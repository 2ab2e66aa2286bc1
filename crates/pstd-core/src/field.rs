//! Fixed-schema field records carried by every domain.
//!
//! [`FieldState`] holds the five acoustic arrays (`u0`, `w0`, `px0`,
//! `pz0`, `p0`); a domain keeps one for the live state and one for the
//! per-frame snapshot. [`Derivatives`] holds the four spatial derivative
//! arrays produced by the derivative phase. All arrays are row-major with
//! `rows` along z and `cols` along x.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::axis::{Orientation, Quantity};

/// Dimensions of a domain's field arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    /// Number of rows (z extent).
    pub rows: usize,
    /// Number of columns (x extent).
    pub cols: usize,
}

impl Shape {
    /// Create a shape of `rows` × `cols`.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Returns `true` if the shape has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extent along an orientation (cols for horizontal, rows for vertical).
    pub fn extent(&self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Horizontal => self.cols,
            Orientation::Vertical => self.rows,
        }
    }

    /// Flat row-major index of `(row, col)`.
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// A cell position in global grid coordinates (x along columns, z along rows).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    /// Column coordinate.
    pub x: i64,
    /// Row coordinate.
    pub z: i64,
}

impl GridPoint {
    /// Create a grid point.
    pub fn new(x: i64, z: i64) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Names of the five state arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldName {
    /// Horizontal particle velocity.
    U0,
    /// Vertical particle velocity.
    W0,
    /// Horizontal pressure component.
    Px0,
    /// Vertical pressure component.
    Pz0,
    /// Total pressure, `px0 + pz0`.
    P0,
}

impl FieldName {
    /// All state arrays in storage order.
    pub const ALL: [FieldName; 5] = [
        FieldName::U0,
        FieldName::W0,
        FieldName::Px0,
        FieldName::Pz0,
        FieldName::P0,
    ];

    /// The array a derivative pass differentiates.
    ///
    /// Pressure passes read `p0`; velocity passes read the velocity
    /// component aligned with the orientation.
    pub fn for_pass(orientation: Orientation, quantity: Quantity) -> Self {
        match (orientation, quantity) {
            (_, Quantity::Pressure) => Self::P0,
            (Orientation::Horizontal, Quantity::Velocity) => Self::U0,
            (Orientation::Vertical, Quantity::Velocity) => Self::W0,
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::U0 => "u0",
            Self::W0 => "w0",
            Self::Px0 => "px0",
            Self::Pz0 => "pz0",
            Self::P0 => "p0",
        };
        f.write_str(s)
    }
}

/// The acoustic state of one domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    /// Horizontal particle velocity.
    pub u0: Vec<f64>,
    /// Vertical particle velocity.
    pub w0: Vec<f64>,
    /// Horizontal pressure component.
    pub px0: Vec<f64>,
    /// Vertical pressure component.
    pub pz0: Vec<f64>,
    /// Total pressure.
    pub p0: Vec<f64>,
}

impl FieldState {
    /// All arrays zero-filled for `shape`.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.len();
        Self {
            u0: vec![0.0; n],
            w0: vec![0.0; n],
            px0: vec![0.0; n],
            pz0: vec![0.0; n],
            p0: vec![0.0; n],
        }
    }

    /// Borrow one array by name.
    pub fn get(&self, name: FieldName) -> &[f64] {
        match name {
            FieldName::U0 => &self.u0,
            FieldName::W0 => &self.w0,
            FieldName::Px0 => &self.px0,
            FieldName::Pz0 => &self.pz0,
            FieldName::P0 => &self.p0,
        }
    }

    /// Mutably borrow one array by name.
    pub fn get_mut(&mut self, name: FieldName) -> &mut Vec<f64> {
        match name {
            FieldName::U0 => &mut self.u0,
            FieldName::W0 => &mut self.w0,
            FieldName::Px0 => &mut self.px0,
            FieldName::Pz0 => &mut self.pz0,
            FieldName::P0 => &mut self.p0,
        }
    }

    /// Overwrite every array with the contents of `other`.
    ///
    /// Reuses existing allocations where lengths agree.
    pub fn copy_from(&mut self, other: &FieldState) {
        self.u0.clone_from(&other.u0);
        self.w0.clone_from(&other.w0);
        self.px0.clone_from(&other.px0);
        self.pz0.clone_from(&other.pz0);
        self.p0.clone_from(&other.p0);
    }

    /// Set `p0 = px0 + pz0` element-wise.
    pub fn sum_pressure(&mut self) {
        for ((p, px), pz) in self.p0.iter_mut().zip(&self.px0).zip(&self.pz0) {
            *p = px + pz;
        }
    }

    /// Index of the first cell where `p0` differs from `px0 + pz0` by more
    /// than `tolerance` (scaled by the magnitude of the components).
    pub fn summation_violation(&self, tolerance: f64) -> Option<usize> {
        self.p0
            .iter()
            .zip(&self.px0)
            .zip(&self.pz0)
            .position(|((p, px), pz)| {
                let scale = px.abs().max(pz.abs()).max(1.0);
                (p - (px + pz)).abs() > tolerance * scale
            })
    }

    /// The first array (and cell) holding a NaN or infinity, if any.
    pub fn first_non_finite(&self) -> Option<(FieldName, usize)> {
        FieldName::ALL.iter().find_map(|&name| {
            self.get(name)
                .iter()
                .position(|v| !v.is_finite())
                .map(|i| (name, i))
        })
    }

    /// Returns `true` if every array has `shape.len()` elements.
    pub fn matches(&self, shape: Shape) -> bool {
        FieldName::ALL
            .iter()
            .all(|&name| self.get(name).len() == shape.len())
    }
}

/// The spatial derivatives computed for one domain in one sub-stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Derivatives {
    /// d(p0)/dx.
    pub lpx: Vec<f64>,
    /// d(p0)/dz.
    pub lpz: Vec<f64>,
    /// d(u0)/dx.
    pub lvx: Vec<f64>,
    /// d(w0)/dz.
    pub lvz: Vec<f64>,
}

impl Derivatives {
    /// All arrays zero-filled for `shape`.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.len();
        Self {
            lpx: vec![0.0; n],
            lpz: vec![0.0; n],
            lvx: vec![0.0; n],
            lvz: vec![0.0; n],
        }
    }

    /// Borrow the array written by a derivative pass.
    pub fn slot(&self, orientation: Orientation, quantity: Quantity) -> &[f64] {
        match (orientation, quantity) {
            (Orientation::Horizontal, Quantity::Pressure) => &self.lpx,
            (Orientation::Vertical, Quantity::Pressure) => &self.lpz,
            (Orientation::Horizontal, Quantity::Velocity) => &self.lvx,
            (Orientation::Vertical, Quantity::Velocity) => &self.lvz,
        }
    }

    /// Mutably borrow the array written by a derivative pass.
    pub fn slot_mut(&mut self, orientation: Orientation, quantity: Quantity) -> &mut Vec<f64> {
        match (orientation, quantity) {
            (Orientation::Horizontal, Quantity::Pressure) => &mut self.lpx,
            (Orientation::Vertical, Quantity::Pressure) => &mut self.lpz,
            (Orientation::Horizontal, Quantity::Velocity) => &mut self.lvx,
            (Orientation::Vertical, Quantity::Velocity) => &mut self.lvz,
        }
    }
}
