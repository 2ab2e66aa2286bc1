//! Test operators and scene fixtures for PSTD development.
//!
//! The spectral derivative is an external collaborator, so tests run the
//! engine with deterministic stand-ins:
//!
//! - [`LinearDerivative`]: second-order central differences that continue
//!   across air neighbours and mirror at walls.
//! - [`FailingDerivative`]: fails (or panics) for one domain after N calls.
//! - [`CountingDerivative`]: counts calls per domain.
//!
//! [`fixtures`] builds the small scenes the engine tests share.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use pstd_core::{
    DerivativeInput, DerivativeOperator, DomainId, GridPoint, OperatorError, Orientation,
};

/// Central differences over two cells.
///
/// Cells beyond the domain edge are read from a non-rigid neighbour when
/// one covers them; otherwise the edge value is mirrored.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearDerivative;

impl LinearDerivative {
    fn outside(input: &DerivativeInput, row: usize, col: usize, lower: bool) -> Option<f64> {
        let (dx, dz) = match (input.orientation, lower) {
            (Orientation::Horizontal, true) => (-1, 0),
            (Orientation::Horizontal, false) => (1, 0),
            (Orientation::Vertical, true) => (0, -1),
            (Orientation::Vertical, false) => (0, 1),
        };
        let cell = GridPoint::new(
            input.origin.x + col as i64 + dx,
            input.origin.z + row as i64 + dz,
        );
        let [low, high] = input.orientation.sides();
        let side = if lower { low } else { high };
        input
            .neighbours_on(side)
            .filter(|n| !n.rigid)
            .find_map(|n| n.value_at(cell))
    }
}

impl DerivativeOperator for LinearDerivative {
    fn name(&self) -> &str {
        "linear"
    }

    fn derive(&self, input: &DerivativeInput) -> Result<Vec<f64>, OperatorError> {
        let shape = input.shape;
        if input.field.len() != shape.len() {
            return Err(OperatorError::new(format!(
                "field has {} values for a {}x{} domain",
                input.field.len(),
                shape.rows,
                shape.cols
            )));
        }
        let horizontal = input.orientation == Orientation::Horizontal;
        let scale = 1.0 / (2.0 * input.grid_spacing);
        let mut out = vec![0.0; shape.len()];
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                let here = input.field[shape.index(row, col)];
                let (at_low, at_high) = if horizontal {
                    (col == 0, col + 1 == shape.cols)
                } else {
                    (row == 0, row + 1 == shape.rows)
                };
                let low = if at_low {
                    Self::outside(input, row, col, true).unwrap_or(here)
                } else if horizontal {
                    input.field[shape.index(row, col - 1)]
                } else {
                    input.field[shape.index(row - 1, col)]
                };
                let high = if at_high {
                    Self::outside(input, row, col, false).unwrap_or(here)
                } else if horizontal {
                    input.field[shape.index(row, col + 1)]
                } else {
                    input.field[shape.index(row + 1, col)]
                };
                out[shape.index(row, col)] = (high - low) * scale;
            }
        }
        Ok(out)
    }
}

/// Behaves like [`LinearDerivative`] until `fail_after` calls for the
/// target domain have succeeded, then fails every later call for it.
pub struct FailingDerivative {
    target: DomainId,
    fail_after: usize,
    panics: bool,
    calls: AtomicUsize,
}

impl FailingDerivative {
    /// Return an [`OperatorError`] from call `fail_after` on.
    pub fn new(target: DomainId, fail_after: usize) -> Self {
        Self {
            target,
            fail_after,
            panics: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Panic from call `fail_after` on.
    pub fn panicking(target: DomainId, fail_after: usize) -> Self {
        Self {
            panics: true,
            ..Self::new(target, fail_after)
        }
    }

    /// Calls made for the target domain so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DerivativeOperator for FailingDerivative {
    fn name(&self) -> &str {
        "failing"
    }

    fn derive(&self, input: &DerivativeInput) -> Result<Vec<f64>, OperatorError> {
        if input.domain == self.target {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n >= self.fail_after {
                if self.panics {
                    panic!("injected panic in domain {}", input.domain);
                }
                return Err(OperatorError::new(format!(
                    "injected failure after {} calls",
                    self.fail_after
                )));
            }
        }
        LinearDerivative.derive(input)
    }
}

/// [`LinearDerivative`] that records how often each domain was derived.
#[derive(Default)]
pub struct CountingDerivative {
    calls: Mutex<Vec<DomainId>>,
}

impl CountingDerivative {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total calls so far.
    pub fn calls(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Calls made for `domain` so far.
    pub fn calls_for(&self, domain: DomainId) -> usize {
        self.calls
            .lock()
            .map(|c| c.iter().filter(|&&d| d == domain).count())
            .unwrap_or(0)
    }
}

impl DerivativeOperator for CountingDerivative {
    fn name(&self) -> &str {
        "counting"
    }

    fn derive(&self, input: &DerivativeInput) -> Result<Vec<f64>, OperatorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(input.domain);
        }
        LinearDerivative.derive(input)
    }
}
