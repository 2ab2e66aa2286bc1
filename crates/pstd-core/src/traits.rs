//! The [`DerivativeOperator`] capability and its owned input record.
//!
//! The spectral derivative itself is an external collaborator: the engine
//! hands an operator one [`DerivativeInput`] per (orientation, quantity)
//! pass and stores whatever array it returns. Inputs are owned and
//! serializable so the same record can cross a thread, process, or
//! device boundary unchanged.

use serde::{Deserialize, Serialize};

use crate::axis::{Orientation, Quantity, Side};
use crate::error::OperatorError;
use crate::field::{GridPoint, Shape};
use crate::id::DomainId;

/// A neighbour's copy of the differentiated array, for continuing the
/// derivative across a shared edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighbourSlab {
    /// The neighbouring domain.
    pub domain: DomainId,
    /// Which side of the requesting domain the neighbour touches.
    pub side: Side,
    /// Top-left cell of the neighbour in global grid coordinates.
    pub origin: GridPoint,
    /// The neighbour's array shape.
    pub shape: Shape,
    /// The neighbour's density.
    pub rho: f64,
    /// Rigid neighbours act as reflecting walls.
    pub rigid: bool,
    /// The neighbour's copy of the differentiated array (row-major).
    pub field: Vec<f64>,
}

impl NeighbourSlab {
    /// Value at a global grid cell, or `None` if the cell is outside the
    /// neighbour.
    pub fn value_at(&self, cell: GridPoint) -> Option<f64> {
        let col = cell.x - self.origin.x;
        let row = cell.z - self.origin.z;
        if col < 0 || row < 0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.shape.rows || col >= self.shape.cols {
            return None;
        }
        self.field.get(self.shape.index(row, col)).copied()
    }
}

/// Everything one derivative pass over one domain needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivativeInput {
    /// The domain being differentiated.
    pub domain: DomainId,
    /// Top-left cell of the domain in global grid coordinates.
    pub origin: GridPoint,
    /// The domain's array shape.
    pub shape: Shape,
    /// Direction of the derivative.
    pub orientation: Orientation,
    /// Quantity being differentiated.
    pub quantity: Quantity,
    /// The domain's density.
    pub rho: f64,
    /// Physical size of one grid cell, in metres.
    pub grid_spacing: f64,
    /// The differentiated array (row-major).
    pub field: Vec<f64>,
    /// Neighbours across the two sides this orientation crosses.
    pub neighbours: Vec<NeighbourSlab>,
}

impl DerivativeInput {
    /// Neighbours touching one side, in registration order.
    pub fn neighbours_on(&self, side: Side) -> impl Iterator<Item = &NeighbourSlab> {
        self.neighbours.iter().filter(move |n| n.side == side)
    }
}

/// Computes one spatial derivative of one domain.
///
/// # Contract
///
/// - `derive()` MUST be a pure function of its input: the engine calls it
///   concurrently for different domains and relies on identical inputs
///   producing identical outputs on every backend.
/// - The returned array has `input.shape.len()` elements and holds the
///   real projection of the operator's (possibly complex) result.
///
/// # Object safety
///
/// This trait is object-safe; backends share operators as
/// `Arc<dyn DerivativeOperator>`.
pub trait DerivativeOperator: Send + Sync + 'static {
    /// Human-readable name for logging and error reporting.
    fn name(&self) -> &str;

    /// Compute the derivative described by `input`.
    fn derive(&self, input: &DerivativeInput) -> Result<Vec<f64>, OperatorError>;
}
