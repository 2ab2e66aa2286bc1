//! Pressure receivers.

use pstd_core::{DomainId, GridPoint, ReceiverId};
use serde::{Deserialize, Serialize};

use crate::scene::Scene;

/// A point that records pressure once per frame.
///
/// Locations are in grid cells; sampling uses the nearest cell at or
/// below the location (floor on both axes).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    id: ReceiverId,
    x: f64,
    z: f64,
    cell: GridPoint,
    container: DomainId,
}

impl Receiver {
    pub(crate) fn new(id: ReceiverId, x: f64, z: f64, container: DomainId) -> Self {
        Self {
            id,
            x,
            z,
            cell: Self::cell_of(x, z),
            container,
        }
    }

    pub(crate) fn cell_of(x: f64, z: f64) -> GridPoint {
        GridPoint::new(x.floor() as i64, z.floor() as i64)
    }

    /// Receiver identifier.
    pub fn id(&self) -> ReceiverId {
        self.id
    }

    /// Location in grid cells.
    pub fn location(&self) -> (f64, f64) {
        (self.x, self.z)
    }

    /// The sampled cell.
    pub fn cell(&self) -> GridPoint {
        self.cell
    }

    /// The domain containing the sampled cell.
    pub fn container(&self) -> DomainId {
        self.container
    }

    /// Current pressure at the receiver, as single precision.
    ///
    /// Returns `0.0` if the container no longer exists in `scene`.
    pub fn sample(&self, scene: &Scene) -> f32 {
        let Some(domain) = scene.domain(self.container) else {
            return 0.0;
        };
        let origin = domain.origin();
        let row = (self.cell.z - origin.z) as usize;
        let col = (self.cell.x - origin.x) as usize;
        let index = domain.shape().index(row, col);
        domain.fields().p0.get(index).copied().unwrap_or(0.0) as f32
    }
}
