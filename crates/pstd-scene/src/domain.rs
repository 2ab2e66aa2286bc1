//! A rectangular sub-region of the scene and its field storage.

use indexmap::IndexMap;
use pstd_core::{Derivatives, DomainId, FieldState, GridPoint, Orientation, Shape, Side};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geometry::{Bounds, SharedBoundary};
use crate::pml::PmlProfile;

/// What kind of medium a domain models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    /// Propagating medium.
    Air,
    /// Reflecting wall. Arrays never change after construction.
    Rigid,
    /// Absorbing layer.
    Pml(PmlProfile),
}

/// A read-only copy of a domain's numerical data, as exchanged between
/// distributed workers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainSnapshot {
    /// Top-left cell in global grid coordinates.
    pub origin: GridPoint,
    /// Array shape.
    pub shape: Shape,
    /// Density.
    pub rho: f64,
    /// Whether the domain is a reflecting wall.
    pub rigid: bool,
    /// Current field arrays.
    pub fields: FieldState,
}

/// One rectangular domain.
///
/// Geometry, neighbours, and update flags are fixed at construction.
/// Rigid domains refuse mutable access to their arrays.
#[derive(Clone, Debug)]
pub struct Domain {
    id: DomainId,
    bounds: Bounds,
    rho: f64,
    kind: DomainKind,
    fields: FieldState,
    old: FieldState,
    derivatives: Derivatives,
    neighbours: IndexMap<DomainId, SharedBoundary>,
    update: [bool; 2],
}

impl Domain {
    pub(crate) fn new(id: DomainId, bounds: Bounds, rho: f64, kind: DomainKind) -> Self {
        let shape = bounds.shape;
        Self {
            id,
            bounds,
            rho,
            kind,
            fields: FieldState::zeros(shape),
            old: FieldState::zeros(shape),
            derivatives: Derivatives::zeros(shape),
            neighbours: IndexMap::new(),
            update: [false; 2],
        }
    }

    pub(crate) fn add_neighbour(&mut self, other: DomainId, boundary: SharedBoundary) {
        self.neighbours.insert(other, boundary);
    }

    pub(crate) fn set_update(&mut self, orientation: Orientation, flag: bool) {
        self.update[orientation.index()] = flag;
    }

    /// Domain identifier.
    pub fn id(&self) -> DomainId {
        self.id
    }

    /// Grid footprint.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Array shape.
    pub fn shape(&self) -> Shape {
        self.bounds.shape
    }

    /// Top-left cell in global grid coordinates.
    pub fn origin(&self) -> GridPoint {
        self.bounds.origin
    }

    /// Density.
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// Medium kind.
    pub fn kind(&self) -> &DomainKind {
        &self.kind
    }

    /// Returns `true` for reflecting walls.
    pub fn is_rigid(&self) -> bool {
        matches!(self.kind, DomainKind::Rigid)
    }

    /// Returns `true` for absorbing layers.
    pub fn is_pml(&self) -> bool {
        matches!(self.kind, DomainKind::Pml(_))
    }

    /// Whether derivatives along `orientation` are computed for this
    /// domain. Always `false` for rigid domains.
    pub fn should_update(&self, orientation: Orientation) -> bool {
        !self.is_rigid() && self.update[orientation.index()]
    }

    /// Live field arrays.
    pub fn fields(&self) -> &FieldState {
        &self.fields
    }

    /// Mutable live arrays, or `None` for rigid domains.
    pub fn fields_mut(&mut self) -> Option<&mut FieldState> {
        if self.is_rigid() {
            None
        } else {
            Some(&mut self.fields)
        }
    }

    /// The start-of-frame snapshot.
    pub fn old(&self) -> &FieldState {
        &self.old
    }

    /// Derivative arrays from the last derivative phase.
    pub fn derivatives(&self) -> &Derivatives {
        &self.derivatives
    }

    /// Mutable derivative arrays, or `None` for rigid domains.
    pub fn derivatives_mut(&mut self) -> Option<&mut Derivatives> {
        if self.is_rigid() {
            None
        } else {
            Some(&mut self.derivatives)
        }
    }

    /// Adjacent domains and the edge shared with each, in registration order.
    pub fn neighbours(&self) -> &IndexMap<DomainId, SharedBoundary> {
        &self.neighbours
    }

    /// Adjacent domains touching one side.
    pub fn neighbours_on(&self, side: Side) -> SmallVec<[DomainId; 4]> {
        self.neighbours
            .iter()
            .filter(|(_, b)| b.side == side)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Copy the live arrays into the snapshot.
    pub fn push_values(&mut self) {
        if !self.is_rigid() {
            self.old.copy_from(&self.fields);
        }
    }

    /// Discard the live arrays in favour of the snapshot.
    pub fn restore_snapshot(&mut self) {
        if !self.is_rigid() {
            self.fields.copy_from(&self.old);
        }
    }

    /// Set `p0 = px0 + pz0`.
    pub fn sum_pressure(&mut self) {
        if !self.is_rigid() {
            self.fields.sum_pressure();
        }
    }

    /// Apply PML damping. No-op for other kinds.
    pub fn apply_absorption(&mut self) {
        if let DomainKind::Pml(profile) = &self.kind {
            profile.apply(self.bounds.shape, &mut self.fields);
        }
    }

    /// Copy of the numerical data for exchange.
    pub fn snapshot(&self) -> DomainSnapshot {
        DomainSnapshot {
            origin: self.bounds.origin,
            shape: self.bounds.shape,
            rho: self.rho,
            rigid: self.is_rigid(),
            fields: self.fields.clone(),
        }
    }

    /// Replace the live arrays with received data. Ignored for rigid
    /// domains and for data of the wrong shape; returns whether the data
    /// was taken.
    pub fn load_fields(&mut self, fields: &FieldState) -> bool {
        if self.is_rigid() || !fields.matches(self.bounds.shape) {
            return false;
        }
        self.fields.copy_from(fields);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn air() -> Domain {
        let mut d = Domain::new(
            DomainId(0),
            Bounds::new(GridPoint::new(0, 0), Shape::new(2, 2)),
            1.2,
            DomainKind::Air,
        );
        d.set_update(Orientation::Horizontal, true);
        d.set_update(Orientation::Vertical, true);
        d
    }

    #[test]
    fn rigid_domains_refuse_mutation() {
        let mut d = Domain::new(
            DomainId(1),
            Bounds::new(GridPoint::new(0, 0), Shape::new(1, 1)),
            1e200,
            DomainKind::Rigid,
        );
        d.set_update(Orientation::Horizontal, true);
        assert!(d.fields_mut().is_none());
        assert!(d.derivatives_mut().is_none());
        assert!(!d.should_update(Orientation::Horizontal));
        let mut other = FieldState::zeros(Shape::new(1, 1));
        other.p0[0] = 3.0;
        assert!(!d.load_fields(&other));
        assert_eq!(d.fields().p0, vec![0.0]);
    }

    #[test]
    fn snapshot_restores_start_of_frame_state() {
        let mut d = air();
        d.fields_mut().unwrap().p0[1] = 4.0;
        d.push_values();
        d.fields_mut().unwrap().p0[1] = -7.0;
        d.restore_snapshot();
        assert_eq!(d.fields().p0[1], 4.0);
        assert_eq!(d.old().p0[1], 4.0);
    }

    #[test]
    fn load_fields_checks_shape() {
        let mut d = air();
        assert!(!d.load_fields(&FieldState::zeros(Shape::new(3, 3))));
        let mut f = FieldState::zeros(Shape::new(2, 2));
        f.u0[0] = 1.0;
        assert!(d.load_fields(&f));
        assert_eq!(d.snapshot().fields, f);
    }
}
