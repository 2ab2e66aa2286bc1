//! The assembled scene.

use pstd_core::{DomainId, ReceiverId};

use crate::domain::Domain;
use crate::receiver::Receiver;
use crate::speaker::Speaker;

/// A validated set of domains and receivers on one grid.
///
/// Domain ids equal their registration index. Topology is fixed; only
/// field arrays change once the scene is built.
#[derive(Clone, Debug)]
pub struct Scene {
    pub(crate) grid_spacing: f64,
    pub(crate) domains: Vec<Domain>,
    pub(crate) receivers: Vec<Receiver>,
    pub(crate) speakers: Vec<Speaker>,
}

impl Scene {
    /// Physical size of one grid cell, in metres.
    pub fn grid_spacing(&self) -> f64 {
        self.grid_spacing
    }

    /// All domains in registration order.
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// All domains, mutably. Topology accessors stay read-only.
    pub fn domains_mut(&mut self) -> &mut [Domain] {
        &mut self.domains
    }

    /// Look up a domain.
    pub fn domain(&self, id: DomainId) -> Option<&Domain> {
        self.domains.get(id.0 as usize)
    }

    /// Look up a domain mutably.
    pub fn domain_mut(&mut self, id: DomainId) -> Option<&mut Domain> {
        self.domains.get_mut(id.0 as usize)
    }

    /// Number of domains.
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// Total cells across all domains.
    pub fn cell_count(&self) -> usize {
        self.domains.iter().map(|d| d.shape().len()).sum()
    }

    /// Receivers in registration order.
    pub fn receivers(&self) -> &[Receiver] {
        &self.receivers
    }

    /// Look up a receiver.
    pub fn receiver(&self, id: ReceiverId) -> Option<&Receiver> {
        self.receivers.get(id.0 as usize)
    }

    /// Speakers that seeded the initial pressure.
    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    /// Snapshot every domain's live arrays.
    pub fn push_values(&mut self) {
        self.domains.iter_mut().for_each(Domain::push_values);
    }

    /// Roll every domain back to its snapshot.
    pub fn restore_snapshot(&mut self) {
        self.domains.iter_mut().for_each(Domain::restore_snapshot);
    }

    /// Re-establish `p0 = px0 + pz0` in every non-rigid domain.
    pub fn sum_pressure(&mut self) {
        self.domains.iter_mut().for_each(Domain::sum_pressure);
    }

    /// Damp every PML domain.
    pub fn apply_boundary_absorption(&mut self) {
        self.domains.iter_mut().for_each(Domain::apply_absorption);
    }

    /// One sample per receiver, in receiver order.
    pub fn sample_receivers(&self) -> Vec<(ReceiverId, f32)> {
        self.receivers
            .iter()
            .map(|r| (r.id(), r.sample(self)))
            .collect()
    }

    /// The first non-rigid domain (and cell) where `p0 != px0 + pz0`.
    pub fn summation_violation(&self, tolerance: f64) -> Option<(DomainId, usize)> {
        self.domains
            .iter()
            .filter(|d| !d.is_rigid())
            .find_map(|d| d.fields().summation_violation(tolerance).map(|i| (d.id(), i)))
    }
}
