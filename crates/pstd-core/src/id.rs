//! Strongly-typed identifiers for domains, receivers, and workers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a domain within a scene.
///
/// Domains are registered with the scene builder and assigned sequential
/// IDs. `DomainId(n)` corresponds to the n-th registered domain, which is
/// also its position in the scene's registration order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DomainId(pub u32);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DomainId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a receiver (measurement point) within a scene.
///
/// Receivers are sampled and written in ascending ID order, which is
/// their registration order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ReceiverId(pub u32);

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ReceiverId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a worker in the distributed backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for WorkerId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
