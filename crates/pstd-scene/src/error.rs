//! Error types for scene construction.

use pstd_core::{DomainId, GridPoint, ReceiverId};

/// Errors arising from [`SceneBuilder::build`](crate::SceneBuilder::build).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SceneError {
    /// The scene contains no domains.
    #[error("scene has no domains")]
    Empty,
    /// The grid spacing is zero, negative, or non-finite.
    #[error("grid spacing must be positive and finite, got {value}")]
    InvalidGridSpacing {
        /// The rejected spacing.
        value: f64,
    },
    /// A domain has zero rows or columns.
    #[error("domain {domain} has an empty shape")]
    EmptyDomain {
        /// The offending domain.
        domain: DomainId,
    },
    /// A domain's density is zero, negative, or non-finite.
    #[error("domain {domain}: density must be positive and finite, got {value}")]
    InvalidDensity {
        /// The offending domain.
        domain: DomainId,
        /// The rejected density.
        value: f64,
    },
    /// Two domains claim the same cell.
    #[error("domains {first} and {second} overlap")]
    Overlap {
        /// The earlier-registered domain.
        first: DomainId,
        /// The later-registered domain.
        second: DomainId,
    },
    /// A receiver is not inside any non-rigid domain.
    #[error("receiver {receiver} at {cell} is outside every non-rigid domain")]
    ReceiverOutside {
        /// The offending receiver.
        receiver: ReceiverId,
        /// The cell the receiver maps to.
        cell: GridPoint,
    },
    /// A receiver or speaker coordinate is non-finite.
    #[error("non-finite coordinate ({x}, {z})")]
    InvalidLocation {
        /// x coordinate in grid cells.
        x: f64,
        /// z coordinate in grid cells.
        z: f64,
    },
    /// PML settings are unusable.
    #[error("invalid PML settings: {reason}")]
    InvalidPml {
        /// Description of the problem.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_names_both_domains() {
        let err = SceneError::Overlap {
            first: DomainId(0),
            second: DomainId(3),
        };
        assert_eq!(err.to_string(), "domains 0 and 3 overlap");
    }
}
