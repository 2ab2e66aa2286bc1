//! Core types and traits for the PSTD time-integration engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions shared by the scene model and the
//! scheduler: identifiers, the fixed-schema field records every domain
//! carries, the derivative-operator capability, and the error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod axis;
pub mod error;
pub mod field;
pub mod id;
pub mod traits;

pub use axis::{Orientation, Quantity, Side, DERIVATIVE_PASSES};
pub use error::{DependencyError, DomainError, OperatorError, Phase, ResourceError};
pub use field::{Derivatives, FieldName, FieldState, GridPoint, Shape};
pub use id::{DomainId, ReceiverId, WorkerId};
pub use traits::{DerivativeInput, DerivativeOperator, NeighbourSlab};
