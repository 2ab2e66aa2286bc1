//! Scene model for PSTD simulations.
//!
//! A [`Scene`] is a set of rectangular [`Domain`]s on a shared grid plus
//! the [`Receiver`]s that sample it. Scenes are assembled with
//! [`SceneBuilder`], which derives the neighbour topology, the per-domain
//! update flags, and the optional PML ring before the run starts. After
//! construction only field arrays change.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod pml;
pub mod receiver;
pub mod scene;
pub mod speaker;

pub use builder::SceneBuilder;
pub use domain::{Domain, DomainKind, DomainSnapshot};
pub use error::SceneError;
pub use geometry::{Bounds, SharedBoundary};
pub use pml::{PmlProfile, PmlSettings};
pub use receiver::Receiver;
pub use scene::Scene;
pub use speaker::Speaker;
