//! PSTD: pseudo-spectral time-domain acoustic simulation.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the PSTD sub-crates. For most users, adding `pstd` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use pstd::prelude::*;
//!
//! // An operator that reports a flat field everywhere.
//! struct Flat;
//! impl DerivativeOperator for Flat {
//!     fn name(&self) -> &str { "flat" }
//!     fn derive(&self, input: &DerivativeInput) -> Result<Vec<f64>, OperatorError> {
//!         Ok(vec![0.0; input.shape.len()])
//!     }
//! }
//!
//! let mut builder = SceneBuilder::new(0.2);
//! builder.rigid(GridPoint::new(0, 0), Shape::new(8, 8));
//! builder.domain(GridPoint::new(8, 0), Shape::new(8, 8));
//! builder.speaker(12.0, 4.0);
//! let receiver = builder.receiver(12.0, 4.0);
//! let mut scene = builder.build().unwrap();
//!
//! let config = SolverConfig { frame_count: 3, ..SolverConfig::default() };
//! let mut samples = MemoryReceiverSink::new();
//! let summary = pstd::engine::run(
//!     &config,
//!     &mut scene,
//!     Arc::new(Flat),
//!     &mut samples,
//!     &mut NoCheckpoints,
//!     &mut |_: &ProgressReport| ProgressControl::Continue,
//! )
//! .unwrap();
//! assert_eq!(summary.frames_completed, 3);
//! assert_eq!(samples.samples(receiver).len(), 3);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `pstd-core` | IDs, field records, derivative operator trait, errors |
//! | [`scene`] | `pstd-scene` | Domains, scene builder, receivers, speakers, PML |
//! | [`engine`] | `pstd-engine` | Config, backends, scheduler, sinks, progress |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`pstd-core`).
///
/// Contains the field records every domain carries, the
/// [`types::DerivativeOperator`] extension point, and the error taxonomy.
pub use pstd_core as types;

/// Scene model (`pstd-scene`).
///
/// Build a [`scene::Scene`] with [`scene::SceneBuilder`].
pub use pstd_scene as scene;

/// Scheduler and execution backends (`pstd-engine`).
///
/// [`engine::TimeStepScheduler`] drives frames on any
/// [`engine::ExecutionBackend`]; [`engine::run`] picks the backend from
/// the configuration.
pub use pstd_engine as engine;

/// Common imports for typical PSTD usage.
///
/// ```rust
/// use pstd::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use pstd_core::{
        DerivativeInput, DerivativeOperator, DomainId, FieldState, GridPoint, Orientation,
        Quantity, ReceiverId, Shape,
    };

    // Errors
    pub use pstd_core::{DependencyError, DomainError, OperatorError, ResourceError};
    pub use pstd_engine::{ConfigError, PhaseError, RunError};
    pub use pstd_scene::SceneError;

    // Scene
    pub use pstd_scene::{PmlSettings, Scene, SceneBuilder};

    // Engine
    pub use pstd_engine::{
        backend_for, BackendKind, ChannelProgress, CheckpointSink, ExecutionBackend,
        FileReceiverSink, MemoryReceiverSink, NoCheckpoints, PressureFrameWriter, ProgressControl,
        ProgressReport, ProgressSink, ProgressStatus, ReceiverSink, RunSummary, SolverConfig,
        TimeStepScheduler,
    };
}
