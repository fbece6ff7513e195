//! # pallet-swap
//!
//! Locator rebuild-and-hot-swap orchestration.
//!
//! Call [`pipeline::plan`] to resolve which artifacts are dirty, then
//! [`pipeline::execute`] to rebuild, gate, and distribute them, or
//! [`pipeline::run`] to do both with the configured engine and channels and
//! journal the result.

pub mod engine;
pub mod error;
pub mod fanout;
pub mod fileset;
pub mod gate;
pub mod journal;
pub mod pipeline;
pub mod rebuild;
pub mod report;
pub mod resolver;
pub mod staging;

pub use engine::{CommandEngine, RebuildEngine};
pub use error::{EngineError, GateError, SwapError};
pub use gate::{ArcGisAdminChannel, GateCoordinator, ServiceChannel};
pub use pipeline::{CompletedRun, RunPlan, RunSettings};
pub use report::{
    ArtifactOutcome, ArtifactReport, DeliveryStatus, DestinationResult, RunReport, ToggleResult,
    ToggleStatus,
};
