//! skein-core: typed lists whose items link across lists into one DAG.
//!
//! Items carry directed parent→child links that may cross list boundaries.
//! The engine keeps the link graph acyclic, applies link batches with
//! partial success, propagates completion flips through all transitive
//! children atomically, and publishes a change event per touched entity
//! after each commit.
//!
//! # Conventions
//!
//! - **Errors**: engine operations return [`error::Result`]; rejected link
//!   proposals are data, not errors.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).
//! - **Time**: microsecond wall-clock timestamps, read once per operation.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod event;
pub mod graph;
pub mod link;
pub mod model;
pub mod propagate;
pub mod time;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, ErrorCode, IntegrityFault, Result};
pub use event::{Cause, ChangeEvent, ChangeEventBus, ChangeKind, Scope};
pub use link::{LinkOutcome, RejectReason, RejectedLink, Validation};
pub use model::{Item, ItemId, LinkedItemRow, LinkedItems, List, ListId, ListType, UserId};
pub use propagate::{AffectedItem, FieldChanges, PropagatedUpdate, PropagationOutcome};
