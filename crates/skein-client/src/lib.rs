//! skein-client: client-side cache reconciliation for skein change events.
//!
//! Mirrors a user's lists from the engine's change stream, drops stale and
//! duplicate deliveries, classifies propagated changes so the UI can render
//! them quietly, and tracks which derived views each change makes stale.
//!
//! # Conventions
//!
//! - **Errors**: reconciliation never fails; malformed events are logged
//!   with `tracing` and skipped.
//! - **Time**: callers pass receive time in, so the recency heuristic is
//!   testable without a clock.

pub mod cache;
pub mod reconcile;

pub use cache::{Dependency, DerivedViews, ListCache, ViewKey};
pub use reconcile::{CacheReconciler, Classification, Outcome};
