//! Error taxonomy for the link graph engine.
//!
//! Three distinct failure classes, per the engine contract:
//!
//! - **Rejection reasons** (self link, cycle, not found, cross user, limit)
//!   are expected, user-facing outcomes. They travel as *data* inside
//!   validation/mutation results ([`crate::link::RejectReason`]) and never
//!   appear in this module's error types.
//! - **Transactional faults** ([`EngineError::Storage`]) are fatal to the
//!   single operation; the surrounding transaction rolls back and no partial
//!   effect is observable.
//! - **Consistency faults** ([`EngineError::Integrity`]) mean the stored
//!   graph violates an invariant (dangling edge, cycle at rest). They are
//!   logged at `error!` by the detecting code path and surfaced distinctly
//!   from ordinary rejections.

use std::fmt;

use crate::model::{ItemId, ListId};

/// Machine-readable error codes for client-side decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ItemNotFound,
    ListNotFound,
    CycleDetected,
    SelfLink,
    CrossUser,
    LinkLimitExceeded,
    DanglingEdge,
    CyclicStore,
    StorageFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ItemNotFound => "E2001",
            Self::ListNotFound => "E2002",
            Self::CycleDetected => "E2003",
            Self::SelfLink => "E2004",
            Self::CrossUser => "E2005",
            Self::LinkLimitExceeded => "E2006",
            Self::DanglingEdge => "E3001",
            Self::CyclicStore => "E3002",
            Self::StorageFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ItemNotFound => "Item not found",
            Self::ListNotFound => "List not found",
            Self::CycleDetected => "Link would create a circular dependency",
            Self::SelfLink => "Item cannot link to itself",
            Self::CrossUser => "Linked lists are not visible to this user",
            Self::LinkLimitExceeded => "Too many child links in one batch",
            Self::DanglingEdge => "Link points at a missing item",
            Self::CyclicStore => "Stored link graph contains a cycle",
            Self::StorageFailed => "Storage operation failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint surfaced alongside the message.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ItemNotFound | Self::ListNotFound => None,
            Self::CycleDetected => Some("Remove the reverse link first, then retry."),
            Self::SelfLink => Some("Pick a different child item."),
            Self::CrossUser => Some("Share both lists with the acting user first."),
            Self::LinkLimitExceeded => Some("Split the links across smaller batches."),
            Self::DanglingEdge | Self::CyclicStore => {
                Some("Run an integrity sweep; the store needs repair.")
            }
            Self::StorageFailed => Some("Check disk space and retry; the operation rolled back."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A stored-graph invariant violation.
///
/// These indicate corrupted state, not a rejected request: a correctly
/// operating mutator can never produce either variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityFault {
    /// An edge references an item that no longer exists.
    DanglingEdge { parent: ItemId, child: ItemId },
    /// The stored children relation contains a directed cycle.
    CyclicStore { path: Vec<ItemId> },
}

impl fmt::Display for IntegrityFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingEdge { parent, child } => {
                write!(f, "dangling edge {parent} -> {child}")
            }
            Self::CyclicStore { path } => {
                let rendered: Vec<&str> = path.iter().map(ItemId::as_str).collect();
                write!(f, "stored cycle: {}", rendered.join(" -> "))
            }
        }
    }
}

impl IntegrityFault {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::DanglingEdge { .. } => ErrorCode::DanglingEdge,
            Self::CyclicStore { .. } => ErrorCode::CyclicStore,
        }
    }
}

/// Fatal errors from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("list not found: {0}")]
    ListNotFound(ListId),

    #[error("data integrity fault: {0}")]
    Integrity(IntegrityFault),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl EngineError {
    /// The machine-readable code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ItemNotFound(_) => ErrorCode::ItemNotFound,
            Self::ListNotFound(_) => ErrorCode::ListNotFound,
            Self::Integrity(fault) => fault.error_code(),
            Self::Storage(_) => ErrorCode::StorageFailed,
        }
    }
}

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
