//! Batch validation of proposed parent→child links.
//!
//! Validation is pure decision-making: it reads the store, never writes it.
//! A batch yields partial results — each proposed child is accepted or
//! rejected independently, and rejection is data, not an error. The write
//! path repeats the same checks inside its transaction; this pass exists so
//! a client can learn every per-item outcome up front.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::query;
use crate::error::{ErrorCode, Result};
use crate::graph::cycles;
use crate::model::{ItemId, UserId};

// ---------------------------------------------------------------------------
// Rejection taxonomy
// ---------------------------------------------------------------------------

/// Why a proposed child was rejected from a link batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The child id equals the parent id.
    SelfLink,
    /// Adding the edge would close a directed cycle.
    CircularDependency,
    /// The child does not exist, or its list is not visible to the acting
    /// user (the two are deliberately indistinguishable).
    NotFound,
    /// Parent and child lists are not both visible to the acting user.
    CrossUser,
    /// The batch would push the parent's child count above the bound.
    MaxLimit,
}

impl RejectReason {
    /// Snake-case wire string, matching the serde representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelfLink => "self_link",
            Self::CircularDependency => "circular_dependency",
            Self::NotFound => "not_found",
            Self::CrossUser => "cross_user",
            Self::MaxLimit => "max_limit",
        }
    }

    /// Human-readable warning text surfaced in batch results.
    pub const fn warning(self) -> &'static str {
        match self {
            Self::SelfLink => "Cannot link item to itself",
            Self::CircularDependency => "Cannot create circular dependency",
            Self::NotFound => "Linked item not found",
            Self::CrossUser => "Cannot link items across lists you cannot access",
            Self::MaxLimit => "Too many linked items in one batch",
        }
    }

    /// The machine-readable code matching this rejection.
    pub const fn error_code(self) -> ErrorCode {
        match self {
            Self::SelfLink => ErrorCode::SelfLink,
            Self::CircularDependency => ErrorCode::CycleDetected,
            Self::NotFound => ErrorCode::ItemNotFound,
            Self::CrossUser => ErrorCode::CrossUser,
            Self::MaxLimit => ErrorCode::LinkLimitExceeded,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Validation result
// ---------------------------------------------------------------------------

/// One rejected proposal and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedLink {
    pub child_id: ItemId,
    pub reason: RejectReason,
}

impl RejectedLink {
    /// Warning line for this rejection, naming the child.
    pub fn warning(&self) -> String {
        format!("{} ({})", self.reason.warning(), self.child_id)
    }
}

/// Partial result of validating a batch: some children acceptable, some not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Children that passed every check, in proposal order, deduplicated.
    pub acceptable: Vec<ItemId>,
    /// Children that failed, each with its first failing reason.
    pub rejected: Vec<RejectedLink>,
}

impl Validation {
    /// Warning lines for all rejections, in rejection order.
    pub fn warnings(&self) -> Vec<String> {
        self.rejected.iter().map(RejectedLink::warning).collect()
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Validate a proposed batch of parent→child links for the acting user.
///
/// Checks run per child, in order: self-link, existence, list visibility,
/// cycle, fan-out bound. The first failing check decides
/// the reason. Cycle and self-link checks are evaluated against the graph
/// as it exists *before* the batch: proposals in the same call never see
/// each other. The fan-out bound is the exception — it charges the batch
/// for members already accepted in this call, since they will land together.
///
/// The parent must exist and be visible to the acting user.
///
/// # Errors
///
/// Returns [`crate::error::EngineError::ItemNotFound`] if the parent is
/// absent or invisible; storage failures pass through.
pub fn validate_links(
    conn: &Connection,
    acting_user: &UserId,
    parent: &ItemId,
    proposed: &[ItemId],
    max_links_per_batch: usize,
) -> Result<Validation> {
    let parent_list = query::item_list_if_visible(conn, parent, acting_user)?
        .ok_or_else(|| crate::error::EngineError::ItemNotFound(parent.clone()))?;

    let graph = query::load_graph(conn)?;
    let existing_children = graph.child_count(parent);

    let mut out = Validation::default();
    let mut seen: std::collections::HashSet<&ItemId> = std::collections::HashSet::new();

    for child in proposed {
        // A child proposed twice in one batch is validated once; the second
        // occurrence is dropped silently rather than rejected.
        if !seen.insert(child) {
            continue;
        }

        if child == parent {
            out.rejected.push(RejectedLink {
                child_id: child.clone(),
                reason: RejectReason::SelfLink,
            });
            continue;
        }

        // The child lookup is deliberately not visibility-gated: an item in
        // another user's unshared list rejects as cross_user, a missing one
        // as not_found.
        let Some(child_list) = query::item_list(conn, child)? else {
            out.rejected.push(RejectedLink {
                child_id: child.clone(),
                reason: RejectReason::NotFound,
            });
            continue;
        };

        if child_list != parent_list
            && !query::list_visible_to(conn, &child_list, acting_user)?
        {
            out.rejected.push(RejectedLink {
                child_id: child.clone(),
                reason: RejectReason::CrossUser,
            });
            continue;
        }

        if cycles::would_create_cycle(&graph, parent, child).is_some() {
            out.rejected.push(RejectedLink {
                child_id: child.clone(),
                reason: RejectReason::CircularDependency,
            });
            continue;
        }

        // Existing duplicates do not consume budget; they will be no-ops.
        let is_duplicate = graph.has_edge(parent, child);
        if !is_duplicate && existing_children + out.acceptable.len() >= max_links_per_batch {
            out.rejected.push(RejectedLink {
                child_id: child.clone(),
                reason: RejectReason::MaxLimit,
            });
            continue;
        }

        out.acceptable.push(child.clone());
    }

    Ok(out)
}
