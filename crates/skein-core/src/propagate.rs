//! Item updates with transitive completion-status propagation.
//!
//! When an update flips `is_completed`, every transitive descendant through
//! parent→child edges is overwritten to the same status in the same
//! transaction. Descendants that already hold the target status are left
//! untouched and do not appear in the outcome, so applying the same update
//! twice reports zero propagated changes the second time.

#![allow(clippy::module_name_repetitions)]

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, warn};

use crate::db::query;
use crate::error::{EngineError, IntegrityFault, Result};
use crate::graph::adjacency::LinkGraph;
use crate::graph::cycles;
use crate::model::{Item, ItemId, ListId};

/// Partial update to an item. `None` leaves the field alone; for the target
/// date, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChanges {
    pub content: Option<String>,
    pub position: Option<i64>,
    pub target_date: Option<Option<NaiveDate>>,
    pub is_completed: Option<bool>,
}

impl FieldChanges {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.position.is_none()
            && self.target_date.is_none()
            && self.is_completed.is_none()
    }

    /// Shorthand for a pure status flip.
    #[must_use]
    pub const fn status(is_completed: bool) -> Self {
        Self {
            content: None,
            position: None,
            target_date: None,
            is_completed: Some(is_completed),
        }
    }
}

/// One descendant whose status was overwritten by propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagatedUpdate {
    pub item_id: ItemId,
    pub list_id: ListId,
    pub old_status: bool,
    pub new_status: bool,
}

/// Result of [`update_with_propagation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationOutcome {
    /// The directly updated item, re-read after the write.
    pub updated_item: Item,
    /// Descendant status flips, in traversal order.
    pub propagated: Vec<PropagatedUpdate>,
    /// Every list holding a changed item, the updated item's list included.
    pub affected_lists: BTreeSet<ListId>,
}

/// One row of a propagation preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedItem {
    pub item_id: ItemId,
    pub list_id: ListId,
    pub current_status: bool,
    pub new_status: bool,
}

/// Descendants of `start` that do not already hold `new_status`, with the
/// parent edge each was reached through.
///
/// The visited set alone guarantees termination; the node bound exists to
/// turn a corrupted (cyclic or absurdly dense) store into a hard fault
/// instead of a silent mass overwrite.
fn flip_candidates(
    conn: &Connection,
    graph: &LinkGraph,
    start: &ItemId,
    new_status: bool,
    max_nodes: usize,
) -> Result<Vec<AffectedItem>> {
    let mut flips = Vec::new();
    let mut visited: HashSet<ItemId> = HashSet::from([start.clone()]);
    let mut queue: VecDeque<ItemId> = VecDeque::from([start.clone()]);

    while let Some(current) = queue.pop_front() {
        // Sorted so preview and apply always report flips in the same order.
        let mut children: Vec<_> = graph.children_of(&current).into_iter().collect();
        children.sort();
        for child in children {
            if !visited.insert(child.clone()) {
                continue;
            }
            if visited.len() > max_nodes {
                warn!(start = %start, max_nodes, "propagation walk exceeded node bound");
                let path = cycles::find_all_cycles(graph)
                    .into_iter()
                    .next()
                    .map_or_else(|| vec![start.clone()], |cycle| cycle.path);
                return Err(EngineError::Integrity(IntegrityFault::CyclicStore { path }));
            }

            let Some(item) = query::get_item(conn, child)? else {
                return Err(EngineError::Integrity(IntegrityFault::DanglingEdge {
                    parent: current.clone(),
                    child: child.clone(),
                }));
            };
            if item.is_completed != new_status {
                flips.push(AffectedItem {
                    item_id: item.id,
                    list_id: item.list_id,
                    current_status: item.is_completed,
                    new_status,
                });
            }
            queue.push_back(child.clone());
        }
    }

    Ok(flips)
}

/// Apply field changes to an item and, if its completion status flipped,
/// overwrite the status of all transitive descendants in the same
/// transaction.
///
/// # Errors
///
/// Returns [`EngineError::ItemNotFound`] if the item is absent,
/// [`EngineError::Integrity`] if the walk trips over a dangling edge or the
/// node bound, or a storage error. Any error rolls back everything,
/// including the direct update.
pub fn update_with_propagation(
    conn: &mut Connection,
    item_id: &ItemId,
    changes: &FieldChanges,
    max_nodes: usize,
    now_us: i64,
) -> Result<PropagationOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let Some(before) = query::get_item(&tx, item_id)? else {
        return Err(EngineError::ItemNotFound(item_id.clone()));
    };

    let content = changes.content.clone().unwrap_or_else(|| before.content.clone());
    let position = changes.position.unwrap_or(before.position);
    let target_date = changes.target_date.unwrap_or(before.target_date);
    let is_completed = changes.is_completed.unwrap_or(before.is_completed);

    tx.execute(
        "UPDATE items
         SET content = ?2, position = ?3, target_date = ?4, is_completed = ?5,
             updated_at_us = ?6
         WHERE item_id = ?1",
        params![
            item_id.as_str(),
            content,
            position,
            target_date.map(|d| d.format("%Y-%m-%d").to_string()),
            i64::from(is_completed),
            now_us,
        ],
    )?;

    let mut propagated = Vec::new();
    let mut affected_lists = BTreeSet::from([before.list_id.clone()]);

    if is_completed != before.is_completed {
        let graph = query::load_graph(&tx)?;
        for flip in flip_candidates(&tx, &graph, item_id, is_completed, max_nodes)? {
            tx.execute(
                "UPDATE items SET is_completed = ?2, updated_at_us = ?3 WHERE item_id = ?1",
                params![flip.item_id.as_str(), i64::from(flip.new_status), now_us],
            )?;
            affected_lists.insert(flip.list_id.clone());
            propagated.push(PropagatedUpdate {
                item_id: flip.item_id,
                list_id: flip.list_id,
                old_status: flip.current_status,
                new_status: flip.new_status,
            });
        }
        debug!(item = %item_id, flips = propagated.len(), "status propagated");
    }

    let Some(updated_item) = query::get_item(&tx, item_id)? else {
        return Err(EngineError::ItemNotFound(item_id.clone()));
    };
    tx.commit()?;

    Ok(PropagationOutcome { updated_item, propagated, affected_lists })
}

/// Read-only dry run of a status flip. Reports exactly the descendants that
/// [`update_with_propagation`] would overwrite for the same flip, in the
/// same order.
///
/// # Errors
///
/// Returns [`EngineError::ItemNotFound`] if the item is absent, plus the
/// same integrity and storage errors the apply path can hit.
pub fn preview_propagation(
    conn: &Connection,
    item_id: &ItemId,
    new_status: bool,
) -> Result<Vec<AffectedItem>> {
    let Some(item) = query::get_item(conn, item_id)? else {
        return Err(EngineError::ItemNotFound(item_id.clone()));
    };
    if item.is_completed == new_status {
        return Ok(Vec::new());
    }
    let graph = query::load_graph(conn)?;
    flip_candidates(conn, &graph, item_id, new_status, usize::MAX)
}
