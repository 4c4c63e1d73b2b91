//! Cycle detection for the parent/child link graph.
//!
//! # Overview
//!
//! The children relation must stay a DAG: a cycle would make propagation
//! chase its own tail and makes "complete this item" ill-defined. This
//! module answers the single question the validator needs — would adding
//! one proposed edge close a cycle — plus whole-graph sweeps used by
//! integrity checks.
//!
//! # Design
//!
//! - **DFS-based**: adding parent→child closes a cycle iff `parent` is
//!   already reachable from `child` via children edges, so we search from
//!   `child` and short-circuit on finding `parent`.
//! - **Reject, don't warn**: unlike a scheduling hint, a cycle here breaks a
//!   hard invariant. Detection happens before the write and again inside
//!   the write transaction; a detected cycle rejects the edge.
//! - **O(V+E)**: each detection check visits each node and edge at most once.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::adjacency::LinkGraph;
use crate::model::ItemId;

// ---------------------------------------------------------------------------
// CyclePath
// ---------------------------------------------------------------------------

/// The cycle a proposed edge would close, for diagnostics.
///
/// `path` starts at the proposed parent, follows existing children edges
/// through the proposed child, and ends back at the parent. For a proposed
/// edge C→A over existing A→B→C the path is `[C, A, B, C]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath {
    /// Ordered item ids forming the loop; first and last are equal.
    pub path: Vec<ItemId>,
    /// The proposed parent (source of the rejected edge).
    pub edge_from: ItemId,
    /// The proposed child (target of the rejected edge).
    pub edge_to: ItemId,
}

impl CyclePath {
    /// Number of distinct items in the cycle.
    pub fn cycle_len(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// `true` if this is a self-link (item would control itself).
    pub fn is_self_link(&self) -> bool {
        self.edge_from == self.edge_to
    }
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_self_link() {
            write!(f, "self-link on '{}'", self.edge_from)
        } else {
            let rendered: Vec<&str> = self.path.iter().map(ItemId::as_str).collect();
            write!(
                f,
                "cycle of {} items: {}",
                self.cycle_len(),
                rendered.join(" -> ")
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Single-edge detection
// ---------------------------------------------------------------------------

/// Detect whether adding edge `parent → child` would create a cycle.
///
/// True iff `child` is already an ancestor of `parent`, i.e. a directed
/// path exists from `child` to `parent` through existing children edges.
/// The graph is the state *before* the proposed edge; proposals in the same
/// batch are checked independently against it.
///
/// Returns `Some(CyclePath)` describing the loop, or `None` if the edge is
/// safe.
pub fn would_create_cycle(graph: &LinkGraph, parent: &ItemId, child: &ItemId) -> Option<CyclePath> {
    if parent == child {
        return Some(CyclePath {
            path: vec![parent.clone(), parent.clone()],
            edge_from: parent.clone(),
            edge_to: child.clone(),
        });
    }

    let mut visited: HashSet<ItemId> = HashSet::new();
    let mut via: HashMap<ItemId, ItemId> = HashMap::new();

    if !dfs_find_path(graph, child, parent, &mut visited, &mut via) {
        return None;
    }

    // Reconstruct parent → child → ... → parent by walking `via` backwards
    // from the found target.
    let mut chain = vec![parent.clone()];
    let mut current = parent.clone();
    while current != *child {
        match via.get(&current) {
            Some(previous) => {
                chain.push(previous.clone());
                current = previous.clone();
            }
            None => break,
        }
    }
    chain.reverse();

    let mut path = Vec::with_capacity(chain.len() + 1);
    path.push(parent.clone());
    path.extend(chain);

    Some(CyclePath {
        path,
        edge_from: parent.clone(),
        edge_to: child.clone(),
    })
}

/// DFS from `current` toward `target` over children edges, recording the
/// traversal in `via` so the path can be reconstructed.
fn dfs_find_path(
    graph: &LinkGraph,
    current: &ItemId,
    target: &ItemId,
    visited: &mut HashSet<ItemId>,
    via: &mut HashMap<ItemId, ItemId>,
) -> bool {
    if current == target {
        return true;
    }
    if !visited.insert(current.clone()) {
        return false;
    }

    for neighbor in graph.children_of(current) {
        if !visited.contains(neighbor) {
            via.insert(neighbor.clone(), current.clone());
            if dfs_find_path(graph, neighbor, target, visited, via) {
                return true;
            }
        }
    }

    false
}

// ---------------------------------------------------------------------------
// Whole-graph sweeps
// ---------------------------------------------------------------------------

/// DFS colors for whole-graph cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// `true` if the stored graph contains any directed cycle.
///
/// A cyclic stored graph is a data-integrity fault: the write paths never
/// produce one, so a positive result means external corruption.
pub fn has_cycles(graph: &LinkGraph) -> bool {
    let mut color: HashMap<&ItemId, Color> = HashMap::new();
    for item in graph.all_item_ids() {
        color.insert(item, Color::White);
    }

    for item in graph.all_item_ids() {
        if color.get(item) == Some(&Color::White) && dfs_has_cycle(graph, item, &mut color) {
            return true;
        }
    }
    false
}

fn dfs_has_cycle<'a>(
    graph: &'a LinkGraph,
    node: &'a ItemId,
    color: &mut HashMap<&'a ItemId, Color>,
) -> bool {
    color.insert(node, Color::Gray);

    for neighbor in graph.children_of(node) {
        match color.get(neighbor) {
            Some(Color::White) | None => {
                if dfs_has_cycle(graph, neighbor, color) {
                    return true;
                }
            }
            Some(Color::Gray) => return true,
            Some(Color::Black) => {}
        }
    }

    color.insert(node, Color::Black);
    false
}

/// Find every cycle in the graph, one [`CyclePath`] per back edge.
///
/// Used by integrity sweeps to report what is broken, not on the hot path.
pub fn find_all_cycles(graph: &LinkGraph) -> Vec<CyclePath> {
    let mut cycles = Vec::new();
    let mut color: HashMap<&ItemId, Color> = HashMap::new();
    let mut via: HashMap<ItemId, ItemId> = HashMap::new();

    for item in graph.all_item_ids() {
        color.insert(item, Color::White);
    }
    for item in graph.all_item_ids() {
        if color.get(item) == Some(&Color::White) {
            dfs_all_cycles(graph, item, &mut color, &mut via, &mut cycles);
        }
    }
    cycles
}

fn dfs_all_cycles<'a>(
    graph: &'a LinkGraph,
    node: &'a ItemId,
    color: &mut HashMap<&'a ItemId, Color>,
    via: &mut HashMap<ItemId, ItemId>,
    cycles: &mut Vec<CyclePath>,
) {
    color.insert(node, Color::Gray);

    for neighbor in graph.children_of(node) {
        match color.get(neighbor) {
            Some(Color::White) | None => {
                via.insert(neighbor.clone(), node.clone());
                dfs_all_cycles(graph, neighbor, color, via, cycles);
            }
            Some(Color::Gray) => {
                // Back edge node → neighbor: the loop runs neighbor → ... →
                // node → neighbor.
                let mut path = vec![neighbor.clone()];
                let mut current = node.clone();
                while current != *neighbor {
                    path.push(current.clone());
                    match via.get(&current) {
                        Some(previous) => current = previous.clone(),
                        None => break,
                    }
                }
                path.push(neighbor.clone());
                let end = path.len() - 1;
                path[1..end].reverse();

                cycles.push(CyclePath {
                    path,
                    edge_from: node.clone(),
                    edge_to: neighbor.clone(),
                });
            }
            Some(Color::Black) => {}
        }
    }

    color.insert(node, Color::Black);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
