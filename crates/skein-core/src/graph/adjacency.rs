//! Parent/child adjacency snapshot materialized from the edge table.
//!
//! # Overview
//!
//! The durable truth for links is the `item_links` edge table. Cycle checks
//! and propagation walk an in-memory [`LinkGraph`] instead: a snapshot of
//! the forward (`children`) and reverse (`parents`) adjacency, rebuilt from
//! a single scan. The graph is immutable once built; write paths reload it
//! inside their transaction when they need a fresh view.
//!
//! # Semantics
//!
//! An edge parent→child means completing the parent completes the child.
//! Traversal helpers follow that direction: `descendants_of` answers "what
//! would a status change on this item touch", `ancestors_of` answers "what
//! controls this item". Bidirectional peer links never enter this graph.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::ItemId;

/// A directed parent/child link graph over items.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    /// parent → set of children it controls.
    children: HashMap<ItemId, HashSet<ItemId>>,
    /// child → set of parents controlling it.
    parents: HashMap<ItemId, HashSet<ItemId>>,
    /// All known item ids, including unlinked ones.
    all_items: HashSet<ItemId>,
}

impl LinkGraph {
    /// Build a graph from an item universe and a directed edge list.
    ///
    /// Endpoints of edges are added to the item universe even when missing
    /// from `items`, so a graph loaded from a partially scanned store still
    /// traverses correctly.
    pub fn from_edges(
        items: impl IntoIterator<Item = ItemId>,
        edges: impl IntoIterator<Item = (ItemId, ItemId)>,
    ) -> Self {
        let mut graph = Self {
            children: HashMap::new(),
            parents: HashMap::new(),
            all_items: items.into_iter().collect(),
        };
        for (parent, child) in edges {
            graph.insert_edge(parent, child);
        }
        graph
    }

    /// Add a directed edge to the snapshot. Used by write paths to test
    /// "what if" states without another store scan.
    pub fn insert_edge(&mut self, parent: ItemId, child: ItemId) {
        self.all_items.insert(parent.clone());
        self.all_items.insert(child.clone());
        self.children
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
        self.parents.entry(child).or_default().insert(parent);
    }

    /// Direct children of an item. Empty set if unknown or unlinked.
    pub fn children_of(&self, id: &ItemId) -> HashSet<&ItemId> {
        self.children
            .get(id)
            .map(|set| set.iter().collect())
            .unwrap_or_default()
    }

    /// Direct parents of an item. Empty set if unknown or unlinked.
    pub fn parents_of(&self, id: &ItemId) -> HashSet<&ItemId> {
        self.parents
            .get(id)
            .map(|set| set.iter().collect())
            .unwrap_or_default()
    }

    /// Number of direct children of an item.
    pub fn child_count(&self, id: &ItemId) -> usize {
        self.children.get(id).map_or(0, HashSet::len)
    }

    /// `true` if the directed edge parent→child is present.
    pub fn has_edge(&self, parent: &ItemId, child: &ItemId) -> bool {
        self.children
            .get(parent)
            .is_some_and(|set| set.contains(child))
    }

    /// Every item reachable from `start` via children edges, in BFS order,
    /// `start` excluded. The visited set guards against a corrupt (cyclic)
    /// snapshot; on a well-formed DAG it only deduplicates diamonds.
    pub fn descendants_of(&self, start: &ItemId) -> Vec<ItemId> {
        self.walk(start, &self.children)
    }

    /// Every item reachable from `start` via parent edges, in BFS order,
    /// `start` excluded.
    pub fn ancestors_of(&self, start: &ItemId) -> Vec<ItemId> {
        self.walk(start, &self.parents)
    }

    fn walk(&self, start: &ItemId, adjacency: &HashMap<ItemId, HashSet<ItemId>>) -> Vec<ItemId> {
        let mut visited: HashSet<&ItemId> = HashSet::new();
        let mut order: Vec<ItemId> = Vec::new();
        let mut queue: VecDeque<&ItemId> = VecDeque::new();

        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if let Some(next) = adjacency.get(current) {
                for neighbor in next {
                    if visited.insert(neighbor) {
                        order.push(neighbor.clone());
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        order
    }

    /// All item ids known to the snapshot.
    pub fn all_item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.all_items.iter()
    }

    /// Total number of items in the snapshot.
    pub fn len(&self) -> usize {
        self.all_items.len()
    }

    /// `true` if the snapshot has no items.
    pub fn is_empty(&self) -> bool {
        self.all_items.is_empty()
    }
}
