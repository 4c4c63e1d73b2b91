//! Items and their link relation sets.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::id::{ItemId, ListId};

/// The three disjoint relation sets hanging off an item.
///
/// `children` and `parents` are the two directions of the same directed
/// relation: `a.children` contains `b` exactly when `b.parents` contains
/// `a`. The pair is written together in one transaction or not at all.
/// `bidirectional` is an informational peer link with no propagation
/// semantics.
///
/// `BTreeSet` keeps iteration deterministic, which keeps change-event
/// payloads and test assertions stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedItems {
    /// Items this item controls: completing this item completes them.
    #[serde(default)]
    pub children: BTreeSet<ItemId>,
    /// Items that control this item.
    #[serde(default)]
    pub parents: BTreeSet<ItemId>,
    /// Non-propagating peer links.
    #[serde(default)]
    pub bidirectional: BTreeSet<ItemId>,
}

impl LinkedItems {
    /// `true` if the id appears in any of the three sets.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.children.contains(id) || self.parents.contains(id) || self.bidirectional.contains(id)
    }

    /// `true` if all three sets are empty.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.parents.is_empty() && self.bidirectional.is_empty()
    }

    /// Total number of links across all three sets.
    pub fn degree(&self) -> usize {
        self.children.len() + self.parents.len() + self.bidirectional.len()
    }

    /// Ids that appear in `self` or `other` but not both, across all sets.
    ///
    /// Used by cache invalidation to find the other endpoints of link
    /// mutations from a before/after pair alone.
    pub fn changed_endpoints(&self, other: &Self) -> BTreeSet<ItemId> {
        let mut out = BTreeSet::new();
        for (a, b) in [
            (&self.children, &other.children),
            (&self.parents, &other.parents),
            (&self.bidirectional, &other.bidirectional),
        ] {
            out.extend(a.symmetric_difference(b).cloned());
        }
        out
    }
}

/// An item aggregate as stored and as carried in change events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub list_id: ListId,
    pub content: String,
    pub is_completed: bool,
    /// Sort position inside the owning list. Gaps are fine; ties break on id.
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub linked: LinkedItems,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl Item {
    /// `true` if this item is controlled by at least one parent link.
    pub fn has_parents(&self) -> bool {
        !self.linked.parents.is_empty()
    }

    /// `true` if this item controls at least one child.
    pub fn has_children(&self) -> bool {
        !self.linked.children.is_empty()
    }
}

/// A linked item as returned by the child/parent query surface: enough to
/// render a cross-list link row without fetching the full item or list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedItemRow {
    pub id: ItemId,
    pub content: String,
    pub is_completed: bool,
    pub list_id: ListId,
    pub list_title: String,
    pub list_type: super::list::ListType,
}

#[cfg(test)]
mod tests {
    use super::{Item, LinkedItems};
    use crate::model::id::{ItemId, ListId};

    fn id(s: &str) -> ItemId {
        ItemId::new_unchecked(s)
    }

    fn bare_item(item: &str) -> Item {
        Item {
            id: id(item),
            list_id: ListId::new_unchecked("sl-a"),
            content: "milk".into(),
            is_completed: false,
            position: 0,
            target_date: None,
            linked: LinkedItems::default(),
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    #[test]
    fn empty_linked_items() {
        let linked = LinkedItems::default();
        assert!(linked.is_empty());
        assert_eq!(linked.degree(), 0);
        assert!(!linked.contains(&id("sk-x")));
    }

    #[test]
    fn contains_checks_all_sets() {
        let mut linked = LinkedItems::default();
        linked.children.insert(id("sk-c"));
        linked.parents.insert(id("sk-p"));
        linked.bidirectional.insert(id("sk-b"));

        assert!(linked.contains(&id("sk-c")));
        assert!(linked.contains(&id("sk-p")));
        assert!(linked.contains(&id("sk-b")));
        assert!(!linked.contains(&id("sk-z")));
        assert_eq!(linked.degree(), 3);
        assert!(!linked.is_empty());
    }

    #[test]
    fn changed_endpoints_is_symmetric_difference() {
        let mut before = LinkedItems::default();
        before.children.insert(id("sk-kept"));
        before.children.insert(id("sk-removed"));

        let mut after = LinkedItems::default();
        after.children.insert(id("sk-kept"));
        after.parents.insert(id("sk-added"));

        let changed = before.changed_endpoints(&after);
        assert!(changed.contains(&id("sk-removed")));
        assert!(changed.contains(&id("sk-added")));
        assert!(!changed.contains(&id("sk-kept")));
        assert_eq!(changed.len(), 2);
    }

    #[test]
    fn item_parent_child_predicates() {
        let mut item = bare_item("sk-item");
        assert!(!item.has_parents());
        assert!(!item.has_children());

        item.linked.parents.insert(id("sk-p"));
        item.linked.children.insert(id("sk-c"));
        assert!(item.has_parents());
        assert!(item.has_children());
    }

    #[test]
    fn item_json_roundtrip() {
        let mut item = bare_item("sk-item");
        item.linked.children.insert(id("sk-child"));
        let json = serde_json::to_string(&item).expect("serialize");
        let back: Item = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, item);
    }
}
