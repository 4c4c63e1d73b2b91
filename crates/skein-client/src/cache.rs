//! Cached list state and derived-view bookkeeping.
//!
//! A [`ListCache`] mirrors one list's items, position-ordered. Derived
//! views (link summaries, cross-list rollups) are not recomputed here;
//! [`DerivedViews`] only tracks which of them an entity change makes
//! stale, through dependency edges registered when the view was built.

use std::collections::{HashMap, HashSet};

use skein_core::model::{Item, ItemId, ListId, UserId};

/// Position-ordered mirror of one list's items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListCache {
    items: Vec<Item>,
}

impl ListCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == *id)
    }

    /// Insert or replace an item, keeping position order. Ties break on id
    /// so the order is deterministic.
    pub fn upsert(&mut self, item: Item) {
        self.items.retain(|existing| existing.id != item.id);
        let at = self
            .items
            .partition_point(|existing| (existing.position, &existing.id) < (item.position, &item.id));
        self.items.insert(at, item);
    }

    /// Remove an item. Returns `false` if it was not cached.
    pub fn remove(&mut self, id: &ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != *id);
        self.items.len() < before
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Identity of a derived view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    /// The rendered link badge/summary for one item.
    LinkSummary(ItemId),
    /// A rollup across all of one user's lists.
    CrossListQuery(UserId),
    /// Aggregates over one list (counts, completion ratio).
    ListSummary(ListId),
}

/// What a derived view was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    Item(ItemId),
    List(ListId),
}

/// Tracks derived views and the dependency edges that invalidate them.
///
/// A view is registered with the exact set of entities it read; when one of
/// those entities changes, the view (and only that view) goes stale. The one
/// coarser path is [`DerivedViews::invalidate_user_rollups`]: propagation can
/// flip items a cross-list rollup never read directly.
#[derive(Debug, Default)]
pub struct DerivedViews {
    deps: HashMap<ViewKey, HashSet<Dependency>>,
    stale: HashSet<ViewKey>,
}

impl DerivedViews {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly computed view and what it read. Re-registering
    /// replaces the old dependency set and clears staleness.
    pub fn register(&mut self, view: ViewKey, reads: impl IntoIterator<Item = Dependency>) {
        self.deps.insert(view.clone(), reads.into_iter().collect());
        self.stale.remove(&view);
    }

    /// Drop a view entirely (its subject was deleted).
    pub fn forget(&mut self, view: &ViewKey) {
        self.deps.remove(view);
        self.stale.remove(view);
    }

    /// Mark every view depending on this entity stale. Returns the views
    /// that newly went stale.
    pub fn invalidate(&mut self, changed: &Dependency) -> Vec<ViewKey> {
        let mut hit = Vec::new();
        for (view, reads) in &self.deps {
            if reads.contains(changed) && self.stale.insert(view.clone()) {
                hit.push(view.clone());
            }
        }
        hit
    }

    /// Mark every cross-list rollup for this user stale, regardless of the
    /// rollup's registered reads. Returns the views that newly went stale.
    pub fn invalidate_user_rollups(&mut self, user: &UserId) -> Vec<ViewKey> {
        let mut hit = Vec::new();
        for view in self.deps.keys() {
            let rollup_for_user = matches!(view, ViewKey::CrossListQuery(owner) if owner == user);
            if rollup_for_user && self.stale.insert(view.clone()) {
                hit.push(view.clone());
            }
        }
        hit
    }

    #[must_use]
    pub fn is_stale(&self, view: &ViewKey) -> bool {
        self.stale.contains(view)
    }

    /// `true` if the view is registered and not stale.
    #[must_use]
    pub fn is_fresh(&self, view: &ViewKey) -> bool {
        self.deps.contains_key(view) && !self.stale.contains(view)
    }

    #[must_use]
    pub fn stale_views(&self) -> impl Iterator<Item = &ViewKey> {
        self.stale.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::model::LinkedItems;

    fn item(id: &str, position: i64) -> Item {
        Item {
            id: ItemId::new_unchecked(id),
            list_id: ListId::new_unchecked("sl-a"),
            content: id.to_string(),
            is_completed: false,
            position,
            target_date: None,
            linked: LinkedItems::default(),
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    #[test]
    fn upsert_keeps_position_order() {
        let mut cache = ListCache::new();
        cache.upsert(item("sk-b", 2));
        cache.upsert(item("sk-a", 0));
        cache.upsert(item("sk-c", 1));

        let order: Vec<&str> = cache.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(order, vec!["sk-a", "sk-c", "sk-b"]);
    }

    #[test]
    fn upsert_replaces_and_reorders() {
        let mut cache = ListCache::new();
        cache.upsert(item("sk-a", 0));
        cache.upsert(item("sk-b", 1));

        cache.upsert(item("sk-a", 5));
        let order: Vec<&str> = cache.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(order, vec!["sk-b", "sk-a"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn remove_reports_presence() {
        let mut cache = ListCache::new();
        cache.upsert(item("sk-a", 0));
        assert!(cache.remove(&ItemId::new_unchecked("sk-a")));
        assert!(!cache.remove(&ItemId::new_unchecked("sk-a")));
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidation_follows_dependency_edges() {
        let mut views = DerivedViews::new();
        let summary = ViewKey::LinkSummary(ItemId::new_unchecked("sk-a"));
        views.register(
            summary.clone(),
            [
                Dependency::Item(ItemId::new_unchecked("sk-a")),
                Dependency::Item(ItemId::new_unchecked("sk-b")),
            ],
        );
        let unrelated = ViewKey::LinkSummary(ItemId::new_unchecked("sk-z"));
        views.register(
            unrelated.clone(),
            [Dependency::Item(ItemId::new_unchecked("sk-z"))],
        );

        let hit = views.invalidate(&Dependency::Item(ItemId::new_unchecked("sk-b")));
        assert_eq!(hit, vec![summary.clone()]);
        assert!(views.is_stale(&summary));
        assert!(views.is_fresh(&unrelated));
    }

    #[test]
    fn reregistering_clears_staleness() {
        let mut views = DerivedViews::new();
        let key = ViewKey::ListSummary(ListId::new_unchecked("sl-a"));
        views.register(key.clone(), [Dependency::List(ListId::new_unchecked("sl-a"))]);
        views.invalidate(&Dependency::List(ListId::new_unchecked("sl-a")));
        assert!(views.is_stale(&key));

        views.register(key.clone(), [Dependency::List(ListId::new_unchecked("sl-a"))]);
        assert!(views.is_fresh(&key));
    }

    #[test]
    fn user_rollup_invalidation_ignores_registered_reads() {
        let mut views = DerivedViews::new();
        let alice = UserId::new_unchecked("su-alice");
        let rollup = ViewKey::CrossListQuery(alice.clone());
        views.register(
            rollup.clone(),
            [Dependency::Item(ItemId::new_unchecked("sk-a"))],
        );
        let other = ViewKey::CrossListQuery(UserId::new_unchecked("su-bob"));
        views.register(other.clone(), [Dependency::Item(ItemId::new_unchecked("sk-a"))]);

        let hit = views.invalidate_user_rollups(&alice);
        assert_eq!(hit, vec![rollup.clone()]);
        assert!(views.is_stale(&rollup));
        assert!(views.is_fresh(&other), "other users' rollups stay fresh");
    }

    #[test]
    fn double_invalidation_reports_once() {
        let mut views = DerivedViews::new();
        let key = ViewKey::ListSummary(ListId::new_unchecked("sl-a"));
        views.register(key, [Dependency::List(ListId::new_unchecked("sl-a"))]);

        let first = views.invalidate(&Dependency::List(ListId::new_unchecked("sl-a")));
        let second = views.invalidate(&Dependency::List(ListId::new_unchecked("sl-a")));
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}
