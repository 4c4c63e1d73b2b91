//! Applies change events to cached list state.
//!
//! The reconciler holds one user's view of their lists. Each incoming event
//! is applied at most once: stale and duplicate deliveries are dropped by
//! comparing `updated_at_us`, so replays and out-of-order delivery cannot
//! regress the cache. Every applied item event is classified as a direct
//! user edit or a propagated side effect, which callers use to pick the UI
//! treatment.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use skein_core::event::{Cause, ChangeEvent, ChangeKind};
use skein_core::model::{Item, List, ListId, UserId};

use crate::cache::{Dependency, DerivedViews, ListCache, ViewKey};

/// How an applied item change should be treated by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// A direct edit; render with full feedback.
    UserEdit,
    /// A propagation side effect; render quietly.
    Propagated,
}

/// What the reconciler did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Applied(Classification),
    /// The cache already held a newer version of the entity.
    DroppedStale,
    /// The cache already reflected exactly this change.
    DroppedDuplicate,
    /// Untracked list, or a malformed event (logged).
    Skipped,
}

/// One user's reconciled cache: list mirrors plus derived-view staleness.
#[derive(Debug)]
pub struct CacheReconciler {
    user: UserId,
    lists_meta: HashMap<ListId, List>,
    lists: HashMap<ListId, ListCache>,
    views: DerivedViews,
    recency_window_us: i64,
}

impl CacheReconciler {
    #[must_use]
    pub fn new(user: UserId, recency_window_ms: u64) -> Self {
        Self {
            user,
            lists_meta: HashMap::new(),
            lists: HashMap::new(),
            views: DerivedViews::new(),
            recency_window_us: i64::try_from(recency_window_ms)
                .unwrap_or(i64::MAX)
                .saturating_mul(1_000),
        }
    }

    /// Start mirroring a list. Item events for untracked lists are skipped.
    pub fn track_list(&mut self, list: List) {
        self.lists.entry(list.id.clone()).or_default();
        self.lists_meta.insert(list.id.clone(), list);
    }

    #[must_use]
    pub fn list(&self, list_id: &ListId) -> Option<&ListCache> {
        self.lists.get(list_id)
    }

    #[must_use]
    pub fn list_meta(&self, list_id: &ListId) -> Option<&List> {
        self.lists_meta.get(list_id)
    }

    #[must_use]
    pub const fn views(&self) -> &DerivedViews {
        &self.views
    }

    pub const fn views_mut(&mut self) -> &mut DerivedViews {
        &mut self.views
    }

    /// Apply one event against the cache, with `now_us` as the receive
    /// time. Returns what happened; nothing here can fail, a bad event is
    /// logged and skipped.
    pub fn apply_at(&mut self, event: &ChangeEvent, now_us: i64) -> Outcome {
        match event {
            ChangeEvent::Item { kind, before, after, .. } => {
                self.apply_item(event, *kind, before.as_ref(), after.as_ref(), now_us)
            }
            ChangeEvent::List { kind, before, after, .. } => {
                Self::apply_list(&mut self.lists, &mut self.lists_meta, &mut self.views, *kind, before.as_ref(), after.as_ref())
            }
        }
    }

    fn apply_list(
        lists: &mut HashMap<ListId, ListCache>,
        lists_meta: &mut HashMap<ListId, List>,
        views: &mut DerivedViews,
        kind: ChangeKind,
        before: Option<&List>,
        after: Option<&List>,
    ) -> Outcome {
        match kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let Some(after) = after else {
                    warn!(kind = %kind, "list event without an after snapshot, skipping");
                    return Outcome::Skipped;
                };
                if let Some(cached) = lists_meta.get(&after.id) {
                    if cached.updated_at_us > after.updated_at_us {
                        return Outcome::DroppedStale;
                    }
                    if cached == after {
                        return Outcome::DroppedDuplicate;
                    }
                }
                lists.entry(after.id.clone()).or_default();
                lists_meta.insert(after.id.clone(), after.clone());
                views.invalidate(&Dependency::List(after.id.clone()));
                Outcome::Applied(Classification::UserEdit)
            }
            ChangeKind::Delete => {
                let Some(before) = before else {
                    warn!("list delete without a before snapshot, skipping");
                    return Outcome::Skipped;
                };
                if lists_meta.remove(&before.id).is_none() {
                    return Outcome::DroppedDuplicate;
                }
                lists.remove(&before.id);
                views.invalidate(&Dependency::List(before.id.clone()));
                views.forget(&ViewKey::ListSummary(before.id.clone()));
                Outcome::Applied(Classification::UserEdit)
            }
        }
    }

    fn apply_item(
        &mut self,
        event: &ChangeEvent,
        kind: ChangeKind,
        before: Option<&Item>,
        after: Option<&Item>,
        now_us: i64,
    ) -> Outcome {
        let Some(subject) = after.or(before) else {
            warn!(kind = %kind, "item event without any snapshot, skipping");
            return Outcome::Skipped;
        };

        let classification = match after {
            Some(after) if kind != ChangeKind::Delete => {
                self.classify(event, before, after, now_us)
            }
            _ => Classification::UserEdit,
        };

        // Derived views can read items in lists this cache does not mirror,
        // so an untracked-list event still reaches the views; without a
        // cached copy there is nothing to dedup against.
        let list_id = subject.list_id.clone();
        if !self.lists.contains_key(&list_id) {
            debug!(list = %list_id, "event for untracked list, views staled only");
            self.invalidate_after_change(before, after, subject, classification);
            return Outcome::Skipped;
        }

        match kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let Some(after) = after else {
                    warn!(kind = %kind, "item event without an after snapshot, skipping");
                    return Outcome::Skipped;
                };
                let cached = self.lists.get(&list_id).and_then(|c| c.get(&after.id));
                if let Some(cached) = cached {
                    if cached.updated_at_us > after.updated_at_us {
                        debug!(item = %after.id, "stale event dropped");
                        return Outcome::DroppedStale;
                    }
                    if cached == after {
                        return Outcome::DroppedDuplicate;
                    }
                }
                if let Some(cache) = self.lists.get_mut(&list_id) {
                    cache.upsert(after.clone());
                }
                self.invalidate_after_change(before, Some(after), subject, classification);
                Outcome::Applied(classification)
            }
            ChangeKind::Delete => {
                let removed = self
                    .lists
                    .get_mut(&list_id)
                    .is_some_and(|cache| cache.remove(&subject.id));
                if !removed {
                    return Outcome::DroppedDuplicate;
                }
                self.views.forget(&ViewKey::LinkSummary(subject.id.clone()));
                self.invalidate_after_change(before, after, subject, classification);
                Outcome::Applied(Classification::UserEdit)
            }
        }
    }

    /// Full view-staleness pass for one item change: the targeted
    /// dependency edges, plus the coarse rollup path when a propagated flip
    /// on an item with children shows the cascade ran deeper than this one
    /// event.
    fn invalidate_after_change(
        &mut self,
        before: Option<&Item>,
        after: Option<&Item>,
        subject: &Item,
        classification: Classification,
    ) {
        self.invalidate_for_item(before, after, subject);
        if classification == Classification::Propagated && subject.has_children() {
            self.views.invalidate_user_rollups(&self.user);
        }
    }

    /// Stale every view that read the changed item, any link partner whose
    /// set changed with it, or the owning list.
    fn invalidate_for_item(&mut self, before: Option<&Item>, after: Option<&Item>, subject: &Item) {
        self.views.invalidate(&Dependency::Item(subject.id.clone()));
        self.views.invalidate(&Dependency::List(subject.list_id.clone()));
        if let (Some(before), Some(after)) = (before, after) {
            for endpoint in before.linked.changed_endpoints(&after.linked) {
                self.views.invalidate(&Dependency::Item(endpoint));
            }
        }
    }

    fn classify(
        &self,
        event: &ChangeEvent,
        before: Option<&Item>,
        after: &Item,
        now_us: i64,
    ) -> Classification {
        let status_changed = before.is_some_and(|b| b.is_completed != after.is_completed);

        match event.cause() {
            Some(Cause::Propagated) => Classification::Propagated,
            Some(Cause::User) => Classification::UserEdit,
            // Untagged producer: a fresh status flip on an item that has
            // parents is taken to be propagation. Only the event itself is
            // consulted, so the call gives the same answer on every replica.
            None => {
                let fresh = now_us.saturating_sub(event.wall_ts_us()) <= self.recency_window_us;
                if status_changed && after.has_parents() && fresh {
                    Classification::Propagated
                } else {
                    Classification::UserEdit
                }
            }
        }
    }

    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }
}
