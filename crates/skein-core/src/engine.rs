//! The engine facade: one entry point per exposed operation.
//!
//! Each write runs its transaction first and publishes change events only
//! after the commit, so a subscriber can never observe an event for state
//! that was rolled back. Wall-clock time is read once per operation and
//! threaded through, so every row touched by one call shares a timestamp.

use rusqlite::Connection;
use std::path::Path;
use tracing::info;

use crate::config::EngineConfig;
use crate::db::{self, query};
use crate::error::{EngineError, Result};
use crate::event::{Cause, ChangeEvent, ChangeEventBus, ChangeKind, Scope};
use crate::link::{self, LinkOutcome, Validation};
use crate::model::{Item, ItemId, LinkedItemRow, List, ListId, ListType, UserId};
use crate::propagate::{self, AffectedItem, FieldChanges, PropagationOutcome};
use crate::time;

/// Owns the store, the configuration, and the event bus.
pub struct Engine {
    conn: Connection,
    bus: ChangeEventBus,
    config: EngineConfig,
}

impl Engine {
    /// Open (creating if needed) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub fn open(path: &Path, config: EngineConfig) -> anyhow::Result<Self> {
        let conn = db::open_store(path)?;
        info!(path = %path.display(), "engine opened");
        Ok(Self { conn, bus: ChangeEventBus::new(), config })
    }

    /// An engine over an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if migration fails.
    pub fn in_memory(config: EngineConfig) -> anyhow::Result<Self> {
        let conn = db::open_in_memory()?;
        Ok(Self { conn, bus: ChangeEventBus::new(), config })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The event bus. Subscribe here before mutating to observe changes.
    #[must_use]
    pub const fn events(&self) -> &ChangeEventBus {
        &self.bus
    }

    // -----------------------------------------------------------------------
    // Event plumbing
    // -----------------------------------------------------------------------

    /// Delivery scopes for anything in the given list: the list scope plus
    /// one user scope per person who can see it.
    fn scopes_for_list(&self, list_id: &ListId) -> Result<Vec<Scope>> {
        let mut scopes = vec![Scope::List(list_id.clone())];
        if let Some(list) = query::get_list(&self.conn, list_id)? {
            scopes.push(Scope::User(list.owner));
            scopes.extend(list.shared_with.into_iter().map(Scope::User));
        }
        Ok(scopes)
    }

    fn publish_item_event(
        &self,
        kind: ChangeKind,
        before: Option<Item>,
        after: Option<Item>,
        cause: Cause,
        wall_ts_us: i64,
    ) -> Result<()> {
        let Some(list_id) = after
            .as_ref()
            .or(before.as_ref())
            .map(|item| item.list_id.clone())
        else {
            return Ok(());
        };
        let scopes = self.scopes_for_list(&list_id)?;
        let event = ChangeEvent::Item { kind, before, after, cause: Some(cause), wall_ts_us };
        self.bus.publish(&scopes, &event);
        Ok(())
    }

    fn publish_list_event(
        &self,
        kind: ChangeKind,
        before: Option<List>,
        after: Option<List>,
        wall_ts_us: i64,
    ) -> Result<()> {
        let Some(list_id) = after
            .as_ref()
            .or(before.as_ref())
            .map(|list| list.id.clone())
        else {
            return Ok(());
        };
        let scopes = self.scopes_for_list(&list_id)?;
        let event = ChangeEvent::List { kind, before, after, wall_ts_us };
        self.bus.publish(&scopes, &event);
        Ok(())
    }

    /// Emit an update event for each item whose linked set changed, using
    /// snapshots captured before the write.
    fn publish_link_updates(
        &self,
        touched: &[Item],
        cause: Cause,
        wall_ts_us: i64,
    ) -> Result<()> {
        for before in touched {
            let Some(after) = query::get_item(&self.conn, &before.id)? else {
                continue;
            };
            if after.linked != before.linked || after.updated_at_us != before.updated_at_us {
                self.publish_item_event(
                    ChangeKind::Update,
                    Some(before.clone()),
                    Some(after),
                    cause,
                    wall_ts_us,
                )?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    /// Create a list owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn create_list(
        &mut self,
        owner: &UserId,
        title: &str,
        list_type: ListType,
    ) -> Result<List> {
        let now = time::now_us();
        let id = ListId::mint();
        self.conn.execute(
            "INSERT INTO lists (list_id, title, list_type, owner, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![id.as_str(), title, list_type.as_str(), owner.as_str(), now],
        )?;
        let list = query::get_list(&self.conn, &id)?
            .ok_or_else(|| EngineError::ListNotFound(id.clone()))?;
        self.publish_list_event(ChangeKind::Insert, None, Some(list.clone()), now)?;
        Ok(list)
    }

    /// Share a list with another user. Sharing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ListNotFound`] if the list is absent or not
    /// owned by `owner`, or a storage error.
    pub fn share_list(
        &mut self,
        owner: &UserId,
        list_id: &ListId,
        with: &UserId,
    ) -> Result<List> {
        let now = time::now_us();
        let before = query::get_list(&self.conn, list_id)?
            .filter(|list| list.owner == *owner)
            .ok_or_else(|| EngineError::ListNotFound(list_id.clone()))?;

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO list_shares (list_id, user_id, created_at_us)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![list_id.as_str(), with.as_str(), now],
        )?;
        if inserted > 0 {
            self.conn.execute(
                "UPDATE lists SET updated_at_us = ?2 WHERE list_id = ?1",
                rusqlite::params![list_id.as_str(), now],
            )?;
        }
        let after = query::get_list(&self.conn, list_id)?
            .ok_or_else(|| EngineError::ListNotFound(list_id.clone()))?;
        if inserted > 0 {
            self.publish_list_event(ChangeKind::Update, Some(before), Some(after.clone()), now)?;
        }
        Ok(after)
    }

    /// Fetch a list visible to `user`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ListNotFound`] if absent or invisible.
    pub fn get_list(&self, user: &UserId, list_id: &ListId) -> Result<List> {
        query::get_list(&self.conn, list_id)?
            .filter(|list| list.visible_to(user))
            .ok_or_else(|| EngineError::ListNotFound(list_id.clone()))
    }

    /// Items of a visible list, position-ordered.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ListNotFound`] if absent or invisible.
    pub fn items_in_list(&self, user: &UserId, list_id: &ListId) -> Result<Vec<Item>> {
        if !query::list_visible_to(&self.conn, list_id, user)? {
            return Err(EngineError::ListNotFound(list_id.clone()));
        }
        query::items_in_list(&self.conn, list_id)
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Create an item at the end of a visible list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ListNotFound`] if the list is absent or
    /// invisible, or a storage error.
    pub fn create_item(
        &mut self,
        user: &UserId,
        list_id: &ListId,
        content: &str,
        target_date: Option<chrono::NaiveDate>,
    ) -> Result<Item> {
        if !query::list_visible_to(&self.conn, list_id, user)? {
            return Err(EngineError::ListNotFound(list_id.clone()));
        }
        let now = time::now_us();
        let id = ItemId::mint();
        self.conn.execute(
            "INSERT INTO items
                 (item_id, list_id, content, is_completed, position, target_date,
                  created_at_us, updated_at_us)
             SELECT ?1, ?2, ?3, 0,
                    COALESCE(MAX(position) + 1, 0), ?4, ?5, ?5
             FROM items WHERE list_id = ?2",
            rusqlite::params![
                id.as_str(),
                list_id.as_str(),
                content,
                target_date.map(|d| d.format("%Y-%m-%d").to_string()),
                now,
            ],
        )?;
        let item = query::get_item(&self.conn, &id)?
            .ok_or_else(|| EngineError::ItemNotFound(id.clone()))?;
        self.publish_item_event(ChangeKind::Insert, None, Some(item.clone()), Cause::User, now)?;
        Ok(item)
    }

    /// Fetch an item (link sets included) from a list visible to `user`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if absent or invisible.
    pub fn get_item(&self, user: &UserId, item_id: &ItemId) -> Result<Item> {
        if query::item_list_if_visible(&self.conn, item_id, user)?.is_none() {
            return Err(EngineError::ItemNotFound(item_id.clone()));
        }
        query::get_item(&self.conn, item_id)?
            .ok_or_else(|| EngineError::ItemNotFound(item_id.clone()))
    }

    /// Delete an item. Its edges go with it; former link partners get an
    /// update event because their linked sets shrank.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if absent or invisible.
    pub fn delete_item(&mut self, user: &UserId, item_id: &ItemId) -> Result<()> {
        let item = self.get_item(user, item_id)?;
        let now = time::now_us();

        // Capture partner snapshots while the edges still exist.
        let mut partners = Vec::new();
        for partner_id in item
            .linked
            .children
            .iter()
            .chain(&item.linked.parents)
            .chain(&item.linked.bidirectional)
        {
            if let Some(partner) = query::get_item(&self.conn, partner_id)? {
                partners.push(partner);
            }
        }

        // Cascading foreign keys remove the item's edge rows.
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM items WHERE item_id = ?1",
            rusqlite::params![item_id.as_str()],
        )?;
        for partner in &partners {
            tx.execute(
                "UPDATE items SET updated_at_us = ?2 WHERE item_id = ?1",
                rusqlite::params![partner.id.as_str(), now],
            )?;
        }
        tx.commit()?;

        self.publish_item_event(ChangeKind::Delete, Some(item), None, Cause::User, now)?;
        self.publish_link_updates(&partners, Cause::User, now)?;
        Ok(())
    }

    /// Update an item's fields; a completion flip propagates to all
    /// transitive children.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if absent or invisible, an
    /// integrity fault from a corrupted graph, or a storage error.
    pub fn update_item_with_propagation(
        &mut self,
        user: &UserId,
        item_id: &ItemId,
        changes: &FieldChanges,
    ) -> Result<PropagationOutcome> {
        let before = self.get_item(user, item_id)?;
        let now = time::now_us();

        // Snapshot descendants that will flip, for their event `before`s.
        let previewed = match changes.is_completed {
            Some(status) if status != before.is_completed => {
                propagate::preview_propagation(&self.conn, item_id, status)?
            }
            _ => Vec::new(),
        };
        let mut flipped_before = Vec::new();
        for affected in &previewed {
            if let Some(item) = query::get_item(&self.conn, &affected.item_id)? {
                flipped_before.push(item);
            }
        }

        let outcome = propagate::update_with_propagation(
            &mut self.conn,
            item_id,
            changes,
            self.config.max_propagation_nodes,
            now,
        )?;

        self.publish_item_event(
            ChangeKind::Update,
            Some(before),
            Some(outcome.updated_item.clone()),
            Cause::User,
            now,
        )?;
        for snapshot in flipped_before {
            let Some(after) = query::get_item(&self.conn, &snapshot.id)? else {
                continue;
            };
            self.publish_item_event(
                ChangeKind::Update,
                Some(snapshot),
                Some(after),
                Cause::Propagated,
                now,
            )?;
        }
        Ok(outcome)
    }

    /// Dry run of a completion flip: which descendants would change.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if absent or invisible.
    pub fn preview_status_propagation(
        &self,
        user: &UserId,
        item_id: &ItemId,
        new_status: bool,
    ) -> Result<Vec<AffectedItem>> {
        if query::item_list_if_visible(&self.conn, item_id, user)?.is_none() {
            return Err(EngineError::ItemNotFound(item_id.clone()));
        }
        propagate::preview_propagation(&self.conn, item_id, new_status)
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Validate a proposed link batch without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if the parent is absent or
    /// invisible, or a storage error. Per-child problems are reported in
    /// the returned [`Validation`], never as errors.
    pub fn validate_link_creation(
        &self,
        user: &UserId,
        parent: &ItemId,
        proposed: &[ItemId],
    ) -> Result<Validation> {
        link::validate_links(
            &self.conn,
            user,
            parent,
            proposed,
            self.config.max_links_per_batch,
        )
    }

    /// Validate and apply a parent→child link batch, with partial success.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if the parent is absent or
    /// invisible, or a storage error.
    pub fn create_parent_child_link(
        &mut self,
        user: &UserId,
        parent: &ItemId,
        proposed: &[ItemId],
    ) -> Result<LinkOutcome> {
        let now = time::now_us();
        let mut touched = Vec::new();
        if let Some(item) = query::get_item(&self.conn, parent)? {
            touched.push(item);
        }
        for child in proposed {
            if let Some(item) = query::get_item(&self.conn, child)? {
                touched.push(item);
            }
        }

        let outcome = link::create_links(
            &mut self.conn,
            user,
            parent,
            proposed,
            self.config.max_links_per_batch,
            now,
        )?;
        if outcome.created > 0 {
            self.publish_link_updates(&touched, Cause::User, now)?;
        }
        Ok(outcome)
    }

    /// Remove a parent→child link. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if the parent is absent or
    /// invisible, or a storage error.
    pub fn remove_parent_child_link(
        &mut self,
        user: &UserId,
        parent: &ItemId,
        child: &ItemId,
    ) -> Result<bool> {
        if query::item_list_if_visible(&self.conn, parent, user)?.is_none() {
            return Err(EngineError::ItemNotFound(parent.clone()));
        }
        let now = time::now_us();
        let mut touched = Vec::new();
        for id in [parent, child] {
            if let Some(item) = query::get_item(&self.conn, id)? {
                touched.push(item);
            }
        }
        let removed = link::remove_link(&mut self.conn, parent, child, now)?;
        if removed {
            self.publish_link_updates(&touched, Cause::User, now)?;
        }
        Ok(removed)
    }

    /// Child items of an item, with their list context.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if absent or invisible.
    pub fn get_child_items(&self, user: &UserId, item_id: &ItemId) -> Result<Vec<LinkedItemRow>> {
        if query::item_list_if_visible(&self.conn, item_id, user)?.is_none() {
            return Err(EngineError::ItemNotFound(item_id.clone()));
        }
        query::child_rows(&self.conn, item_id)
    }

    /// Parent items of an item, with their list context.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if absent or invisible.
    pub fn get_parent_items(&self, user: &UserId, item_id: &ItemId) -> Result<Vec<LinkedItemRow>> {
        if query::item_list_if_visible(&self.conn, item_id, user)?.is_none() {
            return Err(EngineError::ItemNotFound(item_id.clone()));
        }
        query::parent_rows(&self.conn, item_id)
    }
}
