//! Read paths over the store: entity fetches, visibility checks, link-set
//! assembly, and graph snapshot loading.
//!
//! Everything here is read-only and safe to run outside a write transaction;
//! cycle-prevention correctness depends only on the write path re-checking
//! inside its own transaction, not on these reads being linearizable.

#![allow(clippy::module_name_repetitions)]

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::Result;
use crate::graph::adjacency::LinkGraph;
use crate::model::{Item, ItemId, LinkedItemRow, LinkedItems, List, ListId, ListType, UserId};

fn parse_list_type(raw: &str, column: usize) -> rusqlite::Result<ListType> {
    ListType::from_str(raw).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
    })
}

fn parse_target_date(raw: Option<String>, column: usize) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
        })
    })
    .transpose()
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let target_date: Option<String> = row.get(5)?;
    Ok(Item {
        id: ItemId::new_unchecked(row.get::<_, String>(0)?),
        list_id: ListId::new_unchecked(row.get::<_, String>(1)?),
        content: row.get(2)?,
        is_completed: row.get::<_, i64>(3)? != 0,
        position: row.get(4)?,
        target_date: parse_target_date(target_date, 5)?,
        linked: LinkedItems::default(),
        created_at_us: row.get(6)?,
        updated_at_us: row.get(7)?,
    })
}

const ITEM_COLUMNS: &str = "item_id, list_id, content, is_completed, position, target_date, \
                            created_at_us, updated_at_us";

/// Fetch a list with its share set, or `None` if absent.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn get_list(conn: &Connection, list_id: &ListId) -> Result<Option<List>> {
    let list = conn
        .query_row(
            "SELECT list_id, title, list_type, owner, created_at_us, updated_at_us
             FROM lists WHERE list_id = ?1",
            params![list_id.as_str()],
            |row| {
                let list_type: String = row.get(2)?;
                Ok(List {
                    id: ListId::new_unchecked(row.get::<_, String>(0)?),
                    title: row.get(1)?,
                    list_type: parse_list_type(&list_type, 2)?,
                    owner: UserId::new_unchecked(row.get::<_, String>(3)?),
                    shared_with: Vec::new(),
                    created_at_us: row.get(4)?,
                    updated_at_us: row.get(5)?,
                })
            },
        )
        .optional()?;

    let Some(mut list) = list else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT user_id FROM list_shares WHERE list_id = ?1 ORDER BY user_id")?;
    list.shared_with = stmt
        .query_map(params![list_id.as_str()], |row| {
            Ok(UserId::new_unchecked(row.get::<_, String>(0)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(list))
}

/// `true` if the list exists and is visible (owned or shared) to the user.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn list_visible_to(conn: &Connection, list_id: &ListId, user: &UserId) -> Result<bool> {
    let visible: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM lists l
            WHERE l.list_id = ?1
              AND (l.owner = ?2
                   OR EXISTS(SELECT 1 FROM list_shares s
                             WHERE s.list_id = l.list_id AND s.user_id = ?2))
        )",
        params![list_id.as_str(), user.as_str()],
        |row| row.get(0),
    )?;
    Ok(visible)
}

/// The owning list of an item, if the item exists and its list is visible to
/// the user. Existence and visibility collapse into one answer on purpose:
/// a caller must not be able to distinguish "absent" from "not yours".
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn item_list_if_visible(
    conn: &Connection,
    item_id: &ItemId,
    user: &UserId,
) -> Result<Option<ListId>> {
    let list_id = conn
        .query_row(
            "SELECT i.list_id FROM items i
             JOIN lists l ON l.list_id = i.list_id
             WHERE i.item_id = ?1
               AND (l.owner = ?2
                    OR EXISTS(SELECT 1 FROM list_shares s
                              WHERE s.list_id = l.list_id AND s.user_id = ?2))",
            params![item_id.as_str(), user.as_str()],
            |row| Ok(ListId::new_unchecked(row.get::<_, String>(0)?)),
        )
        .optional()?;
    Ok(list_id)
}

/// The owning list of an item regardless of who can see it. Link validation
/// needs the distinction the visibility-gated lookup deliberately erases:
/// an existing-but-unshared child is rejected differently from a missing one.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn item_list(conn: &Connection, item_id: &ItemId) -> Result<Option<ListId>> {
    let list_id = conn
        .query_row(
            "SELECT list_id FROM items WHERE item_id = ?1",
            params![item_id.as_str()],
            |row| Ok(ListId::new_unchecked(row.get::<_, String>(0)?)),
        )
        .optional()?;
    Ok(list_id)
}

/// Assemble the three relation sets for an item from the edge tables.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn linked_items_for(conn: &Connection, item_id: &ItemId) -> Result<LinkedItems> {
    let mut linked = LinkedItems::default();

    let mut stmt = conn.prepare("SELECT child_id FROM item_links WHERE parent_id = ?1")?;
    linked.children = stmt
        .query_map(params![item_id.as_str()], |row| {
            Ok(ItemId::new_unchecked(row.get::<_, String>(0)?))
        })?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;

    let mut stmt = conn.prepare("SELECT parent_id FROM item_links WHERE child_id = ?1")?;
    linked.parents = stmt
        .query_map(params![item_id.as_str()], |row| {
            Ok(ItemId::new_unchecked(row.get::<_, String>(0)?))
        })?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;

    // Peers are stored once per pair with item_a < item_b; read both sides.
    let mut stmt = conn.prepare(
        "SELECT item_b FROM item_peers WHERE item_a = ?1
         UNION ALL
         SELECT item_a FROM item_peers WHERE item_b = ?1",
    )?;
    linked.bidirectional = stmt
        .query_map(params![item_id.as_str()], |row| {
            Ok(ItemId::new_unchecked(row.get::<_, String>(0)?))
        })?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;

    Ok(linked)
}

/// Fetch an item with its link sets populated, or `None` if absent.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn get_item(conn: &Connection, item_id: &ItemId) -> Result<Option<Item>> {
    let item = conn
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = ?1"),
            params![item_id.as_str()],
            item_from_row,
        )
        .optional()?;

    let Some(mut item) = item else {
        return Ok(None);
    };
    item.linked = linked_items_for(conn, item_id)?;
    Ok(Some(item))
}

/// All items in a list, position-ordered, link sets populated.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn items_in_list(conn: &Connection, list_id: &ListId) -> Result<Vec<Item>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE list_id = ?1 ORDER BY position, item_id"
    ))?;
    let mut items = stmt
        .query_map(params![list_id.as_str()], item_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for item in &mut items {
        item.linked = linked_items_for(conn, &item.id)?;
    }
    Ok(items)
}

/// Number of existing child edges on a parent.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn child_count(conn: &Connection, parent: &ItemId) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM item_links WHERE parent_id = ?1",
        params![parent.as_str()],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// `true` if the directed edge parent→child exists.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn has_edge(conn: &Connection, parent: &ItemId, child: &ItemId) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM item_links WHERE parent_id = ?1 AND child_id = ?2)",
        params![parent.as_str(), child.as_str()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn linked_rows(conn: &Connection, sql: &str, item_id: &ItemId) -> Result<Vec<LinkedItemRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![item_id.as_str()], |row| {
            let list_type: String = row.get(5)?;
            Ok(LinkedItemRow {
                id: ItemId::new_unchecked(row.get::<_, String>(0)?),
                content: row.get(1)?,
                is_completed: row.get::<_, i64>(2)? != 0,
                list_id: ListId::new_unchecked(row.get::<_, String>(3)?),
                list_title: row.get(4)?,
                list_type: parse_list_type(&list_type, 5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// The child items of a parent, joined with their owning list's title and
/// type so a client can render the cross-list rows directly.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn child_rows(conn: &Connection, parent: &ItemId) -> Result<Vec<LinkedItemRow>> {
    linked_rows(
        conn,
        "SELECT i.item_id, i.content, i.is_completed, i.list_id, l.title, l.list_type
         FROM item_links e
         JOIN items i ON i.item_id = e.child_id
         JOIN lists l ON l.list_id = i.list_id
         WHERE e.parent_id = ?1
         ORDER BY i.item_id",
        parent,
    )
}

/// The parent items of a child, same row shape as [`child_rows`].
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn parent_rows(conn: &Connection, child: &ItemId) -> Result<Vec<LinkedItemRow>> {
    linked_rows(
        conn,
        "SELECT i.item_id, i.content, i.is_completed, i.list_id, l.title, l.list_type
         FROM item_links e
         JOIN items i ON i.item_id = e.parent_id
         JOIN lists l ON l.list_id = i.list_id
         WHERE e.child_id = ?1
         ORDER BY i.item_id",
        child,
    )
}

/// Materialize the full children-edge adjacency snapshot.
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn load_graph(conn: &Connection) -> Result<LinkGraph> {
    let mut stmt = conn.prepare("SELECT item_id FROM items")?;
    let items = stmt
        .query_map([], |row| Ok(ItemId::new_unchecked(row.get::<_, String>(0)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare("SELECT parent_id, child_id FROM item_links")?;
    let edges = stmt
        .query_map([], |row| {
            Ok((
                ItemId::new_unchecked(row.get::<_, String>(0)?),
                ItemId::new_unchecked(row.get::<_, String>(1)?),
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(LinkGraph::from_edges(items, edges))
}
