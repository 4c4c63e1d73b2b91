//! Transactional application of link edges.
//!
//! Both directions of an edge live in one row of the edge table, so "write
//! both sides together or neither" is structural. What the transaction adds
//! is batch atomicity — every accepted edge in a call lands together — and
//! the write-time re-check: acceptance was computed against a possibly
//! stale read, so the cycle test runs again on a fresh graph snapshot
//! inside the IMMEDIATE transaction, where SQLite's writer serialization
//! guarantees no concurrent batch can interleave. Two racing batches can
//! therefore not both observe "acyclic" and jointly close a loop: the
//! second re-check sees the first batch's edges.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use rusqlite::{Connection, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::validate::{self, RejectReason};
use crate::db::query;
use crate::error::Result;
use crate::graph::cycles;
use crate::model::{ItemId, UserId};

/// Result of applying a link batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOutcome {
    /// Number of edges actually inserted. Re-creating an existing edge is a
    /// successful no-op and does not count.
    pub created: usize,
    /// One human-readable line per rejected proposal.
    pub warnings: Vec<String>,
}

/// Touch an item's `updated_at_us`, marking a linked-set change.
fn touch_item(conn: &Connection, item: &ItemId, now_us: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE items SET updated_at_us = ?2 WHERE item_id = ?1",
        params![item.as_str(), now_us],
    )?;
    Ok(())
}

/// Validate and apply a batch of parent→child links.
///
/// Rejected proposals become warnings; accepted edges are written in one
/// transaction. A proposal that passed validation but fails the write-time
/// re-check (another writer landed first) is demoted to a warning as well,
/// not an error — the caller sees the same partial-success shape either way.
///
/// # Errors
///
/// Returns an error if the parent is absent/invisible or on storage
/// failure; storage failure rolls back the entire batch.
pub fn create_links(
    conn: &mut Connection,
    acting_user: &UserId,
    parent: &ItemId,
    proposed: &[ItemId],
    max_links_per_batch: usize,
    now_us: i64,
) -> Result<LinkOutcome> {
    let validation = validate::validate_links(conn, acting_user, parent, proposed, max_links_per_batch)?;
    let mut warnings = validation.warnings();

    if validation.acceptable.is_empty() {
        return Ok(LinkOutcome { created: 0, warnings });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut created = 0_usize;
    {
        // Fresh snapshot under the write lock. Within one batch all edges
        // share the same parent, so any new cycle must run through exactly
        // one batch edge; re-checking each edge alone is sufficient.
        let graph = query::load_graph(&tx)?;

        for child in &validation.acceptable {
            if cycles::would_create_cycle(&graph, parent, child).is_some() {
                debug!(parent = %parent, child = %child, "edge lost write-time re-check");
                warnings.push(format!(
                    "{} ({child})",
                    RejectReason::CircularDependency.warning()
                ));
                continue;
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO item_links (parent_id, child_id, created_at_us)
                 VALUES (?1, ?2, ?3)",
                params![parent.as_str(), child.as_str(), now_us],
            )?;
            if inserted > 0 {
                created += 1;
                touch_item(&tx, child, now_us)?;
            }
        }

        if created > 0 {
            touch_item(&tx, parent, now_us)?;
        }
    }
    tx.commit()?;

    debug!(parent = %parent, created, warnings = warnings.len(), "link batch applied");
    Ok(LinkOutcome { created, warnings })
}

/// Remove the edge parent→child. Idempotent: removing an absent edge
/// succeeds and returns `false`.
///
/// # Errors
///
/// Returns an error on storage failure; nothing is removed in that case.
pub fn remove_link(
    conn: &mut Connection,
    parent: &ItemId,
    child: &ItemId,
    now_us: i64,
) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let removed = tx.execute(
        "DELETE FROM item_links WHERE parent_id = ?1 AND child_id = ?2",
        params![parent.as_str(), child.as_str()],
    )?;
    if removed > 0 {
        touch_item(&tx, parent, now_us)?;
        touch_item(&tx, child, now_us)?;
    }
    tx.commit()?;
    Ok(removed > 0)
}

/// Add a non-propagating peer link between two items. Pairs are stored once,
/// normalized so the smaller id is first; re-adding is a no-op.
///
/// # Errors
///
/// Returns an error on storage failure, including a self-peer (rejected by
/// the table's CHECK constraint).
pub fn add_peer(
    conn: &mut Connection,
    a: &ItemId,
    b: &ItemId,
    now_us: i64,
) -> Result<bool> {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO item_peers (item_a, item_b, created_at_us) VALUES (?1, ?2, ?3)",
        params![first.as_str(), second.as_str(), now_us],
    )?;
    if inserted > 0 {
        touch_item(&tx, a, now_us)?;
        touch_item(&tx, b, now_us)?;
    }
    tx.commit()?;
    Ok(inserted > 0)
}

/// Remove a peer link. Idempotent like [`remove_link`].
///
/// # Errors
///
/// Returns an error on storage failure.
pub fn remove_peer(
    conn: &mut Connection,
    a: &ItemId,
    b: &ItemId,
    now_us: i64,
) -> Result<bool> {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let removed = tx.execute(
        "DELETE FROM item_peers WHERE item_a = ?1 AND item_b = ?2",
        params![first.as_str(), second.as_str()],
    )?;
    if removed > 0 {
        touch_item(&tx, a, now_us)?;
        touch_item(&tx, b, now_us)?;
    }
    tx.commit()?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn iid(s: &str) -> ItemId {
        ItemId::new_unchecked(s)
    }

    fn uid(s: &str) -> UserId {
        UserId::new_unchecked(s)
    }

    fn seeded() -> Connection {
        let conn = db::open_in_memory().expect("open store");
        conn.execute_batch(
            "INSERT INTO lists VALUES ('sl-a', 'List A', 'simple', 'su-alice', 0, 0);
             INSERT INTO lists VALUES ('sl-b', 'List B', 'grocery', 'su-alice', 0, 0);
             INSERT INTO items VALUES ('sk-a', 'sl-a', 'a', 0, 0, NULL, 0, 0);
             INSERT INTO items VALUES ('sk-b', 'sl-a', 'b', 0, 1, NULL, 0, 0);
             INSERT INTO items VALUES ('sk-c', 'sl-b', 'c', 0, 0, NULL, 0, 0);
             INSERT INTO items VALUES ('sk-d', 'sl-b', 'd', 0, 1, NULL, 0, 0);",
        )
        .expect("seed");
        conn
    }

    fn create(conn: &mut Connection, parent: &str, children: &[&str]) -> LinkOutcome {
        let proposed: Vec<ItemId> = children.iter().map(|c| iid(c)).collect();
        create_links(conn, &uid("su-alice"), &iid(parent), &proposed, 20, 100).expect("create")
    }

    // -----------------------------------------------------------------------
    // create_links
    // -----------------------------------------------------------------------

    #[test]
    fn single_edge_created_symmetrically() {
        let mut conn = seeded();
        let outcome = create(&mut conn, "sk-a", &["sk-b"]);
        assert_eq!(outcome.created, 1);
        assert!(outcome.warnings.is_empty());

        let parent = query::get_item(&conn, &iid("sk-a")).expect("query").expect("present");
        let child = query::get_item(&conn, &iid("sk-b")).expect("query").expect("present");
        assert!(parent.linked.children.contains(&iid("sk-b")));
        assert!(child.linked.parents.contains(&iid("sk-a")));
        assert_eq!(parent.updated_at_us, 100);
        assert_eq!(child.updated_at_us, 100);
    }

    #[test]
    fn recreating_edge_is_noop() {
        let mut conn = seeded();
        assert_eq!(create(&mut conn, "sk-a", &["sk-b"]).created, 1);

        let outcome = create(&mut conn, "sk-a", &["sk-b"]);
        assert_eq!(outcome.created, 0, "second create must not count");
        assert!(outcome.warnings.is_empty());

        let edges: i64 = conn
            .query_row("SELECT COUNT(*) FROM item_links", [], |row| row.get(0))
            .expect("count");
        assert_eq!(edges, 1, "no duplicate edge rows");
    }

    #[test]
    fn mixed_batch_partial_success() {
        let mut conn = seeded();
        create(&mut conn, "sk-a", &["sk-b"]);

        // b proposes c, d (fine) and a (would close a cycle).
        let outcome = create(&mut conn, "sk-b", &["sk-c", "sk-d", "sk-a"]);
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("circular"));

        let parent = query::get_item(&conn, &iid("sk-b")).expect("query").expect("present");
        assert!(parent.linked.children.contains(&iid("sk-c")));
        assert!(parent.linked.children.contains(&iid("sk-d")));
        assert!(!parent.linked.children.contains(&iid("sk-a")));
    }

    #[test]
    fn fully_rejected_batch_creates_nothing() {
        let mut conn = seeded();
        let outcome = create(&mut conn, "sk-a", &["sk-a", "sk-ghost"]);
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.warnings.len(), 2);

        let edges: i64 = conn
            .query_row("SELECT COUNT(*) FROM item_links", [], |row| row.get(0))
            .expect("count");
        assert_eq!(edges, 0);
    }

    // -----------------------------------------------------------------------
    // remove_link
    // -----------------------------------------------------------------------

    #[test]
    fn remove_link_deletes_both_sides() {
        let mut conn = seeded();
        create(&mut conn, "sk-a", &["sk-b"]);

        assert!(remove_link(&mut conn, &iid("sk-a"), &iid("sk-b"), 200).expect("remove"));

        let parent = query::get_item(&conn, &iid("sk-a")).expect("query").expect("present");
        let child = query::get_item(&conn, &iid("sk-b")).expect("query").expect("present");
        assert!(parent.linked.children.is_empty());
        assert!(child.linked.parents.is_empty());
    }

    #[test]
    fn remove_absent_link_is_idempotent() {
        let mut conn = seeded();
        assert!(!remove_link(&mut conn, &iid("sk-a"), &iid("sk-b"), 200).expect("remove"));
    }

    #[test]
    fn removal_unblocks_reverse_link() {
        let mut conn = seeded();
        create(&mut conn, "sk-a", &["sk-b"]);
        remove_link(&mut conn, &iid("sk-a"), &iid("sk-b"), 200).expect("remove");

        let outcome = create(&mut conn, "sk-b", &["sk-a"]);
        assert_eq!(outcome.created, 1);
        assert!(outcome.warnings.is_empty());
    }

    // -----------------------------------------------------------------------
    // Peers
    // -----------------------------------------------------------------------

    #[test]
    fn peer_links_are_order_insensitive() {
        let mut conn = seeded();
        assert!(add_peer(&mut conn, &iid("sk-b"), &iid("sk-a"), 100).expect("add"));
        // Same pair from the other direction is a no-op.
        assert!(!add_peer(&mut conn, &iid("sk-a"), &iid("sk-b"), 101).expect("add"));

        let item = query::get_item(&conn, &iid("sk-a")).expect("query").expect("present");
        assert!(item.linked.bidirectional.contains(&iid("sk-b")));

        assert!(remove_peer(&mut conn, &iid("sk-b"), &iid("sk-a"), 102).expect("remove"));
        assert!(!remove_peer(&mut conn, &iid("sk-a"), &iid("sk-b"), 103).expect("remove"));
    }

    #[test]
    fn peers_never_enter_the_propagation_graph() {
        let mut conn = seeded();
        add_peer(&mut conn, &iid("sk-a"), &iid("sk-b"), 100).expect("add");

        let graph = query::load_graph(&conn).expect("load");
        assert!(!graph.has_edge(&iid("sk-a"), &iid("sk-b")));
        assert!(!graph.has_edge(&iid("sk-b"), &iid("sk-a")));
    }
}
