//! Canonical SQLite schema for the link graph store.
//!
//! The link relation lives in an edge table rather than denormalized sets on
//! each item:
//! - `item_links(parent_id, child_id)` with a composite primary key gives
//!   duplicate-free edges, and the reverse index makes parent lookups as
//!   cheap as child lookups
//! - `item_peers` holds non-propagating bidirectional links, normalized so
//!   each pair is stored once with `item_a < item_b`
//! - `ON DELETE CASCADE` on every edge table removes an item's edges in the
//!   same transaction that deletes the item
//! - `store_meta` tracks the applied schema version

/// Migration v1: entity tables, edge tables, store metadata.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS lists (
    list_id TEXT PRIMARY KEY,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    list_type TEXT NOT NULL CHECK (list_type IN ('simple', 'grocery', 'countdown')),
    owner TEXT NOT NULL CHECK (owner LIKE 'su-%'),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (list_id LIKE 'sl-%')
);

CREATE TABLE IF NOT EXISTS list_shares (
    list_id TEXT NOT NULL REFERENCES lists(list_id) ON DELETE CASCADE,
    user_id TEXT NOT NULL CHECK (user_id LIKE 'su-%'),
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (list_id, user_id)
);

CREATE TABLE IF NOT EXISTS items (
    item_id TEXT PRIMARY KEY,
    list_id TEXT NOT NULL REFERENCES lists(list_id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0 CHECK (is_completed IN (0, 1)),
    position INTEGER NOT NULL DEFAULT 0,
    target_date TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (item_id LIKE 'sk-%')
);

CREATE TABLE IF NOT EXISTS item_links (
    parent_id TEXT NOT NULL REFERENCES items(item_id) ON DELETE CASCADE,
    child_id TEXT NOT NULL REFERENCES items(item_id) ON DELETE CASCADE,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (parent_id, child_id),
    CHECK (parent_id <> child_id)
);

CREATE TABLE IF NOT EXISTS item_peers (
    item_a TEXT NOT NULL REFERENCES items(item_id) ON DELETE CASCADE,
    item_b TEXT NOT NULL REFERENCES items(item_id) ON DELETE CASCADE,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (item_a, item_b),
    CHECK (item_a < item_b)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
"#;

/// Migration v2: read-path indexes.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_items_list_position
    ON items(list_id, position, item_id);

CREATE INDEX IF NOT EXISTS idx_item_links_child
    ON item_links(child_id, parent_id);

CREATE INDEX IF NOT EXISTS idx_item_peers_b
    ON item_peers(item_b, item_a);

CREATE INDEX IF NOT EXISTS idx_list_shares_user
    ON list_shares(user_id, list_id);

UPDATE store_meta SET schema_version = 2 WHERE id = 1;
"#;

/// Indexes expected by the engine's read paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_items_list_position",
    "idx_item_links_child",
    "idx_item_peers_b",
    "idx_list_shares_user",
];
