//! SQLite schema definition.

/// URL prefix handed out for assets until a backend base is configured.
pub const DEFAULT_ASSET_BASE: &str = "asset://drug-images";

/// Complete database schema for the indent core.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Inventory Items
-- ============================================================================

CREATE TABLE IF NOT EXISTS inventory_items (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    item_code TEXT,
    pku TEXT,
    purchase_type TEXT CHECK (purchase_type IN ('LP', 'APPL')),
    std_kt TEXT CHECK (std_kt IN ('STD', 'KT')),
    category TEXT,
    row TEXT,
    section TEXT,
    bin TEXT,
    max_qty INTEGER NOT NULL DEFAULT 0 CHECK (max_qty >= 0),
    balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
    indent_source TEXT,
    remarks TEXT,
    is_short_exp INTEGER NOT NULL DEFAULT 0,
    short_exp TEXT,                               -- YYYY-MM-DD
    image_url TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_items_name ON inventory_items(name);
CREATE INDEX IF NOT EXISTS idx_items_short_exp ON inventory_items(is_short_exp, short_exp);

-- ============================================================================
-- Indent Requests
-- ============================================================================

-- item_id is not a foreign key: requests outlive deleted items
-- and render with an empty description.
CREATE TABLE IF NOT EXISTS indent_requests (
    id TEXT PRIMARY KEY,
    item_id TEXT NOT NULL,
    requested_qty TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Pending' CHECK (status IN ('Pending', 'Approved')),
    created_at TEXT NOT NULL                      -- RFC3339 UTC, microseconds
);

CREATE INDEX IF NOT EXISTS idx_requests_status_created ON indent_requests(status, created_at);
CREATE INDEX IF NOT EXISTS idx_requests_item ON indent_requests(item_id);

-- Approved requests are history
CREATE TRIGGER IF NOT EXISTS indent_requests_approved_readonly
BEFORE UPDATE ON indent_requests
WHEN old.status = 'Approved'
BEGIN
    SELECT RAISE(ABORT, 'approved indent requests are read-only');
END;

-- ============================================================================
-- Assets (drug images)
-- ============================================================================

CREATE TABLE IF NOT EXISTS assets (
    path TEXT PRIMARY KEY,
    bytes BLOB NOT NULL,
    content_type TEXT NOT NULL,
    etag TEXT NOT NULL,                           -- SHA-256 hex of bytes
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
"#;
