//! Database layer for the indent core.
//!
//! SQLite implementation of the [`IndentStore`](crate::store::IndentStore)
//! boundary, plus inventory maintenance and the image asset store.

mod assets;
mod inventory;
mod requests;
mod schema;

pub use assets::*;
#[allow(unused_imports)]
pub use inventory::*;
#[allow(unused_imports)]
pub use requests::*;
pub use schema::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::store::{ChangeEvent, ChangeKind, Table};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Handle returned by [`Database::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ChangeCallback = Box<dyn Fn(&ChangeEvent) + Send>;

struct Subscriber {
    id: SubscriptionId,
    table: Table,
    callback: ChangeCallback,
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscription: AtomicU64,
    public_asset_base: String,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        let db = Self {
            conn,
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            public_asset_base: DEFAULT_ASSET_BASE.to_string(),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Set the URL prefix returned for uploaded assets.
    pub fn set_public_asset_base(&mut self, base: impl Into<String>) {
        self.public_asset_base = base.into().trim_end_matches('/').to_string();
    }

    /// Register a callback fired after every successful write to `table`.
    ///
    /// Callbacks run synchronously on the writing thread and must not call
    /// back into `subscribe`/`unsubscribe`.
    pub fn subscribe<F>(&self, table: Table, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.push(Subscriber {
            id,
            table,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub(crate) fn notify(&self, table: Table, kind: ChangeKind, rows: usize) {
        if rows == 0 {
            return;
        }
        let event = ChangeEvent { table, kind, rows };
        tracing::debug!(table = table.name(), ?kind, rows, "store change");
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for subscriber in subscribers.iter().filter(|s| s.table == table) {
            (subscriber.callback)(&event);
        }
    }
}

/// Fixed-width UTC timestamp so text ordering matches time ordering.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::InvalidData(format!("timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"inventory_items".to_string()));
        assert!(tables.contains(&"indent_requests".to_string()));
        assert!(tables.contains(&"assets".to_string()));
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let db = Database::open_in_memory().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let id = db.subscribe(Table::InventoryItems, move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        db.notify(Table::InventoryItems, ChangeKind::Update, 2);
        db.notify(Table::IndentRequests, ChangeKind::Insert, 1);
        db.notify(Table::InventoryItems, ChangeKind::Delete, 0);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ChangeEvent {
                table: Table::InventoryItems,
                kind: ChangeKind::Update,
                rows: 2
            }]
        );

        assert!(db.unsubscribe(id));
        assert!(!db.unsubscribe(id));
        db.notify(Table::InventoryItems, ChangeKind::Update, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = format_timestamp(&DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z").unwrap().with_timezone(&Utc));
        let b = format_timestamp(&DateTime::parse_from_rfc3339("2025-01-02T03:04:05.5Z").unwrap().with_timezone(&Utc));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&a).unwrap().timestamp(), 1735787045);
    }
}
