//! Data store boundary.
//!
//! The indent lifecycle talks to persistence only through [`IndentStore`], so
//! the hosted backend, the bundled SQLite database, or a test double can sit
//! behind it.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::db::DbResult;
use crate::models::{IndentRequest, InventoryItem, RequestWithItem, StockPatch};

/// Persisted tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    InventoryItems,
    IndentRequests,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::InventoryItems => "inventory_items",
            Table::IndentRequests => "indent_requests",
        }
    }
}

/// Kind of write that touched a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Notification emitted after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub rows: usize,
}

/// Typed query/mutate capability over the two indent tables.
pub trait IndentStore {
    /// Look up an item by id.
    fn get_item(&self, item_id: &str) -> DbResult<Option<InventoryItem>>;

    /// Insert a new request.
    fn insert_request(&self, request: &IndentRequest) -> DbResult<()>;

    /// Overwrite the stock fields of an item. Returns false if no such item.
    fn update_item_stock(&self, item_id: &str, patch: &StockPatch) -> DbResult<bool>;

    /// Overwrite every editable field of an item. Returns false if no such item.
    fn update_item(&self, item: &InventoryItem) -> DbResult<bool>;

    /// Change a pending request's quantity. Returns false if no pending row matched.
    fn update_requested_qty(&self, request_id: &str, requested_qty: &str) -> DbResult<bool>;

    /// Delete a pending request. Returns false if no pending row matched.
    fn delete_pending_request(&self, request_id: &str) -> DbResult<bool>;

    /// Flip every pending request to approved, returning rows affected.
    fn approve_all_pending(&self) -> DbResult<usize>;

    /// Pending requests joined with items, newest first.
    fn pending_with_items(&self) -> DbResult<Vec<RequestWithItem>>;

    /// Approved requests created within `[from, to]`, newest first.
    fn approved_with_items_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<RequestWithItem>>;

    /// Distinct days, in `utc_offset`, with at least one approved request, newest first.
    fn approved_days(&self, utc_offset: FixedOffset) -> DbResult<Vec<NaiveDate>>;
}
