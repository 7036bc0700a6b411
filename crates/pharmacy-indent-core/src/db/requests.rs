//! Indent request database operations.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::inventory::{read_item_row, InventoryItemRow, ITEM_COLUMNS};
use super::{format_timestamp, parse_timestamp, Database, DbError, DbResult};
use crate::models::{IndentRequest, IndentStatus, InventoryItem, RequestWithItem, StockPatch};
use crate::store::{ChangeKind, IndentStore, Table};

const REQUEST_COLUMNS: &str = "r.id, r.item_id, r.requested_qty, r.status, r.created_at";
const REQUEST_COLUMN_COUNT: usize = 5;

impl Database {
    /// Insert a new indent request.
    pub fn insert_request(&self, request: &IndentRequest) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO indent_requests (id, item_id, requested_qty, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                request.id,
                request.item_id,
                request.requested_qty,
                request.status.as_str(),
                format_timestamp(&request.created_at),
            ],
        )?;
        self.notify(Table::IndentRequests, ChangeKind::Insert, 1);
        Ok(())
    }

    /// Get a request by ID.
    pub fn get_request(&self, id: &str) -> DbResult<Option<IndentRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM indent_requests r WHERE r.id = ?");
        let result = self
            .conn
            .query_row(&sql, [id], read_request_row)
            .optional()?;

        result.map(IndentRequest::try_from).transpose()
    }

    /// Change the quantity of a pending request.
    pub fn update_requested_qty(&self, request_id: &str, requested_qty: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE indent_requests SET requested_qty = ?2 WHERE id = ?1 AND status = 'Pending'",
            params![request_id, requested_qty],
        )?;
        self.notify(Table::IndentRequests, ChangeKind::Update, rows_affected);
        Ok(rows_affected > 0)
    }

    /// Delete a pending request. Approved rows are never deleted here.
    pub fn delete_pending_request(&self, request_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM indent_requests WHERE id = ?1 AND status = 'Pending'",
            [request_id],
        )?;
        self.notify(Table::IndentRequests, ChangeKind::Delete, rows_affected);
        Ok(rows_affected > 0)
    }

    /// Approve every pending request in one statement.
    pub fn approve_all_pending(&self) -> DbResult<usize> {
        let rows_affected = self.conn.execute(
            "UPDATE indent_requests SET status = 'Approved' WHERE status = 'Pending'",
            [],
        )?;
        self.notify(Table::IndentRequests, ChangeKind::Update, rows_affected);
        Ok(rows_affected)
    }

    /// Pending requests with their items, newest first.
    pub fn pending_with_items(&self) -> DbResult<Vec<RequestWithItem>> {
        self.query_joined("WHERE r.status = 'Pending'", &[])
    }

    /// Approved requests created in `[from, to]`, newest first.
    pub fn approved_with_items_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<RequestWithItem>> {
        let from = format_timestamp(&from);
        let to = format_timestamp(&to);
        self.query_joined(
            "WHERE r.status = 'Approved' AND r.created_at >= ?1 AND r.created_at <= ?2",
            &[&from, &to],
        )
    }

    /// Every request regardless of status, newest first.
    pub fn all_requests_with_items(&self) -> DbResult<Vec<RequestWithItem>> {
        self.query_joined("", &[])
    }

    /// Creation timestamps of approved requests, newest first.
    /// Distinct local days with approved requests, newest first.
    ///
    /// Days are taken in the given UTC offset, so a request at 23:30 UTC
    /// lands on the next day east of Greenwich.
    pub fn approved_days(&self, utc_offset: FixedOffset) -> DbResult<Vec<NaiveDate>> {
        let shift = format!("{:+} seconds", utc_offset.local_minus_utc());
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT date(created_at, ?1) AS day FROM indent_requests \
             WHERE status = 'Approved' ORDER BY day DESC",
        )?;
        let rows = stmt.query_map([&shift], |row| row.get::<_, Option<String>>(0))?;

        let mut days = Vec::new();
        for raw in rows {
            let raw = raw?.ok_or_else(|| {
                DbError::InvalidData("approved request with unreadable created_at".to_string())
            })?;
            let day = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| DbError::InvalidData(format!("day {raw:?}: {e}")))?;
            days.push(day);
        }
        Ok(days)
    }

    fn query_joined(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> DbResult<Vec<RequestWithItem>> {
        let item_columns = ITEM_COLUMNS
            .split(',')
            .map(|c| format!("i.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {REQUEST_COLUMNS}, {item_columns} \
             FROM indent_requests r \
             LEFT JOIN inventory_items i ON i.id = r.item_id \
             {filter} \
             ORDER BY r.created_at DESC, r.rowid DESC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(args, |row| {
            Ok((
                read_request_row(row)?,
                read_item_row(row, REQUEST_COLUMN_COUNT)?,
            ))
        })?;

        let mut joined = Vec::new();
        for row in rows {
            let (request, item): (IndentRequestRow, Option<InventoryItemRow>) = row?;
            joined.push(RequestWithItem {
                request: request.try_into()?,
                item: item.map(InventoryItem::try_from).transpose()?,
            });
        }
        Ok(joined)
    }
}

impl IndentStore for Database {
    fn get_item(&self, item_id: &str) -> DbResult<Option<InventoryItem>> {
        Database::get_item(self, item_id)
    }

    fn insert_request(&self, request: &IndentRequest) -> DbResult<()> {
        Database::insert_request(self, request)
    }

    fn update_item_stock(&self, item_id: &str, patch: &StockPatch) -> DbResult<bool> {
        Database::update_item_stock(self, item_id, patch)
    }

    fn update_item(&self, item: &InventoryItem) -> DbResult<bool> {
        Database::update_item(self, item)
    }

    fn update_requested_qty(&self, request_id: &str, requested_qty: &str) -> DbResult<bool> {
        Database::update_requested_qty(self, request_id, requested_qty)
    }

    fn delete_pending_request(&self, request_id: &str) -> DbResult<bool> {
        Database::delete_pending_request(self, request_id)
    }

    fn approve_all_pending(&self) -> DbResult<usize> {
        Database::approve_all_pending(self)
    }

    fn pending_with_items(&self) -> DbResult<Vec<RequestWithItem>> {
        Database::pending_with_items(self)
    }

    fn approved_with_items_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<RequestWithItem>> {
        Database::approved_with_items_between(self, from, to)
    }

    fn approved_days(&self, utc_offset: FixedOffset) -> DbResult<Vec<NaiveDate>> {
        Database::approved_days(self, utc_offset)
    }
}

/// Intermediate struct for reading a request from the database.
struct IndentRequestRow {
    id: String,
    item_id: String,
    requested_qty: String,
    status: String,
    created_at: String,
}

fn read_request_row(row: &Row<'_>) -> rusqlite::Result<IndentRequestRow> {
    Ok(IndentRequestRow {
        id: row.get(0)?,
        item_id: row.get(1)?,
        requested_qty: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl TryFrom<IndentRequestRow> for IndentRequest {
    type Error = DbError;

    fn try_from(row: IndentRequestRow) -> Result<Self, Self::Error> {
        let status = IndentStatus::parse(&row.status)
            .ok_or_else(|| DbError::InvalidData(format!("status {:?}", row.status)))?;

        Ok(IndentRequest {
            id: row.id,
            item_id: row.item_id,
            requested_qty: row.requested_qty,
            status,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
