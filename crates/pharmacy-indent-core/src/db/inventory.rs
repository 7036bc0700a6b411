//! Inventory item database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;

use super::{Database, DbError, DbResult};
use crate::models::{InventoryItem, InventoryRow, PurchaseType, SchemaRevision, StdKt, StockPatch};
use crate::store::{ChangeKind, Table};

pub(super) const ITEM_COLUMNS: &str = "id, name, item_code, pku, purchase_type, std_kt, category, \
     row, section, bin, max_qty, balance, indent_source, remarks, is_short_exp, short_exp, image_url";

/// Outcome of a bulk inventory import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub legacy_rows: usize,
    pub shelf_rows: usize,
    /// `(row index, reason)` for rows that could not be decoded
    pub skipped: Vec<(usize, String)>,
}

impl Database {
    /// Insert or replace an inventory item.
    pub fn upsert_item(&self, item: &InventoryItem) -> DbResult<()> {
        let existed = self.get_item(&item.id)?.is_some();
        self.write_item(item)?;
        let kind = if existed { ChangeKind::Update } else { ChangeKind::Insert };
        self.notify(Table::InventoryItems, kind, 1);
        Ok(())
    }

    fn write_item(&self, item: &InventoryItem) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO inventory_items (
                id, name, item_code, pku, purchase_type, std_kt, category,
                row, section, bin, max_qty, balance, indent_source, remarks,
                is_short_exp, short_exp, image_url
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                item_code = excluded.item_code,
                pku = excluded.pku,
                purchase_type = excluded.purchase_type,
                std_kt = excluded.std_kt,
                category = excluded.category,
                row = excluded.row,
                section = excluded.section,
                bin = excluded.bin,
                max_qty = excluded.max_qty,
                balance = excluded.balance,
                indent_source = excluded.indent_source,
                remarks = excluded.remarks,
                is_short_exp = excluded.is_short_exp,
                short_exp = excluded.short_exp,
                image_url = excluded.image_url,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
            params![
                item.id,
                item.name,
                item.item_code,
                item.pku,
                item.purchase_type.map(|p| p.as_str()),
                item.std_kt.map(|s| s.as_str()),
                item.category,
                item.row,
                item.section,
                item.bin,
                item.max_qty,
                item.balance,
                item.indent_source,
                item.remarks,
                item.is_short_exp,
                item.short_exp.map(|d| d.format("%Y-%m-%d").to_string()),
                item.image_url,
            ],
        )?;
        Ok(())
    }

    /// Get an inventory item by ID.
    pub fn get_item(&self, id: &str) -> DbResult<Option<InventoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = ?");
        let result = self
            .conn
            .query_row(&sql, [id], |row| read_item_row(row, 0))
            .optional()?;

        result.flatten().map(InventoryItem::try_from).transpose()
    }

    /// List every inventory item ordered by name.
    pub fn list_items(&self) -> DbResult<Vec<InventoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items ORDER BY name COLLATE NOCASE");
        self.query_items(&sql)
    }

    /// Items flagged short-expiry with a date, soonest first.
    pub fn list_short_expiry(&self) -> DbResult<Vec<InventoryItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE is_short_exp = 1 AND short_exp IS NOT NULL \
             ORDER BY short_exp ASC"
        );
        self.query_items(&sql)
    }

    fn query_items(&self, sql: &str) -> DbResult<Vec<InventoryItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| read_item_row(row, 0))?;

        let mut items = Vec::new();
        for row in rows {
            if let Some(row) = row? {
                items.push(row.try_into()?);
            }
        }
        Ok(items)
    }

    /// Overwrite every editable field of an item.
    pub fn update_item(&self, item: &InventoryItem) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE inventory_items SET
                name = ?2,
                item_code = ?3,
                pku = ?4,
                purchase_type = ?5,
                std_kt = ?6,
                category = ?7,
                row = ?8,
                section = ?9,
                bin = ?10,
                max_qty = ?11,
                balance = ?12,
                indent_source = ?13,
                remarks = ?14,
                is_short_exp = ?15,
                short_exp = ?16,
                image_url = ?17,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?1
            "#,
            params![
                item.id,
                item.name,
                item.item_code,
                item.pku,
                item.purchase_type.map(|p| p.as_str()),
                item.std_kt.map(|s| s.as_str()),
                item.category,
                item.row,
                item.section,
                item.bin,
                item.max_qty,
                item.balance,
                item.indent_source,
                item.remarks,
                item.is_short_exp,
                item.short_exp.map(|d| d.format("%Y-%m-%d").to_string()),
                item.image_url,
            ],
        )?;
        self.notify(Table::InventoryItems, ChangeKind::Update, rows_affected);
        Ok(rows_affected > 0)
    }

    /// Overwrite the stock fields of an item.
    pub fn update_item_stock(&self, item_id: &str, patch: &StockPatch) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE inventory_items SET
                max_qty = ?2,
                balance = ?3,
                indent_source = ?4,
                remarks = ?5,
                is_short_exp = ?6,
                short_exp = ?7,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?1
            "#,
            params![
                item_id,
                patch.max_qty,
                patch.balance,
                patch.indent_source,
                patch.remarks,
                patch.is_short_exp,
                patch.short_exp.map(|d| d.format("%Y-%m-%d").to_string()),
            ],
        )?;
        self.notify(Table::InventoryItems, ChangeKind::Update, rows_affected);
        Ok(rows_affected > 0)
    }

    /// Point an item at a new image.
    pub fn set_item_image(&self, item_id: &str, image_url: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE inventory_items SET image_url = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
            params![item_id, image_url],
        )?;
        self.notify(Table::InventoryItems, ChangeKind::Update, rows_affected);
        Ok(rows_affected > 0)
    }

    /// Delete an item. Its requests stay behind.
    pub fn delete_item(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM inventory_items WHERE id = ?", [id])?;
        self.notify(Table::InventoryItems, ChangeKind::Delete, rows_affected);
        Ok(rows_affected > 0)
    }

    /// Bulk import raw rows of any schema revision in one transaction.
    ///
    /// Undecodable rows are reported and skipped; SQL failures abort the
    /// whole import.
    pub fn import_rows(&self, rows: Vec<Value>) -> DbResult<ImportReport> {
        let mut report = ImportReport::default();
        let tx = self.conn.unchecked_transaction()?;

        for (index, value) in rows.into_iter().enumerate() {
            let row = match InventoryRow::detect(value) {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping inventory row");
                    report.skipped.push((index, e.to_string()));
                    continue;
                }
            };
            match row.revision() {
                SchemaRevision::Legacy => report.legacy_rows += 1,
                SchemaRevision::Shelf => report.shelf_rows += 1,
                SchemaRevision::Current => {}
            }
            self.write_item(&row.into_item())?;
            report.imported += 1;
        }

        tx.commit()?;
        tracing::info!(
            imported = report.imported,
            skipped = report.skipped.len(),
            "inventory import finished"
        );
        self.notify(Table::InventoryItems, ChangeKind::Insert, report.imported);
        Ok(report)
    }
}

/// Intermediate struct for reading an item from the database.
pub(super) struct InventoryItemRow {
    id: String,
    name: String,
    item_code: Option<String>,
    pku: Option<String>,
    purchase_type: Option<String>,
    std_kt: Option<String>,
    category: Option<String>,
    row: Option<String>,
    section: Option<String>,
    bin: Option<String>,
    max_qty: i64,
    balance: i64,
    indent_source: Option<String>,
    remarks: Option<String>,
    is_short_exp: bool,
    short_exp: Option<String>,
    image_url: Option<String>,
}

/// Read item columns starting at `offset`.
///
/// Returns `None` when the id column is NULL, which is how a LEFT JOIN
/// reports a missing item.
pub(super) fn read_item_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Option<InventoryItemRow>> {
    let Some(id) = row.get::<_, Option<String>>(offset)? else {
        return Ok(None);
    };
    Ok(Some(InventoryItemRow {
        id,
        name: row.get::<_, Option<String>>(offset + 1)?.unwrap_or_default(),
        item_code: row.get(offset + 2)?,
        pku: row.get(offset + 3)?,
        purchase_type: row.get(offset + 4)?,
        std_kt: row.get(offset + 5)?,
        category: row.get(offset + 6)?,
        row: row.get(offset + 7)?,
        section: row.get(offset + 8)?,
        bin: row.get(offset + 9)?,
        max_qty: row.get::<_, Option<i64>>(offset + 10)?.unwrap_or(0),
        balance: row.get::<_, Option<i64>>(offset + 11)?.unwrap_or(0),
        indent_source: row.get(offset + 12)?,
        remarks: row.get(offset + 13)?,
        is_short_exp: row.get::<_, Option<bool>>(offset + 14)?.unwrap_or(false),
        short_exp: row.get(offset + 15)?,
        image_url: row.get(offset + 16)?,
    }))
}

impl TryFrom<InventoryItemRow> for InventoryItem {
    type Error = DbError;

    fn try_from(row: InventoryItemRow) -> Result<Self, Self::Error> {
        let short_exp = row
            .short_exp
            .as_deref()
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|e| DbError::InvalidData(format!("short_exp {s:?}: {e}")))
            })
            .transpose()?;

        Ok(InventoryItem {
            id: row.id,
            name: row.name,
            item_code: row.item_code,
            pku: row.pku,
            purchase_type: row.purchase_type.as_deref().and_then(PurchaseType::parse),
            std_kt: row.std_kt.as_deref().and_then(StdKt::parse),
            category: row.category,
            row: row.row,
            section: row.section,
            bin: row.bin,
            max_qty: u32::try_from(row.max_qty).unwrap_or(0),
            balance: u32::try_from(row.balance).unwrap_or(0),
            indent_source: row.indent_source,
            remarks: row.remarks,
            is_short_exp: row.is_short_exp,
            short_exp,
            image_url: row.image_url,
        })
    }
}
