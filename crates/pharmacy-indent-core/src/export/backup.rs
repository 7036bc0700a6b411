//! Full data backup as JSON.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Database, DbResult};
use crate::models::{IndentRequest, InventoryItem};

/// Backup format version.
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// Every inventory item and every indent request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataBackup {
    pub format_version: String,
    pub exported_at: String,
    pub inventory: Vec<InventoryItem>,
    pub indents: Vec<BackupIndent>,
}

/// An indent request flattened with its item's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupIndent {
    #[serde(flatten)]
    pub request: IndentRequest,
    /// "Unknown" when the item no longer exists
    pub drug_name: String,
}

impl DataBackup {
    /// Read everything from the database.
    pub fn collect(db: &Database) -> DbResult<Self> {
        let inventory = db.list_items()?;
        let indents: Vec<BackupIndent> = db
            .all_requests_with_items()?
            .into_iter()
            .map(|row| BackupIndent {
                drug_name: row
                    .item
                    .as_ref()
                    .map(|i| i.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                request: row.request,
            })
            .collect();

        tracing::info!(items = inventory.len(), indents = indents.len(), "backup collected");
        Ok(Self {
            format_version: BACKUP_FORMAT_VERSION.to_string(),
            exported_at: Utc::now().to_rfc3339(),
            inventory,
            indents,
        })
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// `PIMS_Export_<YYYY-MM-DD>.json`
    pub fn file_name(date: NaiveDate) -> String {
        format!("PIMS_Export_{}.json", date.format("%Y-%m-%d"))
    }
}
