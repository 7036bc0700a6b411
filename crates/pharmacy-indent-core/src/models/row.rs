//! Versioned raw row contract for inventory data.
//!
//! The hosted inventory table went through three layouts:
//!
//! - `Legacy`: `min_qty` + `location_code` + `type`
//! - `Shelf`: `section` + `row` + `bin` coordinates
//! - `Current`: `max_qty` + `balance` + `row` + `pku`
//!
//! Raw JSON rows are classified once and normalised into [`InventoryItem`].

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::item::{InventoryItem, PurchaseType, StdKt};

/// Row decoding errors.
#[derive(Error, Debug)]
pub enum RowError {
    #[error("Row is not a JSON object")]
    NotAnObject,

    #[error("Row has no name")]
    MissingName,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Schema revision of a raw inventory row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaRevision {
    Legacy,
    Shelf,
    Current,
}

/// An inventory row in one of the known schema revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema")]
pub enum InventoryRow {
    Legacy(LegacyRow),
    Shelf(ShelfRow),
    Current(CurrentRow),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub min_qty: u32,
    #[serde(default)]
    pub location_code: Option<String>,
    #[serde(default, rename = "type")]
    pub category: Option<String>,
    #[serde(default)]
    pub indent_source: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelfRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub row: Option<String>,
    #[serde(default)]
    pub bin: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_qty: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub balance: u32,
    #[serde(default)]
    pub indent_source: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub item_code: Option<String>,
    #[serde(default)]
    pub pku: Option<String>,
    // The hosted column was created misspelled.
    #[serde(default, alias = "puchase_type")]
    pub purchase_type: Option<String>,
    #[serde(default)]
    pub std_kt: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub row: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_qty: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub balance: u32,
    #[serde(default)]
    pub indent_source: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub is_short_exp: Option<bool>,
    #[serde(default)]
    pub short_exp: Option<NaiveDate>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl InventoryRow {
    /// Classify a raw JSON row by the columns it carries.
    pub fn detect(value: Value) -> Result<Self, RowError> {
        let obj = value.as_object().ok_or(RowError::NotAnObject)?;
        let has = |key: &str| obj.contains_key(key);

        let row = if has("min_qty") && !has("balance") {
            InventoryRow::Legacy(serde_json::from_value(value)?)
        } else if (has("section") || has("bin")) && !has("pku") {
            InventoryRow::Shelf(serde_json::from_value(value)?)
        } else {
            InventoryRow::Current(serde_json::from_value(value)?)
        };

        if row.name().trim().is_empty() {
            return Err(RowError::MissingName);
        }
        Ok(row)
    }

    pub fn revision(&self) -> SchemaRevision {
        match self {
            InventoryRow::Legacy(_) => SchemaRevision::Legacy,
            InventoryRow::Shelf(_) => SchemaRevision::Shelf,
            InventoryRow::Current(_) => SchemaRevision::Current,
        }
    }

    fn name(&self) -> &str {
        match self {
            InventoryRow::Legacy(r) => &r.name,
            InventoryRow::Shelf(r) => &r.name,
            InventoryRow::Current(r) => &r.name,
        }
    }

    /// Normalise into the current item model.
    ///
    /// Rows without an id get a fresh one.
    pub fn into_item(self) -> InventoryItem {
        match self {
            InventoryRow::Legacy(r) => {
                let mut item = InventoryItem::new(r.name);
                if let Some(id) = r.id {
                    item.id = id;
                }
                item.balance = r.min_qty;
                item.row = non_empty(r.location_code);
                item.category = non_empty(r.category);
                item.indent_source = non_empty(r.indent_source);
                item.remarks = non_empty(r.generic_name);
                item.image_url = non_empty(r.image_url);
                item
            }
            InventoryRow::Shelf(r) => {
                let mut item = InventoryItem::new(r.name);
                if let Some(id) = r.id {
                    item.id = id;
                }
                item.section = non_empty(r.section);
                item.row = non_empty(r.row);
                item.bin = non_empty(r.bin);
                item.max_qty = r.max_qty;
                item.balance = r.balance;
                item.indent_source = non_empty(r.indent_source);
                item.remarks = non_empty(r.remarks);
                item.image_url = non_empty(r.image_url);
                item
            }
            InventoryRow::Current(r) => {
                let mut item = InventoryItem::new(r.name);
                if let Some(id) = r.id {
                    item.id = id;
                }
                item.item_code = non_empty(r.item_code);
                item.pku = non_empty(r.pku);
                item.purchase_type = r.purchase_type.as_deref().and_then(PurchaseType::parse);
                item.std_kt = r.std_kt.as_deref().and_then(StdKt::parse);
                item.row = non_empty(r.row);
                item.max_qty = r.max_qty;
                item.balance = r.balance;
                item.indent_source = non_empty(r.indent_source);
                item.remarks = non_empty(r.remarks);
                item.is_short_exp = r.is_short_exp.unwrap_or(false);
                item.short_exp = r.short_exp;
                item.image_url = non_empty(r.image_url);
                item
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accept numbers, numeric strings, or null for a count column.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v.min(u32::MAX as u64) as u32)
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u32))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            crate::quantity::parse_leading_int(&s).clamp(0, u32::MAX as i64) as u32
        }
        _ => 0,
    })
}

/// Accept strings or numbers for identifier-like columns.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_legacy() {
        let row = InventoryRow::detect(json!({
            "id": 7,
            "name": "Amoxicillin 250mg",
            "min_qty": "12",
            "location_code": "A-3",
            "type": "OPD"
        }))
        .unwrap();

        assert_eq!(row.revision(), SchemaRevision::Legacy);
        let item = row.into_item();
        assert_eq!(item.id, "7");
        assert_eq!(item.balance, 12);
        assert_eq!(item.row.as_deref(), Some("A-3"));
        assert_eq!(item.category.as_deref(), Some("OPD"));
    }

    #[test]
    fn test_detect_shelf() {
        let row = InventoryRow::detect(json!({
            "id": "abc",
            "name": "Metformin 500mg",
            "section": "S2",
            "row": 4,
            "bin": "M10",
            "max_qty": 100,
            "balance": 40
        }))
        .unwrap();

        assert_eq!(row.revision(), SchemaRevision::Shelf);
        let item = row.into_item();
        assert_eq!(item.row.as_deref(), Some("4"));
        assert_eq!(item.bin.as_deref(), Some("M10"));
        assert_eq!(item.suggested_indent_qty(), 60);
    }

    #[test]
    fn test_detect_current_with_misspelled_column() {
        let row = InventoryRow::detect(json!({
            "id": "xyz",
            "name": "Salbutamol Inhaler",
            "pku": "P-19",
            "puchase_type": "APPL",
            "std_kt": "KT",
            "row": "R1",
            "max_qty": 30,
            "balance": null,
            "indent_source": "OPD Substor",
            "is_short_exp": true,
            "short_exp": "2026-03-01"
        }))
        .unwrap();

        assert_eq!(row.revision(), SchemaRevision::Current);
        let item = row.into_item();
        assert_eq!(item.purchase_type, Some(PurchaseType::Appl));
        assert_eq!(item.std_kt, Some(StdKt::Kt));
        assert_eq!(item.balance, 0);
        assert!(item.is_short_exp);
        assert_eq!(item.short_exp, NaiveDate::from_ymd_opt(2026, 3, 1));
    }

    #[test]
    fn test_rejects_nameless_and_non_objects() {
        assert!(matches!(
            InventoryRow::detect(json!({"id": 1, "max_qty": 3})),
            Err(RowError::MissingName)
        ));
        assert!(matches!(
            InventoryRow::detect(json!([1, 2])),
            Err(RowError::NotAnObject)
        ));
    }
}
