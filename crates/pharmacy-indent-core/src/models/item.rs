//! Inventory item models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Indent sources offered by the item editors.
pub const KNOWN_SOURCES: &[&str] = &[
    "OPD Kaunter",
    "OPD Substor",
    "IPD Kaunter",
    "IPD Substor",
    "MNF Substor",
    "MNF Eksternal",
    "MNF Internal",
    "Prepacking",
    "HPSF Muar",
];

/// Procurement route of an item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PurchaseType {
    /// Local purchase
    #[serde(rename = "LP")]
    Lp,
    /// Centralised supply contract
    #[serde(rename = "APPL")]
    Appl,
}

/// Issue-flow classification (standard vs. direct issue).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StdKt {
    #[serde(rename = "STD")]
    Std,
    #[serde(rename = "KT")]
    Kt,
}

impl PurchaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseType::Lp => "LP",
            PurchaseType::Appl => "APPL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LP" => Some(PurchaseType::Lp),
            "APPL" => Some(PurchaseType::Appl),
            _ => None,
        }
    }
}

impl StdKt {
    pub fn as_str(&self) -> &'static str {
        match self {
            StdKt::Std => "STD",
            StdKt::Kt => "KT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STD" => Some(StdKt::Std),
            "KT" => Some(StdKt::Kt),
            _ => None,
        }
    }
}

/// A single stocked drug/product at a physical location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    /// Opaque identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Hospital item code
    pub item_code: Option<String>,
    /// Secondary code printed next to the name on indent forms
    pub pku: Option<String>,
    pub purchase_type: Option<PurchaseType>,
    pub std_kt: Option<StdKt>,
    /// Dosage-form category used by the locator (OPD, DDA, Injection, ...)
    pub category: Option<String>,
    /// Shelf row
    pub row: Option<String>,
    /// Shelf section (older layout)
    pub section: Option<String>,
    /// Shelf bin (older layout)
    pub bin: Option<String>,
    /// Target stock ceiling
    pub max_qty: u32,
    /// Current counted stock
    pub balance: u32,
    /// Department/counter the item is requisitioned from
    pub indent_source: Option<String>,
    pub remarks: Option<String>,
    /// Flagged as nearing expiry
    pub is_short_exp: bool,
    /// Expiry date when flagged
    pub short_exp: Option<NaiveDate>,
    pub image_url: Option<String>,
}

impl InventoryItem {
    /// Create a new item with required fields.
    pub fn new(name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            item_code: None,
            pku: None,
            purchase_type: None,
            std_kt: None,
            category: None,
            row: None,
            section: None,
            bin: None,
            max_qty: 0,
            balance: 0,
            indent_source: None,
            remarks: None,
            is_short_exp: false,
            short_exp: None,
            image_url: None,
        }
    }

    /// Quantity needed to bring balance back to the ceiling.
    pub fn suggested_indent_qty(&self) -> u32 {
        crate::quantity::indent_qty(self.max_qty, self.balance)
    }

    /// Name with the secondary code appended, as printed on the indent form.
    pub fn description(&self) -> String {
        match self.pku.as_deref().filter(|p| !p.is_empty()) {
            Some(pku) => format!("{} | {}", self.name, pku),
            None => self.name.clone(),
        }
    }

    /// Current stock parameters as a patch.
    pub fn stock_patch(&self) -> StockPatch {
        StockPatch {
            max_qty: self.max_qty,
            balance: self.balance,
            indent_source: self.indent_source.clone(),
            remarks: self.remarks.clone(),
            is_short_exp: self.is_short_exp,
            short_exp: self.short_exp,
        }
    }

    /// Apply a stock patch in place.
    pub fn apply(&mut self, patch: &StockPatch) {
        self.max_qty = patch.max_qty;
        self.balance = patch.balance;
        self.indent_source = patch.indent_source.clone();
        self.remarks = patch.remarks.clone();
        self.is_short_exp = patch.is_short_exp;
        self.short_exp = patch.short_exp;
    }
}

/// Stock fields editable from the cart and indent modals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StockPatch {
    pub max_qty: u32,
    pub balance: u32,
    pub indent_source: Option<String>,
    pub remarks: Option<String>,
    pub is_short_exp: bool,
    pub short_exp: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_with_pku() {
        let mut item = InventoryItem::new("Paracetamol 500mg".into());
        assert_eq!(item.description(), "Paracetamol 500mg");

        item.pku = Some("A1".into());
        assert_eq!(item.description(), "Paracetamol 500mg | A1");

        item.pku = Some(String::new());
        assert_eq!(item.description(), "Paracetamol 500mg");
    }

    #[test]
    fn test_suggested_qty_clamped() {
        let mut item = InventoryItem::new("Test".into());
        item.max_qty = 50;
        item.balance = 20;
        assert_eq!(item.suggested_indent_qty(), 30);

        item.balance = 80;
        assert_eq!(item.suggested_indent_qty(), 0);
    }

    #[test]
    fn test_enum_serde_names() {
        assert_eq!(serde_json::to_string(&PurchaseType::Appl).unwrap(), "\"APPL\"");
        assert_eq!(serde_json::to_string(&StdKt::Kt).unwrap(), "\"KT\"");
        assert_eq!(PurchaseType::parse("lp"), Some(PurchaseType::Lp));
        assert_eq!(StdKt::parse("x"), None);
    }
}
