//! Indent request models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::InventoryItem;

/// Indent request status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IndentStatus {
    /// In the cart, still editable
    Pending,
    /// Cleared from the cart, read-only history
    Approved,
}

impl IndentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndentStatus::Pending => "Pending",
            IndentStatus::Approved => "Approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(IndentStatus::Pending),
            "Approved" => Some(IndentStatus::Approved),
            _ => None,
        }
    }
}

/// A single line-item ask to replenish one inventory item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndentRequest {
    pub id: String,
    /// Referenced inventory item
    pub item_id: String,
    /// Free text so notations like "5x30's" survive
    pub requested_qty: String,
    pub status: IndentStatus,
    pub created_at: DateTime<Utc>,
}

impl IndentRequest {
    /// Create a new pending request for an item.
    pub fn new(item_id: String, requested_qty: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            item_id,
            requested_qty,
            status: IndentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == IndentStatus::Pending
    }
}

/// A request joined with its inventory item.
///
/// The item is optional because the join is a left join: a request whose
/// item was deleted from settings still shows up in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestWithItem {
    pub request: IndentRequest,
    pub item: Option<InventoryItem>,
}

impl RequestWithItem {
    /// Item name, empty when the item is missing.
    pub fn item_name(&self) -> &str {
        self.item.as_ref().map(|i| i.name.as_str()).unwrap_or("")
    }

    /// Item source, if any.
    pub fn indent_source(&self) -> Option<&str> {
        self.item.as_ref().and_then(|i| i.indent_source.as_deref())
    }

    /// Description cell text for the indent form.
    pub fn description(&self) -> String {
        self.item.as_ref().map(|i| i.description()).unwrap_or_default()
    }
}
