//! Quick-edit form for a cart row.
//!
//! Numeric stock edits recompute the requested quantity immediately but only
//! mark the form as changed once the debounce window has passed without
//! another numeric edit. Every other edit marks it changed at once.

use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::models::{RequestWithItem, StockPatch};
use crate::quantity::{calculate_indent_qty, parse_leading_int};

/// Save state of a [`QuickEditForm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditState {
    /// Matches what was loaded
    Clean,
    /// Numeric edit waiting for the debounce deadline
    PendingDebounce { deadline: Instant },
    /// Has unsaved changes
    Dirty,
    Saving,
    /// Last save failed; changes are still unsaved
    Failed(String),
}

/// Editable copy of one cart row and its item's stock fields.
#[derive(Debug, Clone)]
pub struct QuickEditForm {
    request_id: String,
    item_id: String,
    max_qty: String,
    balance: String,
    requested_qty: String,
    indent_source: Option<String>,
    remarks: Option<String>,
    is_short_exp: bool,
    short_exp: Option<NaiveDate>,
    debounce: Duration,
    state: EditState,
}

impl QuickEditForm {
    /// Load a cart row into a clean form.
    pub fn open(row: &RequestWithItem, debounce: Duration) -> Self {
        let item = row.item.as_ref();
        Self {
            request_id: row.request.id.clone(),
            item_id: row.request.item_id.clone(),
            max_qty: item
                .map(|i| i.max_qty)
                .filter(|&m| m > 0)
                .map(|m| m.to_string())
                .unwrap_or_default(),
            balance: item.map(|i| i.balance.to_string()).unwrap_or_default(),
            requested_qty: row.request.requested_qty.clone(),
            indent_source: item.and_then(|i| i.indent_source.clone()),
            remarks: item.and_then(|i| i.remarks.clone()),
            is_short_exp: item.map(|i| i.is_short_exp).unwrap_or(false),
            short_exp: item.and_then(|i| i.short_exp),
            debounce,
            state: EditState::Clean,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn max_qty(&self) -> &str {
        &self.max_qty
    }

    pub fn balance(&self) -> &str {
        &self.balance
    }

    pub fn requested_qty(&self) -> &str {
        &self.requested_qty
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    /// Edit the stock ceiling; recomputes the quantity and arms the debounce.
    pub fn set_max_qty(&mut self, value: impl Into<String>, now: Instant) {
        self.max_qty = value.into();
        self.recompute(now);
    }

    /// Edit the counted balance; recomputes the quantity and arms the debounce.
    pub fn set_balance(&mut self, value: impl Into<String>, now: Instant) {
        self.balance = value.into();
        self.recompute(now);
    }

    fn recompute(&mut self, now: Instant) {
        self.requested_qty = calculate_indent_qty(&self.max_qty, &self.balance);
        // Dirty and Failed forms stay saveable
        if !matches!(self.state, EditState::Dirty | EditState::Failed(_)) {
            self.state = EditState::PendingDebounce {
                deadline: now + self.debounce,
            };
        }
    }

    /// Manual quantity override. Overwritten by the next max/balance edit.
    pub fn set_requested_qty(&mut self, value: impl Into<String>) {
        self.requested_qty = value.into();
        self.mark_dirty();
    }

    pub fn set_indent_source(&mut self, value: Option<String>) {
        self.indent_source = value.filter(|s| !s.trim().is_empty());
        self.mark_dirty();
    }

    pub fn set_remarks(&mut self, value: Option<String>) {
        self.remarks = value;
        self.mark_dirty();
    }

    pub fn set_short_exp_flag(&mut self, flagged: bool) {
        self.is_short_exp = flagged;
        self.mark_dirty();
    }

    pub fn set_short_exp(&mut self, date: Option<NaiveDate>) {
        self.short_exp = date;
        self.mark_dirty();
    }

    fn mark_dirty(&mut self) {
        if !matches!(self.state, EditState::Failed(_)) {
            self.state = EditState::Dirty;
        }
    }

    /// Advance the debounce clock. Returns true when the form just became dirty.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.state {
            EditState::PendingDebounce { deadline } if now >= deadline => {
                self.state = EditState::Dirty;
                true
            }
            _ => false,
        }
    }

    /// Whether anything differs from what was loaded, confirmed or not.
    pub fn has_changes(&self) -> bool {
        self.state != EditState::Clean
    }

    pub fn can_save(&self) -> bool {
        matches!(self.state, EditState::Dirty | EditState::Failed(_))
    }

    /// Stock fields to write back to the item.
    ///
    /// Numeric fields use the same leading-integer parsing as the quantity
    /// calculator; negatives clamp to zero.
    pub fn to_patch(&self) -> StockPatch {
        StockPatch {
            max_qty: to_count(&self.max_qty),
            balance: to_count(&self.balance),
            indent_source: self.indent_source.clone(),
            remarks: self.remarks.clone(),
            is_short_exp: self.is_short_exp,
            short_exp: self.short_exp,
        }
    }

    pub(crate) fn begin_save(&mut self) {
        self.state = EditState::Saving;
    }

    pub(crate) fn finish_save(&mut self, outcome: Result<(), String>) {
        self.state = match outcome {
            Ok(()) => EditState::Clean,
            Err(message) => EditState::Failed(message),
        };
    }

    /// Drop unsaved changes and any pending debounce.
    pub fn discard(&mut self) {
        self.state = EditState::Clean;
    }
}

fn to_count(raw: &str) -> u32 {
    parse_leading_int(raw).clamp(0, u32::MAX as i64) as u32
}
