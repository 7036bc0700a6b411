//! Indent record lifecycle.
//!
//! Cart and history operations over an [`IndentStore`]. A request is created
//! Pending, may be edited or removed while Pending, and becomes read-only
//! history once approved.

mod edit;

pub use edit::*;

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;

use crate::config::IndentConfig;
use crate::db::{DbError, DbResult};
use crate::grouping::{group_by_source, SourceGroups};
use crate::models::{IndentRequest, InventoryItem, RequestWithItem, StockPatch};
use crate::quantity::is_blank_or_zero;
use crate::store::IndentStore;

/// Lifecycle operation, used to label store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddToCart,
    LoadCart,
    UpdateItem,
    RemoveItem,
    ApproveAll,
    LoadHistory,
    LoadDates,
}

impl Operation {
    /// Message shown to staff when this operation fails.
    pub fn user_message(&self) -> &'static str {
        match self {
            Operation::AddToCart => "Failed to add item to cart",
            Operation::LoadCart => "Failed to load cart items",
            Operation::UpdateItem => "Failed to update item details",
            Operation::RemoveItem => "Failed to remove item",
            Operation::ApproveAll => "Failed to clear indent",
            Operation::LoadHistory => "Failed to load indent items",
            Operation::LoadDates => "Failed to load indent dates",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::AddToCart => "add_to_cart",
            Operation::LoadCart => "load_cart",
            Operation::UpdateItem => "update_item",
            Operation::RemoveItem => "remove_item",
            Operation::ApproveAll => "approve_all",
            Operation::LoadHistory => "load_history",
            Operation::LoadDates => "load_dates",
        };
        f.write_str(name)
    }
}

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum IndentError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{operation} failed: {source}")]
    Store {
        operation: Operation,
        #[source]
        source: DbError,
    },

    /// Item stock was written but the request quantity was not.
    #[error("Item details saved but requested quantity was not: {0}")]
    PartialUpdate(String),
}

impl IndentError {
    /// Message suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            IndentError::Validation(msg) => msg.clone(),
            IndentError::NotFound(_) => "Item no longer exists".to_string(),
            IndentError::Store { operation, .. } => operation.user_message().to_string(),
            IndentError::PartialUpdate(_) => Operation::UpdateItem.user_message().to_string(),
        }
    }
}

pub type IndentResult<T> = Result<T, IndentError>;

/// Cart and history operations.
pub struct IndentService<'a, S: IndentStore> {
    store: &'a S,
    config: &'a IndentConfig,
}

impl<'a, S: IndentStore> IndentService<'a, S> {
    pub fn new(store: &'a S, config: &'a IndentConfig) -> Self {
        Self { store, config }
    }

    /// Put an existing item in the cart with the given quantity.
    pub fn add_to_cart(&self, item_id: &str, quantity: &str) -> IndentResult<IndentRequest> {
        if quantity.trim().is_empty() {
            return Err(IndentError::Validation(
                "Please enter indent quantity".to_string(),
            ));
        }
        if store_call(Operation::AddToCart, self.store.get_item(item_id))?.is_none() {
            tracing::warn!(item_id, "add to cart for unknown item");
            return Err(IndentError::NotFound(format!("inventory item {item_id}")));
        }

        let request = IndentRequest::new(item_id.to_string(), quantity.trim().to_string());
        store_call(Operation::AddToCart, self.store.insert_request(&request))?;
        tracing::info!(request_id = %request.id, item_id, quantity = %request.requested_qty, "added to cart");
        Ok(request)
    }

    /// Save a quick edit: item stock first, then the request quantity.
    ///
    /// The two writes are not atomic. If the second fails the stock change
    /// stays and [`IndentError::PartialUpdate`] is returned.
    pub fn save_quick_edit(&self, form: &mut QuickEditForm) -> IndentResult<()> {
        if !form.can_save() {
            return Err(IndentError::Validation("No changes to save".to_string()));
        }
        if self.config.reject_zero_quantity && is_blank_or_zero(form.requested_qty()) {
            return Err(IndentError::Validation(
                "Requested quantity must be greater than zero".to_string(),
            ));
        }

        form.begin_save();
        let outcome = self.write_quick_edit(form);
        form.finish_save(outcome.as_ref().map(|_| ()).map_err(IndentError::user_message));
        outcome
    }

    fn write_quick_edit(&self, form: &QuickEditForm) -> IndentResult<()> {
        let patch = form.to_patch();
        let updated = store_call(
            Operation::UpdateItem,
            self.store.update_item_stock(form.item_id(), &patch),
        )?;
        if !updated {
            return Err(IndentError::NotFound(format!("inventory item {}", form.item_id())));
        }

        match self
            .store
            .update_requested_qty(form.request_id(), form.requested_qty())
        {
            Ok(true) => {
                tracing::info!(request_id = form.request_id(), "quick edit saved");
                Ok(())
            }
            Ok(false) => {
                tracing::warn!(
                    request_id = form.request_id(),
                    "stock saved but request is no longer pending"
                );
                Err(IndentError::PartialUpdate(format!(
                    "request {} is no longer pending",
                    form.request_id()
                )))
            }
            Err(e) => {
                tracing::error!(request_id = form.request_id(), error = %e, "stock saved but quantity update failed");
                Err(IndentError::PartialUpdate(e.to_string()))
            }
        }
    }

    /// Remove one pending request from the cart.
    pub fn remove_from_cart(&self, request_id: &str) -> IndentResult<()> {
        let removed = store_call(
            Operation::RemoveItem,
            self.store.delete_pending_request(request_id),
        )?;
        if !removed {
            return Err(IndentError::NotFound(format!("pending request {request_id}")));
        }
        tracing::info!(request_id, "removed from cart");
        Ok(())
    }

    /// Approve everything in the cart. Zero rows is not an error.
    pub fn approve_all(&self) -> IndentResult<usize> {
        let approved = store_call(Operation::ApproveAll, self.store.approve_all_pending())?;
        tracing::info!(approved, "indent cleared");
        Ok(approved)
    }

    /// Pending requests, newest first.
    pub fn load_cart(&self) -> IndentResult<Vec<RequestWithItem>> {
        store_call(Operation::LoadCart, self.store.pending_with_items())
    }

    /// Pending requests bucketed by source.
    pub fn load_cart_grouped(&self) -> IndentResult<SourceGroups> {
        let rows = self.load_cart()?;
        Ok(group_by_source(rows, &self.config.grouping, self.config.sort_by_name))
    }

    /// Approved requests created on `date` in `tz`, newest first.
    pub fn load_history<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        tz: &Tz,
    ) -> IndentResult<Vec<RequestWithItem>> {
        let (from, to) = day_window(date, tz)?;
        store_call(
            Operation::LoadHistory,
            self.store.approved_with_items_between(from, to),
        )
    }

    /// History of one day bucketed by source.
    pub fn load_history_grouped<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        tz: &Tz,
    ) -> IndentResult<SourceGroups> {
        let rows = self.load_history(date, tz)?;
        Ok(group_by_source(rows, &self.config.grouping, self.config.sort_by_name))
    }

    /// Local days with at least one approved request, newest first.
    pub fn approved_dates(&self, tz: &FixedOffset) -> IndentResult<Vec<NaiveDate>> {
        store_call(Operation::LoadDates, self.store.approved_days(*tz))
    }

    /// Write stock fields without touching any request.
    pub fn save_item_stock(&self, item_id: &str, patch: &StockPatch) -> IndentResult<()> {
        let updated = store_call(
            Operation::UpdateItem,
            self.store.update_item_stock(item_id, patch),
        )?;
        if !updated {
            return Err(IndentError::NotFound(format!("inventory item {item_id}")));
        }
        tracing::info!(item_id, "item stock updated");
        Ok(())
    }

    /// Save a full item edit.
    pub fn update_item(&self, item: &InventoryItem) -> IndentResult<()> {
        if item.name.trim().is_empty() {
            return Err(IndentError::Validation("Please enter drug name".to_string()));
        }
        let updated = store_call(Operation::UpdateItem, self.store.update_item(item))?;
        if !updated {
            return Err(IndentError::NotFound(format!("inventory item {}", item.id)));
        }
        tracing::info!(item_id = %item.id, "item updated");
        Ok(())
    }
}

fn store_call<T>(operation: Operation, result: DbResult<T>) -> IndentResult<T> {
    result.map_err(|source| {
        tracing::error!(%operation, error = %source, "store call failed");
        IndentError::Store { operation, source }
    })
}

/// `[start of day, end of day]` of a local date, in UTC.
fn day_window<Tz: TimeZone>(
    date: NaiveDate,
    tz: &Tz,
) -> IndentResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_midnight(date, tz)?;
    let next = date
        .succ_opt()
        .ok_or_else(|| IndentError::Validation(format!("date out of range: {date}")))?;
    let end = local_midnight(next, tz)? - Duration::microseconds(1);
    Ok((start, end))
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> IndentResult<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| IndentError::Validation(format!("no local midnight on {date}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::FixedOffset;

    fn setup() -> (Database, IndentConfig) {
        (Database::open_in_memory().unwrap(), IndentConfig::default())
    }

    fn stocked(db: &Database, name: &str, source: &str) -> InventoryItem {
        let mut item = InventoryItem::new(name.to_string());
        item.max_qty = 50;
        item.balance = 20;
        item.indent_source = Some(source.to_string());
        db.upsert_item(&item).unwrap();
        item
    }

    #[test]
    fn test_add_to_cart_requires_quantity() {
        let (db, config) = setup();
        let service = IndentService::new(&db, &config);
        let item = stocked(&db, "Aspirin", "OPD Kaunter");

        let err = service.add_to_cart(&item.id, "   ").unwrap_err();
        assert!(matches!(err, IndentError::Validation(_)));
        assert_eq!(err.user_message(), "Please enter indent quantity");
        assert!(service.load_cart().unwrap().is_empty());

        let req = service.add_to_cart(&item.id, " 5x30's ").unwrap();
        assert_eq!(req.requested_qty, "5x30's");
        assert_eq!(service.load_cart().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_from_cart() {
        let (db, config) = setup();
        let service = IndentService::new(&db, &config);
        let item = stocked(&db, "Aspirin", "OPD Kaunter");
        let req = service.add_to_cart(&item.id, "30").unwrap();

        service.remove_from_cart(&req.id).unwrap();
        assert!(matches!(
            service.remove_from_cart(&req.id),
            Err(IndentError::NotFound(_))
        ));
    }

    #[test]
    fn test_quick_edit_writes_both() {
        let (db, config) = setup();
        let service = IndentService::new(&db, &config);
        let item = stocked(&db, "Aspirin", "OPD Kaunter");
        service.add_to_cart(&item.id, "30").unwrap();

        let row = service.load_cart().unwrap().remove(0);
        let mut form = QuickEditForm::open(&row, config.edit_debounce());
        form.set_indent_source(Some("IPD Substor".into()));
        form.set_requested_qty("12");
        service.save_quick_edit(&mut form).unwrap();
        assert_eq!(form.state(), &EditState::Clean);

        let row = service.load_cart().unwrap().remove(0);
        assert_eq!(row.request.requested_qty, "12");
        assert_eq!(row.indent_source(), Some("IPD Substor"));
    }

    #[test]
    fn test_quick_edit_rejects_zero_and_clean() {
        let (db, config) = setup();
        let service = IndentService::new(&db, &config);
        let item = stocked(&db, "Aspirin", "OPD Kaunter");
        service.add_to_cart(&item.id, "30").unwrap();

        let row = service.load_cart().unwrap().remove(0);
        let mut form = QuickEditForm::open(&row, config.edit_debounce());
        assert!(matches!(
            service.save_quick_edit(&mut form),
            Err(IndentError::Validation(_))
        ));

        form.set_requested_qty("0");
        assert!(matches!(
            service.save_quick_edit(&mut form),
            Err(IndentError::Validation(_))
        ));
        assert_eq!(form.state(), &EditState::Dirty);

        let lenient = IndentConfig {
            reject_zero_quantity: false,
            ..IndentConfig::default()
        };
        IndentService::new(&db, &lenient)
            .save_quick_edit(&mut form)
            .unwrap();
    }

    #[test]
    fn test_approve_all_twice() {
        let (db, config) = setup();
        let service = IndentService::new(&db, &config);
        let item = stocked(&db, "Aspirin", "OPD Kaunter");
        service.add_to_cart(&item.id, "1").unwrap();
        service.add_to_cart(&item.id, "2").unwrap();

        assert_eq!(service.approve_all().unwrap(), 2);
        assert_eq!(service.approve_all().unwrap(), 0);
        assert!(service.load_cart().unwrap().is_empty());
    }

    #[test]
    fn test_history_uses_local_day() {
        let (db, config) = setup();
        let service = IndentService::new(&db, &config);
        let item = stocked(&db, "Aspirin", "OPD Kaunter");
        let myt = FixedOffset::east_opt(8 * 3600).unwrap();

        // 2025-03-01 23:30 UTC is 2025-03-02 07:30 in UTC+8
        let mut late = IndentRequest::new(item.id.clone(), "3".into());
        late.created_at = Utc.with_ymd_and_hms(2025, 3, 1, 23, 30, 0).unwrap();
        db.insert_request(&late).unwrap();
        let mut early = IndentRequest::new(item.id.clone(), "4".into());
        early.created_at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        db.insert_request(&early).unwrap();
        service.approve_all().unwrap();

        let march_2 = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let history = service.load_history(march_2, &myt).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].request.id, late.id);

        let dates = service.approved_dates(&myt).unwrap();
        assert_eq!(
            dates,
            vec![march_2, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()]
        );
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(service.approved_dates(&utc).unwrap().len(), 1);
    }

    #[test]
    fn test_history_window_includes_both_day_edges() {
        let (db, config) = setup();
        let service = IndentService::new(&db, &config);
        let item = stocked(&db, "Aspirin", "OPD Kaunter");
        let myt = FixedOffset::east_opt(8 * 3600).unwrap();
        let midnight = myt
            .with_ymd_and_hms(2025, 3, 2, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc);

        let at = |qty: &str, ts: DateTime<Utc>| {
            let mut req = IndentRequest::new(item.id.clone(), qty.into());
            req.created_at = ts;
            db.insert_request(&req).unwrap();
            req.id
        };
        let before = at("1", midnight - Duration::microseconds(1));
        let first = at("2", midnight);
        let last = at("3", midnight + Duration::days(1) - Duration::microseconds(1));
        let next_day = at("4", midnight + Duration::days(1));
        service.approve_all().unwrap();

        let march_2 = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let ids: Vec<String> = service
            .load_history(march_2, &myt)
            .unwrap()
            .into_iter()
            .map(|r| r.request.id)
            .collect();
        assert_eq!(ids, vec![last, first]);
        assert!(!ids.contains(&before));
        assert!(!ids.contains(&next_day));

        let (from, to) = day_window(march_2, &myt).unwrap();
        assert_eq!(from.to_rfc3339(), "2025-03-01T16:00:00+00:00");
        assert_eq!(to - from, Duration::days(1) - Duration::microseconds(1));
    }

    #[test]
    fn test_add_to_cart_rejects_unknown_item() {
        let (db, config) = setup();
        let service = IndentService::new(&db, &config);

        let err = service.add_to_cart("no-such-item", "5").unwrap_err();
        assert!(matches!(err, IndentError::NotFound(_)));
        assert_eq!(err.user_message(), "Item no longer exists");
        assert!(service.load_cart().unwrap().is_empty());
        assert!(db.all_requests_with_items().unwrap().is_empty());
    }

    #[test]
    fn test_update_item_requires_name() {
        let (db, config) = setup();
        let service = IndentService::new(&db, &config);
        let mut item = stocked(&db, "Aspirin", "OPD Kaunter");
        item.name = " ".into();
        assert!(matches!(
            service.update_item(&item),
            Err(IndentError::Validation(_))
        ));

        item.name = "Aspirin 100mg".into();
        service.update_item(&item).unwrap();
        assert_eq!(db.get_item(&item.id).unwrap().unwrap().name, "Aspirin 100mg");

        let ghost = InventoryItem::new("Ghost".into());
        assert!(matches!(
            service.save_item_stock(&ghost.id, &ghost.stock_patch()),
            Err(IndentError::NotFound(_))
        ));
    }
}
