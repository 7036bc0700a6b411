//! Pharmacy Indent Core Library
//!
//! Local-first inventory and indent (stock request) management for an
//! outpatient pharmacy.
//!
//! # Architecture
//!
//! ```text
//!   Inventory ──add to cart──▶ Pending request ──approve all──▶ Approved history
//!       ▲                          │      ▲                          │
//!       └──── quick edit ──────────┘      │                          │
//!                                         ▼                          ▼
//!                              group by source ──▶ KEW.PS-8 form ──▶ DocumentSink
//!                                                  cart workbook
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite store, change notifications and the image asset store
//! - [`store`]: the [`IndentStore`] boundary the lifecycle talks to
//! - [`models`]: inventory items, indent requests and versioned import rows
//! - [`indent`]: cart and history operations, quick-edit form
//! - [`grouping`]: source buckets and name collation
//! - [`form`]: dual-copy indent form layout and PDF output
//! - [`export`]: per-source form export, cart workbook, data backup
//! - [`catalog`]: inventory search, filters and orderings
//! - [`refresh`]: refetch coalescing and stale-response guarding for the
//!   live cart and inventory views
//! - [`config`], [`telemetry`]: configuration and tracing setup

pub mod catalog;
pub mod config;
pub mod db;
pub mod export;
pub mod form;
pub mod grouping;
pub mod indent;
pub mod models;
pub mod quantity;
pub mod refresh;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::{BackendConfig, IndentConfig};
pub use db::Database;
pub use export::{export_indent, DirectorySink, DocumentSink, ExportContext, ExportMode, ExportReport};
pub use form::{FormBuilder, IndentForm};
pub use grouping::{group_by_source, GroupingRule, SourceGroups, SourceKey};
pub use indent::{IndentError, IndentService, QuickEditForm};
pub use models::{IndentRequest, IndentStatus, InventoryItem, RequestWithItem, StockPatch};
pub use quantity::calculate_indent_qty;
pub use store::IndentStore;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{FixedOffset, NaiveDate, SecondsFormat};

use models::{PurchaseType, StdKt};
use refresh::{Completion, LiveView};
use store::Table;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum IndentCoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A store call failed; carries the message for staff
    #[error("{0}")]
    OperationFailed(String),

    #[error("Partial update: {0}")]
    PartialUpdate(String),

    #[error("Export error: {0}")]
    ExportError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for IndentCoreError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => IndentCoreError::NotFound(what),
            other => IndentCoreError::DatabaseError(other.to_string()),
        }
    }
}

impl From<IndentError> for IndentCoreError {
    fn from(e: IndentError) -> Self {
        let message = e.user_message();
        match e {
            IndentError::Validation(_) => IndentCoreError::InvalidInput(message),
            IndentError::NotFound(what) => IndentCoreError::NotFound(what),
            IndentError::Store { .. } => IndentCoreError::OperationFailed(message),
            IndentError::PartialUpdate(detail) => IndentCoreError::PartialUpdate(detail),
        }
    }
}

impl From<export::ExportError> for IndentCoreError {
    fn from(e: export::ExportError) -> Self {
        IndentCoreError::ExportError(format!("{} ({} already saved)", e.user_message(), e.dispatched))
    }
}

impl From<form::FormError> for IndentCoreError {
    fn from(e: form::FormError) -> Self {
        IndentCoreError::ConfigError(e.to_string())
    }
}

impl From<config::ConfigError> for IndentCoreError {
    fn from(e: config::ConfigError) -> Self {
        IndentCoreError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for IndentCoreError {
    fn from(e: serde_json::Error) -> Self {
        IndentCoreError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for IndentCoreError {
    fn from(e: std::io::Error) -> Self {
        IndentCoreError::ExportError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for IndentCoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        IndentCoreError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
///
/// `config_json` holds [`IndentConfig`] overrides; missing keys keep their
/// defaults.
#[uniffi::export]
pub fn open_database(
    path: String,
    config_json: Option<String>,
) -> Result<Arc<IndentCore>, IndentCoreError> {
    let db = Database::open(&path)?;
    IndentCore::new(db, config_json)
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory(
    config_json: Option<String>,
) -> Result<Arc<IndentCore>, IndentCoreError> {
    let db = Database::open_in_memory()?;
    IndentCore::new(db, config_json)
}

/// Open the database named by the environment (`INDENT_DATABASE_PATH`),
/// serving image URLs from the configured backend bucket.
#[uniffi::export]
pub fn open_database_from_env(
    config_json: Option<String>,
) -> Result<Arc<IndentCore>, IndentCoreError> {
    let backend = BackendConfig::from_env()?;
    tracing::info!(?backend, "opening database from environment");
    let mut db = Database::open(&backend.database_path)?;
    db.set_public_asset_base(backend.public_asset_base());
    IndentCore::with_backend(db, config_json, Some(backend))
}

/// Install the tracing subscriber. Returns false if one was already set.
#[uniffi::export]
pub fn init_logging(json: bool) -> bool {
    telemetry::init_tracing(json)
}

/// `max - balance` clamped at zero, on free-text inputs.
#[uniffi::export]
pub fn compute_indent_qty(max_qty: String, balance: String) -> String {
    calculate_indent_qty(&max_qty, &balance)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Host hook told when a live view should be refreshed.
///
/// Called while the triggering write still holds the database; schedule the
/// refresh instead of calling back into the core from inside the hook.
#[uniffi::export(callback_interface)]
pub trait ChangeListener: Send + Sync {
    /// `delay_ms` is 0 when the view can be refreshed right away.
    fn refresh_due(&self, view: FfiLiveView, delay_ms: u64);
}

type SharedListener = Arc<Mutex<Option<Box<dyn ChangeListener>>>>;

/// Thread-safe core handle for FFI.
#[derive(uniffi::Object)]
pub struct IndentCore {
    db: Arc<Mutex<Database>>,
    config: IndentConfig,
    backend: Option<BackendConfig>,
    cart_view: Arc<LiveView<SourceGroups>>,
    inventory_view: Arc<LiveView<Vec<InventoryItem>>>,
    listener: SharedListener,
}

impl IndentCore {
    fn new(db: Database, config_json: Option<String>) -> Result<Arc<Self>, IndentCoreError> {
        Self::with_backend(db, config_json, None)
    }

    fn with_backend(
        db: Database,
        config_json: Option<String>,
        backend: Option<BackendConfig>,
    ) -> Result<Arc<Self>, IndentCoreError> {
        let config = match config_json {
            Some(json) => IndentConfig::from_json(&json)?,
            None => IndentConfig::default(),
        };
        let cart_view = Arc::new(LiveView::new(config.refetch_window()));
        let inventory_view = Arc::new(LiveView::new(config.refetch_window()));
        let listener: SharedListener = Arc::new(Mutex::new(None));

        {
            let cart = Arc::clone(&cart_view);
            let listener = Arc::clone(&listener);
            db.subscribe(Table::IndentRequests, move |_| {
                let delay = cart.on_change(Instant::now());
                notify_listener(&listener, FfiLiveView::Cart, delay);
            });
        }
        {
            let cart = Arc::clone(&cart_view);
            let inventory = Arc::clone(&inventory_view);
            let listener = Arc::clone(&listener);
            db.subscribe(Table::InventoryItems, move |_| {
                let now = Instant::now();
                notify_listener(&listener, FfiLiveView::Inventory, inventory.on_change(now));
                // cart rows carry item fields
                notify_listener(&listener, FfiLiveView::Cart, cart.on_change(now));
            });
        }

        Ok(Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
            backend,
            cart_view,
            inventory_view,
            listener,
        }))
    }

    fn load_cart_groups(&self) -> Result<SourceGroups, IndentCoreError> {
        let db = self.db.lock()?;
        Ok(IndentService::new(&*db, &self.config).load_cart_grouped()?)
    }

    /// ISO dates first, then the configured input formats.
    fn parse_date(&self, input: &str) -> Result<NaiveDate, IndentCoreError> {
        NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| self.config.parse_date_input(input))
            .ok_or_else(|| IndentCoreError::InvalidInput(format!("Invalid date: {input}")))
    }

    fn offset(utc_offset_minutes: i32) -> Result<FixedOffset, IndentCoreError> {
        FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).ok_or_else(|| {
            IndentCoreError::InvalidInput(format!("Invalid UTC offset: {utc_offset_minutes}"))
        })
    }

    fn ffi_item(&self, item: FfiInventoryItem) -> Result<InventoryItem, IndentCoreError> {
        let short_exp = item
            .short_exp
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| self.parse_date(s))
            .transpose()?;
        Ok(InventoryItem {
            id: if item.id.is_empty() {
                uuid::Uuid::new_v4().to_string()
            } else {
                item.id
            },
            name: item.name,
            item_code: item.item_code,
            pku: item.pku,
            purchase_type: item.purchase_type.as_deref().and_then(PurchaseType::parse),
            std_kt: item.std_kt.as_deref().and_then(StdKt::parse),
            category: item.category,
            row: item.row,
            section: item.section,
            bin: item.bin,
            max_qty: item.max_qty,
            balance: item.balance,
            indent_source: item.indent_source,
            remarks: item.remarks,
            is_short_exp: item.is_short_exp,
            short_exp,
            image_url: item.image_url,
        })
    }
}

#[uniffi::export]
impl IndentCore {
    // =========================================================================
    // Inventory Operations
    // =========================================================================

    /// Add or replace an inventory item. Returns the stored item.
    pub fn upsert_item(&self, item: FfiInventoryItem) -> Result<FfiInventoryItem, IndentCoreError> {
        let item = self.ffi_item(item)?;
        let db = self.db.lock()?;
        db.upsert_item(&item)?;
        Ok(item.into())
    }

    /// Save an edit of an existing item.
    pub fn update_item(&self, item: FfiInventoryItem) -> Result<(), IndentCoreError> {
        let item = self.ffi_item(item)?;
        let db = self.db.lock()?;
        IndentService::new(&*db, &self.config).update_item(&item)?;
        Ok(())
    }

    pub fn get_item(&self, id: String) -> Result<Option<FfiInventoryItem>, IndentCoreError> {
        let db = self.db.lock()?;
        Ok(db.get_item(&id)?.map(Into::into))
    }

    /// Items matching the filters, by name. Blank filters match everything.
    pub fn search_items(
        &self,
        text: Option<String>,
        section: Option<String>,
        indent_source: Option<String>,
    ) -> Result<Vec<FfiInventoryItem>, IndentCoreError> {
        let db = self.db.lock()?;
        let items = db.list_items()?;
        let query = catalog::CatalogQuery {
            text,
            section: section.filter(|s| !s.is_empty()),
            indent_source: indent_source.filter(|s| !s.is_empty()),
        };
        Ok(catalog::filter_items(&items, &query)
            .into_iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    /// Items in locator order.
    pub fn locator_items(&self) -> Result<Vec<FfiInventoryItem>, IndentCoreError> {
        let db = self.db.lock()?;
        let mut items = db.list_items()?;
        catalog::sort_for_locator(&mut items);
        Ok(items.into_iter().map(Into::into).collect())
    }

    /// Items in shelf order.
    pub fn shelf_items(&self) -> Result<Vec<FfiInventoryItem>, IndentCoreError> {
        let db = self.db.lock()?;
        let mut items = db.list_items()?;
        catalog::sort_by_shelf(&mut items);
        Ok(items.into_iter().map(Into::into).collect())
    }

    /// "Did you mean" names for a search with no hits.
    pub fn suggest_items(&self, query: String, limit: u32) -> Result<Vec<String>, IndentCoreError> {
        let db = self.db.lock()?;
        let items = db.list_items()?;
        Ok(catalog::suggest(&items, &query, limit as usize)
            .into_iter()
            .map(|s| s.name)
            .collect())
    }

    /// Distinct indent sources in use, for pickers.
    pub fn indent_sources(&self) -> Result<Vec<String>, IndentCoreError> {
        let db = self.db.lock()?;
        Ok(catalog::distinct_sources(&db.list_items()?))
    }

    /// Flagged items with an expiry date, soonest first.
    pub fn short_expiry(&self, today: String) -> Result<Vec<FfiShortExpiry>, IndentCoreError> {
        let today = self.parse_date(&today)?;
        let db = self.db.lock()?;
        let items = db.list_short_expiry()?;
        Ok(catalog::short_expiry_report(&items, today)
            .into_iter()
            .map(|e| FfiShortExpiry {
                item_name: e.item.name.clone(),
                item_id: e.item.id,
                expires_on: e.expires_on.to_string(),
                days_left: e.days_left,
            })
            .collect())
    }

    /// Import a JSON array of inventory rows of any schema revision.
    pub fn import_inventory_json(&self, json: String) -> Result<FfiImportReport, IndentCoreError> {
        let rows: Vec<serde_json::Value> = serde_json::from_str(&json)?;
        let db = self.db.lock()?;
        let report = db.import_rows(rows)?;
        Ok(FfiImportReport {
            imported: report.imported as u32,
            skipped: report.skipped.len() as u32,
        })
    }

    /// Store a drug photo and point the item at it. Returns the public URL.
    pub fn attach_item_image(
        &self,
        item_id: String,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<String, IndentCoreError> {
        let db = self.db.lock()?;
        Ok(db.attach_item_image(&item_id, &file_name, &bytes, chrono::Utc::now())?)
    }

    // =========================================================================
    // Cart Operations
    // =========================================================================

    pub fn add_to_cart(
        &self,
        item_id: String,
        quantity: String,
    ) -> Result<FfiIndentRow, IndentCoreError> {
        let db = self.db.lock()?;
        let request = IndentService::new(&*db, &self.config).add_to_cart(&item_id, &quantity)?;
        let item = db.get_item(&request.item_id)?;
        Ok(RequestWithItem { request, item }.into())
    }

    /// Pending requests grouped by source.
    pub fn cart(&self) -> Result<Vec<FfiSourceGroup>, IndentCoreError> {
        Ok(ffi_groups(&self.load_cart_groups()?))
    }

    /// Save a cart row edit: item stock first, then the quantity.
    ///
    /// A blank `requested_qty` takes `max_qty - balance`.
    pub fn save_cart_edit(
        &self,
        request_id: String,
        edit: FfiCartEdit,
    ) -> Result<(), IndentCoreError> {
        let db = self.db.lock()?;
        let service = IndentService::new(&*db, &self.config);
        let row = service
            .load_cart()?
            .into_iter()
            .find(|r| r.request.id == request_id)
            .ok_or_else(|| IndentCoreError::NotFound(format!("pending request {request_id}")))?;

        let short_exp = edit
            .short_exp
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| self.parse_date(s))
            .transpose()?;

        let now = Instant::now();
        let mut form = QuickEditForm::open(&row, Duration::ZERO);
        form.set_max_qty(edit.max_qty, now);
        form.set_balance(edit.balance, now);
        if !edit.requested_qty.trim().is_empty() {
            form.set_requested_qty(edit.requested_qty);
        }
        form.set_indent_source(edit.indent_source);
        form.set_remarks(edit.remarks);
        form.set_short_exp_flag(edit.is_short_exp);
        form.set_short_exp(short_exp);

        service.save_quick_edit(&mut form)?;
        Ok(())
    }

    pub fn remove_from_cart(&self, request_id: String) -> Result<(), IndentCoreError> {
        let db = self.db.lock()?;
        IndentService::new(&*db, &self.config).remove_from_cart(&request_id)?;
        Ok(())
    }

    /// Approve every pending request. Returns how many were approved.
    pub fn approve_all(&self) -> Result<u32, IndentCoreError> {
        let db = self.db.lock()?;
        let approved = IndentService::new(&*db, &self.config).approve_all()?;
        Ok(approved as u32)
    }

    // =========================================================================
    // History Operations
    // =========================================================================

    /// Approved requests of one local day, grouped by source.
    pub fn history(
        &self,
        date: String,
        utc_offset_minutes: i32,
    ) -> Result<Vec<FfiSourceGroup>, IndentCoreError> {
        let date = self.parse_date(&date)?;
        let tz = Self::offset(utc_offset_minutes)?;
        let db = self.db.lock()?;
        let groups = IndentService::new(&*db, &self.config).load_history_grouped(date, &tz)?;
        Ok(ffi_groups(&groups))
    }

    /// Local days with approved requests, newest first, as `YYYY-MM-DD`.
    pub fn history_dates(&self, utc_offset_minutes: i32) -> Result<Vec<String>, IndentCoreError> {
        let tz = Self::offset(utc_offset_minutes)?;
        let db = self.db.lock()?;
        let dates = IndentService::new(&*db, &self.config).approved_dates(&tz)?;
        Ok(dates.into_iter().map(|d| d.to_string()).collect())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export one form per selected source of the cart, or of the approved
    /// history of `history_date` when given.
    pub fn export_indent(&self, request: FfiExportRequest) -> Result<FfiExportReport, IndentCoreError> {
        let issued_on = self.parse_date(&request.issued_on)?;
        let history_date = request
            .history_date
            .map(|d| self.parse_date(&d))
            .transpose()?;
        let tz = Self::offset(request.utc_offset_minutes)?;

        let groups = {
            let db = self.db.lock()?;
            let service = IndentService::new(&*db, &self.config);
            match history_date {
                Some(date) => service.load_history_grouped(date, &tz)?,
                None => service.load_cart_grouped()?,
            }
        };

        let ctx = ExportContext::from_config(&self.config, issued_on)?;
        let sink = DirectorySink::new(request.downloads_dir, request.previews_dir);
        let selected: Vec<SourceKey> = request.selected.into_iter().map(SourceKey).collect();
        let report = export_indent(request.mode.into(), &groups, &selected, &sink, &ctx)?;

        Ok(FfiExportReport {
            success_count: report.success_count as u32,
            notice: report.notice(),
            files: report.files,
        })
    }

    /// Write the cart as one CSV per source. Returns the files written.
    pub fn export_cart_workbook(
        &self,
        dir: String,
        date: String,
    ) -> Result<u32, IndentCoreError> {
        let date = self.parse_date(&date)?;
        let groups = self.load_cart_groups()?;
        let workbook = export::CartWorkbook::from_groups(&groups);
        let sink = DirectorySink::new(&dir, &dir);
        let written = workbook.save(&sink, &self.config.workbook_prefix, date)?;
        Ok(written as u32)
    }

    /// Full inventory and indent backup as JSON.
    pub fn export_backup_json(&self) -> Result<String, IndentCoreError> {
        let db = self.db.lock()?;
        let backup = export::DataBackup::collect(&db)?;
        Ok(backup.to_json()?)
    }

    // =========================================================================
    // Live Views
    // =========================================================================

    /// Be told when the cart or inventory changed. Replaces any previous listener.
    pub fn set_change_listener(&self, listener: Box<dyn ChangeListener>) -> Result<(), IndentCoreError> {
        *self.listener.lock()? = Some(listener);
        Ok(())
    }

    pub fn clear_change_listener(&self) -> Result<(), IndentCoreError> {
        *self.listener.lock()? = None;
        Ok(())
    }

    /// The cart, if it changed since the last refresh; `None` otherwise.
    ///
    /// Changes arriving within `refetch_window_ms` of the previous refresh
    /// are held back until the window ends.
    pub fn refresh_cart(&self) -> Result<Option<Vec<FfiSourceGroup>>, IndentCoreError> {
        if !self.cart_view.take_due(Instant::now()) {
            return Ok(None);
        }
        match self.cart_view.refresh(|| self.load_cart_groups()) {
            Completion::Applied => Ok(self.cart_view.with_data(ffi_groups)),
            Completion::Superseded => Ok(None),
            Completion::Failed(e) => Err(e),
        }
    }

    /// Inventory by name, if it changed since the last refresh; `None` otherwise.
    pub fn refresh_inventory(&self) -> Result<Option<Vec<FfiInventoryItem>>, IndentCoreError> {
        if !self.inventory_view.take_due(Instant::now()) {
            return Ok(None);
        }
        let fetch = || -> Result<Vec<InventoryItem>, IndentCoreError> {
            let db = self.db.lock()?;
            Ok(db.list_items()?)
        };
        match self.inventory_view.refresh(fetch) {
            Completion::Applied => Ok(self
                .inventory_view
                .with_data(|items| items.iter().cloned().map(Into::into).collect())),
            Completion::Superseded => Ok(None),
            Completion::Failed(e) => Err(e),
        }
    }

    /// Milliseconds until a held-back refresh is due, if any view has one.
    pub fn refresh_due_in_ms(&self) -> Option<u64> {
        let now = Instant::now();
        [self.cart_view.due_in(now), self.inventory_view.due_in(now)]
            .into_iter()
            .flatten()
            .min()
            .map(duration_ms)
    }

    // =========================================================================
    // Backend
    // =========================================================================

    /// Headers the host attaches to backend requests. Empty without a backend.
    pub fn backend_headers(&self) -> Vec<FfiHeader> {
        self.backend
            .as_ref()
            .map(|b| {
                b.auth_headers()
                    .into_iter()
                    .map(|(name, value)| FfiHeader {
                        name: name.to_string(),
                        value,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn notify_listener(listener: &SharedListener, view: FfiLiveView, delay: Duration) {
    let guard = listener.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(listener) = guard.as_ref() {
        listener.refresh_due(view, duration_ms(delay));
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn ffi_groups(groups: &SourceGroups) -> Vec<FfiSourceGroup> {
    groups
        .iter()
        .map(|g| FfiSourceGroup {
            key: g.key.to_string(),
            rows: g.rows.iter().cloned().map(Into::into).collect(),
        })
        .collect()
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe inventory item. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInventoryItem {
    /// Empty to have one generated
    pub id: String,
    pub name: String,
    pub item_code: Option<String>,
    pub pku: Option<String>,
    pub purchase_type: Option<String>,
    pub std_kt: Option<String>,
    pub category: Option<String>,
    pub row: Option<String>,
    pub section: Option<String>,
    pub bin: Option<String>,
    pub max_qty: u32,
    pub balance: u32,
    pub indent_source: Option<String>,
    pub remarks: Option<String>,
    pub is_short_exp: bool,
    pub short_exp: Option<String>,
    pub image_url: Option<String>,
}

impl From<InventoryItem> for FfiInventoryItem {
    fn from(item: InventoryItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            item_code: item.item_code,
            pku: item.pku,
            purchase_type: item.purchase_type.map(|p| p.as_str().to_string()),
            std_kt: item.std_kt.map(|s| s.as_str().to_string()),
            category: item.category,
            row: item.row,
            section: item.section,
            bin: item.bin,
            max_qty: item.max_qty,
            balance: item.balance,
            indent_source: item.indent_source,
            remarks: item.remarks,
            is_short_exp: item.is_short_exp,
            short_exp: item.short_exp.map(|d| d.to_string()),
            image_url: item.image_url,
        }
    }
}

/// FFI-safe indent request joined with its item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIndentRow {
    pub request_id: String,
    pub item_id: String,
    /// Empty when the item was deleted
    pub item_name: String,
    /// Name with " | pku" when present
    pub description: String,
    pub requested_qty: String,
    pub status: String,
    pub created_at: String,
    pub indent_source: Option<String>,
    pub max_qty: u32,
    pub balance: u32,
}

impl From<RequestWithItem> for FfiIndentRow {
    fn from(row: RequestWithItem) -> Self {
        Self {
            item_name: row.item_name().to_string(),
            description: row.description(),
            indent_source: row.indent_source().map(String::from),
            max_qty: row.item.as_ref().map(|i| i.max_qty).unwrap_or(0),
            balance: row.item.as_ref().map(|i| i.balance).unwrap_or(0),
            request_id: row.request.id,
            item_id: row.request.item_id,
            requested_qty: row.request.requested_qty,
            status: row.request.status.as_str().to_string(),
            created_at: row.request.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// FFI-safe source bucket.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSourceGroup {
    pub key: String,
    pub rows: Vec<FfiIndentRow>,
}

/// Fields of a cart row edit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCartEdit {
    pub max_qty: String,
    pub balance: String,
    /// Blank to use the computed quantity
    pub requested_qty: String,
    pub indent_source: Option<String>,
    pub remarks: Option<String>,
    pub is_short_exp: bool,
    pub short_exp: Option<String>,
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiExportMode {
    Download,
    Preview,
}

impl From<FfiExportMode> for ExportMode {
    fn from(mode: FfiExportMode) -> Self {
        match mode {
            FfiExportMode::Download => ExportMode::Download,
            FfiExportMode::Preview => ExportMode::Preview,
        }
    }
}

/// Parameters of a form export. Dates are `YYYY-MM-DD` or a configured
/// input format.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExportRequest {
    pub mode: FfiExportMode,
    /// Source keys to export
    pub selected: Vec<String>,
    /// Date printed on the forms
    pub issued_on: String,
    /// Export a day of history instead of the cart
    pub history_date: Option<String>,
    pub utc_offset_minutes: i32,
    pub downloads_dir: String,
    pub previews_dir: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExportReport {
    pub success_count: u32,
    /// Message for staff
    pub notice: String,
    pub files: Vec<String>,
}

/// Views kept current by store changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiLiveView {
    Cart,
    Inventory,
}

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportReport {
    pub imported: u32,
    pub skipped: u32,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiShortExpiry {
    pub item_id: String,
    pub item_name: String,
    pub expires_on: String,
    /// Negative once expired
    pub days_left: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffi_item(name: &str, source: &str) -> FfiInventoryItem {
        FfiInventoryItem {
            id: String::new(),
            name: name.to_string(),
            item_code: None,
            pku: Some("P1".to_string()),
            purchase_type: Some("lp".to_string()),
            std_kt: None,
            category: None,
            row: None,
            section: None,
            bin: None,
            max_qty: 50,
            balance: 20,
            indent_source: Some(source.to_string()),
            remarks: None,
            is_short_exp: true,
            short_exp: Some("31/12/2025".to_string()),
            image_url: None,
        }
    }

    #[test]
    fn test_ffi_cart_flow() {
        let core = open_database_in_memory(None).unwrap();
        let item = core.upsert_item(ffi_item("Amlodipine 5mg", "OPD Kaunter")).unwrap();
        assert!(!item.id.is_empty());
        assert_eq!(item.purchase_type.as_deref(), Some("LP"));
        assert_eq!(item.short_exp.as_deref(), Some("2025-12-31"));

        let row = core.add_to_cart(item.id.clone(), "30".into()).unwrap();
        assert_eq!(row.description, "Amlodipine 5mg | P1");

        let cart = core.cart().unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].key, "OPD Kaunter");

        core.save_cart_edit(
            row.request_id.clone(),
            FfiCartEdit {
                max_qty: "60".into(),
                balance: "10".into(),
                requested_qty: String::new(),
                indent_source: Some("OPD Kaunter".into()),
                remarks: None,
                is_short_exp: false,
                short_exp: None,
            },
        )
        .unwrap();
        let cart = core.cart().unwrap();
        assert_eq!(cart[0].rows[0].requested_qty, "50");
        assert_eq!(cart[0].rows[0].max_qty, 60);

        assert_eq!(core.approve_all().unwrap(), 1);
        assert!(core.cart().unwrap().is_empty());
        assert_eq!(core.history_dates(0).unwrap().len(), 1);
    }

    #[test]
    fn test_ffi_validation_message() {
        let core = open_database_in_memory(None).unwrap();
        match core.add_to_cart("x".into(), "  ".into()) {
            Err(IndentCoreError::InvalidInput(msg)) => assert_eq!(msg, "Please enter indent quantity"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            core.history("not a date".into(), 0),
            Err(IndentCoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ffi_config_json() {
        let core = open_database_in_memory(Some(r#"{"filename_prefix": "Ward"}"#.into())).unwrap();
        assert_eq!(core.config.filename_prefix, "Ward");
        assert!(open_database_in_memory(Some("{".into())).is_err());
    }

    #[derive(Default)]
    struct RecordingListener {
        calls: Arc<Mutex<Vec<(FfiLiveView, u64)>>>,
    }

    impl ChangeListener for RecordingListener {
        fn refresh_due(&self, view: FfiLiveView, delay_ms: u64) {
            self.calls.lock().unwrap().push((view, delay_ms));
        }
    }

    #[test]
    fn test_live_cart_refresh() {
        let core = open_database_in_memory(Some(r#"{"refetch_window_ms": 200}"#.into())).unwrap();
        let listener = RecordingListener::default();
        let calls = Arc::clone(&listener.calls);
        core.set_change_listener(Box::new(listener)).unwrap();

        // first refresh always loads
        assert!(core.refresh_cart().unwrap().unwrap().is_empty());
        assert!(core.refresh_cart().unwrap().is_none());

        let item = core.upsert_item(ffi_item("Amlodipine 5mg", "OPD Kaunter")).unwrap();
        core.add_to_cart(item.id.clone(), "30".into()).unwrap();
        {
            let calls = calls.lock().unwrap();
            assert_eq!(calls[0], (FfiLiveView::Inventory, 0));
            assert_eq!(calls[1], (FfiLiveView::Cart, 0));
            // second cart change falls inside the window
            assert_eq!(calls[2].0, FfiLiveView::Cart);
            assert!(calls[2].1 > 0 && calls[2].1 <= 200);
        }

        let cart = core.refresh_cart().unwrap().unwrap();
        assert_eq!(cart[0].rows.len(), 1);
        assert!(core.refresh_cart().unwrap().is_none());
        assert!(core.refresh_due_in_ms().is_some_and(|ms| ms <= 200));

        std::thread::sleep(Duration::from_millis(250));
        assert!(core.refresh_cart().unwrap().is_some());
        assert!(core.refresh_cart().unwrap().is_none());

        let inventory = core.refresh_inventory().unwrap().unwrap();
        assert_eq!(inventory[0].name, "Amlodipine 5mg");
        assert!(core.refresh_inventory().unwrap().is_none());
        assert_eq!(core.refresh_due_in_ms(), None);

        core.clear_change_listener().unwrap();
        core.add_to_cart(item.id, "5".into()).unwrap();
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_ffi_add_to_cart_unknown_item() {
        let core = open_database_in_memory(None).unwrap();
        assert!(matches!(
            core.add_to_cart("missing".into(), "5".into()),
            Err(IndentCoreError::NotFound(_))
        ));
        assert!(core.cart().unwrap().is_empty());
        assert!(core.backend_headers().is_empty());
    }

    #[test]
    fn test_compute_indent_qty() {
        assert_eq!(compute_indent_qty("50".into(), "20".into()), "30");
    }
}
