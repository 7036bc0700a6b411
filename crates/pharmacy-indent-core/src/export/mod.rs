//! Export of indent forms, cart spreadsheets and data backups.
//!
//! Documents are handed to a [`DocumentSink`]; the core never decides where
//! files end up.

mod backup;
mod sink;
mod workbook;

pub use backup::*;
pub use sink::*;
pub use workbook::*;

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::IndentConfig;
use crate::form::{FormBuilder, FormError, FormResult};
use crate::grouping::{SourceGroups, SourceKey};

/// What to do with each generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Save to the downloads location
    Download,
    /// Open in a document viewer
    Preview,
}

/// Why a document could not be produced or handed off.
#[derive(Debug, Error)]
pub enum ExportFailure {
    #[error("form error: {0}")]
    Form(#[from] FormError),

    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),
}

/// An export that stopped part way.
///
/// Documents dispatched before the failure are not withdrawn.
#[derive(Debug, Error)]
#[error("export of {source_key} failed after {dispatched} document(s): {source}")]
pub struct ExportError {
    pub source_key: SourceKey,
    pub dispatched: usize,
    pub source: ExportFailure,
}

impl ExportError {
    pub fn user_message(&self) -> &'static str {
        "Failed to export to PDF"
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub mode: ExportMode,
    /// Documents handed to the sink
    pub success_count: usize,
    /// File names in dispatch order
    pub files: Vec<String>,
}

impl ExportReport {
    /// No selected group had any rows.
    pub fn had_none(&self) -> bool {
        self.success_count == 0
    }

    /// Notice for staff. Same wording for both modes.
    pub fn notice(&self) -> String {
        if self.had_none() {
            return "No items to preview/download.".to_string();
        }
        format!("Successfully downloaded {} PDF file(s)!", self.success_count)
    }
}

/// Fixed inputs of one export run.
#[derive(Debug, Clone)]
pub struct ExportContext {
    pub filename_prefix: String,
    /// Date printed on the forms and in the file names
    pub issued_on: NaiveDate,
    pub builder: FormBuilder,
}

impl ExportContext {
    pub fn new(filename_prefix: impl Into<String>, issued_on: NaiveDate, builder: FormBuilder) -> Self {
        Self {
            filename_prefix: filename_prefix.into(),
            issued_on,
            builder,
        }
    }

    /// Context using the configured prefix and signatories.
    pub fn from_config(config: &IndentConfig, issued_on: NaiveDate) -> FormResult<Self> {
        Ok(Self::new(
            config.filename_prefix.clone(),
            issued_on,
            FormBuilder::from_config(config)?,
        ))
    }

    /// `<prefix>_<source>_<YYYY-MM-DD>.pdf`
    pub fn file_name(&self, source: &SourceKey) -> String {
        format!(
            "{}_{}_{}.pdf",
            self.filename_prefix,
            source,
            self.issued_on.format("%Y-%m-%d")
        )
    }
}

/// Produce one form per selected, non-empty source group.
///
/// Groups are visited in their display order. Selected keys that match no
/// group are ignored.
pub fn export_indent<K: DocumentSink + ?Sized>(
    mode: ExportMode,
    groups: &SourceGroups,
    selected: &[SourceKey],
    sink: &K,
    ctx: &ExportContext,
) -> Result<ExportReport, ExportError> {
    let mut files = Vec::new();

    for group in groups.non_empty().filter(|g| selected.contains(&g.key)) {
        let file_name = ctx.file_name(&group.key);
        let fail = |dispatched: usize, source: ExportFailure| {
            tracing::error!(source_key = %group.key, dispatched, error = %source, "indent export failed");
            ExportError {
                source_key: group.key.clone(),
                dispatched,
                source,
            }
        };

        let mut form = ctx.builder.build(group.key.as_str(), &group.rows, ctx.issued_on);
        form.set_title(file_name.clone());
        if form.overflows() {
            tracing::warn!(
                source_key = %group.key,
                rows = group.len(),
                "indent table runs into the signature block"
            );
        }

        let bytes = form
            .to_pdf()
            .map_err(|e| fail(files.len(), ExportFailure::Form(e)))?;
        let dispatched = match mode {
            ExportMode::Download => sink.save_file(&file_name, &bytes),
            ExportMode::Preview => sink.open_in_viewer(&file_name, &bytes),
        };
        dispatched.map_err(|e| fail(files.len(), ExportFailure::Sink(e)))?;

        tracing::debug!(source_key = %group.key, file = %file_name, ?mode, "indent form dispatched");
        files.push(file_name);
    }

    let report = ExportReport {
        mode,
        success_count: files.len(),
        files,
    };
    tracing::info!(?mode, documents = report.success_count, "indent export finished");
    Ok(report)
}
