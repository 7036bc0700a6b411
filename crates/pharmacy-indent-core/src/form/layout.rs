//! Laid-out indent form.
//!
//! Coordinates are millimetres from the top-left corner of an A4 landscape
//! page; text `y` is the baseline.

use chrono::NaiveDate;

use super::builder::SignatureImage;
use super::metrics::Font;

pub const PAGE_WIDTH: f64 = 297.0;
pub const PAGE_HEIGHT: f64 = 210.0;
pub const PANEL_WIDTH: f64 = PAGE_WIDTH / 2.0;

/// Baseline of the signature role labels.
pub const SIGNATURE_Y: f64 = PAGE_HEIGHT - 25.0;

/// The table must end above this line to leave the signature block clear.
pub const SIGNATURE_ZONE_TOP: f64 = SIGNATURE_Y - 3.0;

/// Copy labels, left panel first.
pub const COPY_LABELS: [&str; 2] = ["SALINAN PEMESAN", "SALINAN PENGELUAR"];

/// One primitive on the page.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f64,
        y: f64,
        size: f64,
        font: Font,
        text: String,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width: f64,
        /// Dash and gap length
        dash: Option<f64>,
        /// 0 = black, 255 = white
        gray: u8,
    },
    /// Stroked black rectangle; `y` is the top edge.
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        width: f64,
    },
    /// Embedded image; `y` is the top edge.
    Image {
        index: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
}

/// One body row of the indent table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRow {
    /// 1-based
    pub number: usize,
    pub description: String,
    pub quantity: String,
}

/// A complete single-page, dual-copy indent form.
#[derive(Debug, Clone)]
pub struct IndentForm {
    pub(super) source: String,
    pub(super) issued_on: NaiveDate,
    pub(super) title: Option<String>,
    pub(super) rows: Vec<FormRow>,
    pub(super) table_bottom: f64,
    pub(super) ops: Vec<DrawOp>,
    pub(super) images: Vec<SignatureImage>,
}

impl IndentForm {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn issued_on(&self) -> NaiveDate {
        self.issued_on
    }

    /// Table rows, identical on both copies.
    pub fn rows(&self) -> &[FormRow] {
        &self.rows
    }

    /// Heading printed above the table.
    pub fn heading(&self) -> String {
        format!("BORANG PERMOHONAN STOK UBAT ({})", self.source)
    }

    /// Document title stored in the file metadata.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Bottom edge of the table in millimetres.
    pub fn table_bottom(&self) -> f64 {
        self.table_bottom
    }

    /// Whether the table runs into the signature block.
    pub fn overflows(&self) -> bool {
        self.table_bottom > SIGNATURE_ZONE_TOP
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub(super) fn images(&self) -> &[SignatureImage] {
        &self.images
    }

    /// Every text string on the page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
