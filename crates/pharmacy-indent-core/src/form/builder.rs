//! Lays out the dual-copy KEW.PS-8 stock request form.

use chrono::NaiveDate;

use super::layout::{
    DrawOp, FormRow, IndentForm, COPY_LABELS, PAGE_HEIGHT, PANEL_WIDTH, SIGNATURE_Y,
};
use super::metrics::{ascent, line_height, text_width, wrap, Font};
use super::{FormError, FormResult};
use crate::config::{IndentConfig, SignatoryConfig};
use crate::models::RequestWithItem;

const CUT_LINE_WIDTH: f64 = 0.2;
const CUT_LINE_DASH: f64 = 1.0;
const CUT_LINE_GRAY: u8 = 150;

const TABLE_TOP: f64 = 35.0;
const TABLE_MARGIN: f64 = 5.0;
const TABLE_FONT: f64 = 8.0;
const CELL_PADDING: f64 = 2.0;
const GRID_WIDTH: f64 = 0.1;
const APPROVAL_RULE_WIDTH: f64 = 0.6;
const MIN_BODY_ROW: f64 = 8.0;

const SIGNATURE_FONT: f64 = 7.0;
const SIGNATURE_MAX_WIDTH: f64 = 25.0;
const SIGNATURE_MAX_HEIGHT: f64 = 7.0;

/// Index of the approval column, drawn with a heavy left rule.
const APPROVAL_COLUMN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Center,
    Right,
}

struct Column {
    header: &'static str,
    /// `None` takes the remaining width
    width: Option<f64>,
    align: Align,
}

const COLUMNS: [Column; 6] = [
    Column { header: "Bil", width: Some(8.0), align: Align::Center },
    Column { header: "Perihal stok", width: None, align: Align::Left },
    Column { header: "Qty", width: Some(16.0), align: Align::Center },
    Column { header: "Catatan", width: Some(15.0), align: Align::Left },
    Column { header: "Lulus", width: Some(12.0), align: Align::Center },
    Column { header: "Catatan", width: Some(15.0), align: Align::Left },
];

/// A JPEG signature scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureImage {
    pub(super) data: Vec<u8>,
    pub(super) width_px: u16,
    pub(super) height_px: u16,
    pub(super) components: u8,
}

impl SignatureImage {
    /// Validate a baseline or progressive JPEG and read its dimensions.
    pub fn from_jpeg(data: Vec<u8>) -> FormResult<Self> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
            return Err(FormError::InvalidImage("missing JPEG SOI marker".to_string()));
        }

        let mut pos = 2;
        while pos + 4 <= data.len() {
            if data[pos] != 0xFF {
                return Err(FormError::InvalidImage(format!("bad marker at byte {pos}")));
            }
            let marker = data[pos + 1];
            if marker == 0xFF {
                pos += 1;
                continue;
            }
            if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
                pos += 2;
                continue;
            }

            let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
            if is_sof {
                if pos + 10 > data.len() {
                    return Err(FormError::InvalidImage("truncated frame header".to_string()));
                }
                let height_px = u16::from_be_bytes([data[pos + 5], data[pos + 6]]);
                let width_px = u16::from_be_bytes([data[pos + 7], data[pos + 8]]);
                let components = data[pos + 9];
                if width_px == 0 || height_px == 0 {
                    return Err(FormError::InvalidImage("zero image dimension".to_string()));
                }
                if !matches!(components, 1 | 3 | 4) {
                    return Err(FormError::InvalidImage(format!(
                        "unsupported component count {components}"
                    )));
                }
                return Ok(Self {
                    data,
                    width_px,
                    height_px,
                    components,
                });
            }
            pos += 2 + len;
        }

        Err(FormError::InvalidImage("no frame header found".to_string()))
    }

    pub fn width_px(&self) -> u16 {
        self.width_px
    }

    pub fn height_px(&self) -> u16 {
        self.height_px
    }

    /// Largest size fitting the signature box, keeping the aspect ratio.
    fn fit(&self, max_w: f64, max_h: f64) -> (f64, f64) {
        let aspect = self.width_px as f64 / self.height_px as f64;
        if max_w / aspect <= max_h {
            (max_w, max_w / aspect)
        } else {
            (max_h * aspect, max_h)
        }
    }
}

/// Details pre-stamped in a signature block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signatory {
    pub name: String,
    pub position: String,
    pub signature: Option<SignatureImage>,
}

impl Signatory {
    /// Load from configuration, reading the signature file if one is set.
    pub fn from_config(config: &SignatoryConfig) -> FormResult<Self> {
        let signature = match &config.signature_path {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|source| FormError::SignatureFile {
                    path: path.clone(),
                    source,
                })?;
                Some(SignatureImage::from_jpeg(bytes)?)
            }
            None => None,
        };
        Ok(Self {
            name: config.name.clone(),
            position: config.position.clone(),
            signature,
        })
    }
}

/// Pre-stamped signatories. The approving officer always signs by hand.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signatories {
    pub requester: Option<Signatory>,
    pub receiver: Option<Signatory>,
}

/// Builds indent forms.
#[derive(Debug, Clone, Default)]
pub struct FormBuilder {
    signatories: Signatories,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signatories(signatories: Signatories) -> Self {
        Self { signatories }
    }

    /// Builder with the signatories named in `config`.
    pub fn from_config(config: &IndentConfig) -> FormResult<Self> {
        let load = |c: &Option<SignatoryConfig>| c.as_ref().map(Signatory::from_config).transpose();
        Ok(Self::with_signatories(Signatories {
            requester: load(&config.requester)?,
            receiver: load(&config.receiver)?,
        }))
    }

    /// Lay out one source group as a single page.
    pub fn build(&self, source_label: &str, rows: &[RequestWithItem], issued_on: NaiveDate) -> IndentForm {
        let form_rows: Vec<FormRow> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| FormRow {
                number: idx + 1,
                description: row.description(),
                quantity: if row.request.requested_qty.is_empty() {
                    "0".to_string()
                } else {
                    row.request.requested_qty.clone()
                },
            })
            .collect();

        let mut page = Page::default();
        let mut images = Vec::new();
        for signatory in [&self.signatories.requester, &self.signatories.receiver]
            .into_iter()
            .flatten()
        {
            if let Some(sig) = &signatory.signature {
                images.push(sig.clone());
            }
        }

        page.line(PANEL_WIDTH, 5.0, PANEL_WIDTH, PAGE_HEIGHT - 5.0, CUT_LINE_WIDTH, Some(CUT_LINE_DASH), CUT_LINE_GRAY);

        let title = format!("BORANG PERMOHONAN STOK UBAT ({source_label})");
        let date = issued_on.format("%d/%m/%Y").to_string();
        let mut table_bottom = TABLE_TOP;

        for (copy, label) in COPY_LABELS.iter().enumerate() {
            let left = copy as f64 * PANEL_WIDTH;
            let right = left + PANEL_WIDTH;
            let center = left + PANEL_WIDTH / 2.0;

            page.text(label, right - 7.0, 15.0, 9.0, Font::Bold, Align::Right);

            page.text("Pekeliling Perbendaharaan Malaysia", left + 7.0, 20.0, 8.0, Font::Oblique, Align::Left);
            page.text("AM 6.5 LAMPIRAN B", center, 20.0, 8.0, Font::Regular, Align::Center);
            page.text("KEW.PS-8", right - 7.0, 20.0, 8.0, Font::Regular, Align::Right);

            page.text(&title, center, 30.0, 10.0, Font::Bold, Align::Center);

            table_bottom = page.table(left + TABLE_MARGIN, right - TABLE_MARGIN, &form_rows);

            let mut image_index = 0;
            let blocks = [
                ("Pemohon", left + 10.0, self.signatories.requester.as_ref()),
                ("Pegawai Pelulus", center - 10.0, None),
                ("Penerima", right - 30.0, self.signatories.receiver.as_ref()),
            ];
            for (role, x, signatory) in blocks {
                let signature = signatory.and_then(|s| s.signature.as_ref()).map(|sig| {
                    let index = image_index;
                    image_index += 1;
                    (index, sig)
                });
                page.signature_block(role, x, signatory, signature, &date);
            }
        }

        IndentForm {
            source: source_label.to_string(),
            issued_on,
            title: None,
            rows: form_rows,
            table_bottom,
            ops: page.ops,
            images,
        }
    }
}

#[derive(Default)]
struct Page {
    ops: Vec<DrawOp>,
}

impl Page {
    fn text(&mut self, text: &str, x: f64, y: f64, size: f64, font: Font, align: Align) {
        let width = text_width(text, font, size);
        let x = match align {
            Align::Left => x,
            Align::Center => x - width / 2.0,
            Align::Right => x - width,
        };
        self.ops.push(DrawOp::Text {
            x,
            y,
            size,
            font,
            text: text.to_string(),
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, width: f64, dash: Option<f64>, gray: u8) {
        self.ops.push(DrawOp::Line { x1, y1, x2, y2, width, dash, gray });
    }

    /// Draw the grid table; returns its bottom edge.
    fn table(&mut self, x0: f64, x1: f64, rows: &[FormRow]) -> f64 {
        let fixed: f64 = COLUMNS.iter().filter_map(|c| c.width).sum();
        let widths: Vec<f64> = COLUMNS
            .iter()
            .map(|c| c.width.unwrap_or(x1 - x0 - fixed))
            .collect();

        let header: Vec<String> = COLUMNS.iter().map(|c| c.header.to_string()).collect();
        let mut y = self.table_row(x0, TABLE_TOP, &widths, &header, Font::Bold, true, 0.0);

        for row in rows {
            let cells = vec![
                row.number.to_string(),
                row.description.clone(),
                row.quantity.clone(),
                String::new(),
                String::new(),
                String::new(),
            ];
            y = self.table_row(x0, y, &widths, &cells, Font::Regular, false, MIN_BODY_ROW);
        }
        y
    }

    #[allow(clippy::too_many_arguments)]
    fn table_row(
        &mut self,
        x0: f64,
        top: f64,
        widths: &[f64],
        cells: &[String],
        font: Font,
        header: bool,
        min_height: f64,
    ) -> f64 {
        let lh = line_height(TABLE_FONT);
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(widths)
            .map(|(text, w)| wrap(text, font, TABLE_FONT, w - 2.0 * CELL_PADDING))
            .collect();
        let max_lines = wrapped.iter().map(Vec::len).max().unwrap_or(1);
        let height = (max_lines as f64 * lh + 2.0 * CELL_PADDING).max(min_height);

        let mut x = x0;
        for (idx, (lines, &w)) in wrapped.iter().zip(widths).enumerate() {
            self.ops.push(DrawOp::Rect {
                x,
                y: top,
                w,
                h: height,
                width: GRID_WIDTH,
            });
            if idx == APPROVAL_COLUMN {
                self.line(x, top, x, top + height, APPROVAL_RULE_WIDTH, None, 0);
            }

            let align = if header { Align::Center } else { COLUMNS[idx].align };
            let anchor = match align {
                Align::Left => x + CELL_PADDING,
                Align::Center => x + w / 2.0,
                Align::Right => x + w - CELL_PADDING,
            };
            for (n, line) in lines.iter().enumerate().filter(|(_, l)| !l.is_empty()) {
                let baseline = top + CELL_PADDING + ascent(TABLE_FONT) + n as f64 * lh;
                self.text(line, anchor, baseline, TABLE_FONT, font, align);
            }
            x += w;
        }
        top + height
    }

    fn signature_block(
        &mut self,
        role: &str,
        x: f64,
        signatory: Option<&Signatory>,
        signature: Option<(usize, &SignatureImage)>,
        date: &str,
    ) {
        let y = SIGNATURE_Y;
        let (name, position) = signatory
            .map(|s| (s.name.as_str(), s.position.as_str()))
            .unwrap_or(("", ""));

        self.text(role, x, y, SIGNATURE_FONT, Font::Regular, Align::Left);
        if let Some((index, image)) = signature {
            let (w, h) = image.fit(SIGNATURE_MAX_WIDTH, SIGNATURE_MAX_HEIGHT);
            self.ops.push(DrawOp::Image {
                index,
                x,
                y: y + 8.5 - h,
                w,
                h,
            });
        }
        self.text("(Tandatangan)", x, y + 10.0, SIGNATURE_FONT, Font::Regular, Align::Left);
        self.text(&format!("Nama : {name}"), x, y + 13.0, SIGNATURE_FONT, Font::Regular, Align::Left);
        self.text(&format!("Jawatan : {position}"), x, y + 16.0, SIGNATURE_FONT, Font::Regular, Align::Left);
        self.text(&format!("Tarikh : {date}"), x, y + 19.0, SIGNATURE_FONT, Font::Regular, Align::Left);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::tiny_jpeg;
    use crate::models::{IndentRequest, InventoryItem};

    fn row(name: &str, pku: Option<&str>, qty: &str) -> RequestWithItem {
        let mut item = InventoryItem::new(name.to_string());
        item.pku = pku.map(String::from);
        RequestWithItem {
            request: IndentRequest::new(item.id.clone(), qty.to_string()),
            item: Some(item),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn test_rows_numbered_with_descriptions() {
        let rows = vec![
            row("Paracetamol 500mg", Some("A1"), "30"),
            row("Ibuprofen 200mg", None, ""),
            row("Cough Syrup", Some(""), "5x30's"),
        ];
        let form = FormBuilder::new().build("OPD Kaunter", &rows, day());

        let got: Vec<_> = form
            .rows()
            .iter()
            .map(|r| (r.number, r.description.as_str(), r.quantity.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (1, "Paracetamol 500mg | A1", "30"),
                (2, "Ibuprofen 200mg", "0"),
                (3, "Cough Syrup", "5x30's"),
            ]
        );
        assert_eq!(form.heading(), "BORANG PERMOHONAN STOK UBAT (OPD Kaunter)");
        assert!(!form.overflows());
    }

    #[test]
    fn test_both_copies_drawn() {
        let form = FormBuilder::new().build("IPD", &[row("X", None, "1")], day());
        let texts: Vec<&str> = form.texts().collect();

        for label in COPY_LABELS {
            assert_eq!(texts.iter().filter(|t| **t == label).count(), 1);
        }
        assert_eq!(texts.iter().filter(|t| **t == "KEW.PS-8").count(), 2);
        assert_eq!(texts.iter().filter(|t| **t == "Pegawai Pelulus").count(), 2);
        assert_eq!(texts.iter().filter(|t| **t == "Tarikh : 07/03/2025").count(), 6);
        assert_eq!(texts.iter().filter(|t| **t == "Nama : ").count(), 6);
    }

    #[test]
    fn test_cut_line() {
        let form = FormBuilder::new().build("IPD", &[], day());
        assert_eq!(
            form.ops()[0],
            DrawOp::Line {
                x1: 148.5,
                y1: 5.0,
                x2: 148.5,
                y2: 205.0,
                width: 0.2,
                dash: Some(1.0),
                gray: 150,
            }
        );
    }

    #[test]
    fn test_description_column_width_and_min_row_height() {
        let form = FormBuilder::new().build("IPD", &[row("X", None, "1")], day());
        let rects: Vec<_> = form
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect { x, w, h, .. } => Some((*x, *w, *h)),
                _ => None,
            })
            .collect();
        // header + one body row, six cells each, two copies
        assert_eq!(rects.len(), 24);
        assert!((rects[1].1 - 72.5).abs() < 1e-9);
        assert!((rects[0].0 - 5.0).abs() < 1e-9);
        assert!((rects[12].0 - 153.5).abs() < 1e-9);
        assert!((rects[6].2 - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_list_overflows() {
        let rows: Vec<_> = (0..30).map(|i| row(&format!("Item {i}"), None, "1")).collect();
        let form = FormBuilder::new().build("OPD", &rows, day());
        assert_eq!(form.rows().len(), 30);
        assert!(form.overflows());
    }

    #[test]
    fn test_signatories_prestamped() {
        let sig = SignatureImage::from_jpeg(tiny_jpeg(200, 100)).unwrap();
        let builder = FormBuilder::with_signatories(Signatories {
            requester: Some(Signatory {
                name: "Aminah".into(),
                position: "Pegawai Farmasi".into(),
                signature: Some(sig),
            }),
            receiver: Some(Signatory {
                name: "Lim".into(),
                position: "PPF".into(),
                signature: None,
            }),
        });
        let form = builder.build("OPD", &[], day());
        let texts: Vec<&str> = form.texts().collect();
        assert_eq!(texts.iter().filter(|t| **t == "Nama : Aminah").count(), 2);
        assert_eq!(texts.iter().filter(|t| **t == "Jawatan : PPF").count(), 2);
        // approving officer stays blank
        assert_eq!(texts.iter().filter(|t| **t == "Nama : ").count(), 2);

        let images: Vec<_> = form
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image { index, w, h, .. } => Some((*index, *w, *h)),
                _ => None,
            })
            .collect();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].0, 0);
        // 2:1 image limited by height
        assert!((images[0].1 - 14.0).abs() < 1e-9);
        assert!((images[0].2 - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_jpeg_parsing() {
        let img = SignatureImage::from_jpeg(tiny_jpeg(640, 480)).unwrap();
        assert_eq!((img.width_px(), img.height_px()), (640, 480));
        assert!(SignatureImage::from_jpeg(b"\x89PNG\r\n".to_vec()).is_err());
        assert!(SignatureImage::from_jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]).is_err());
    }
}
