//! Minimal PDF 1.4 writer for a laid-out form.
//!
//! One page, the three base-14 Helvetica faces with WinAnsi encoding, and
//! DCT (JPEG) image XObjects. Content streams are left uncompressed.

use std::io::Write;

use super::layout::{DrawOp, IndentForm, PAGE_HEIGHT, PAGE_WIDTH};
use super::metrics::{Font, MM_PER_PT};
use super::FormResult;

/// Convert millimetres to points.
fn pt(mm: f64) -> f64 {
    mm / MM_PER_PT
}

/// Page-space y (points from the bottom) of a y measured in mm from the top.
fn flip(y_mm: f64) -> f64 {
    pt(PAGE_HEIGHT - y_mm)
}

impl IndentForm {
    /// Render as a PDF document.
    pub fn to_pdf(&self) -> FormResult<Vec<u8>> {
        let mut doc = PdfDocument::default();
        let content = self.content_stream()?;

        // Fixed object numbers: 1 catalog, 2 pages, 3 page, 4 content,
        // 5..=7 fonts, then images, then info.
        let first_image = 8;
        let info_id = first_image + self.images().len();

        doc.object(1, b"<< /Type /Catalog /Pages 2 0 R >>")?;
        doc.object(2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>")?;

        let mut resources = String::from("<< /Font <<");
        for (n, font) in Font::ALL.iter().enumerate() {
            resources.push_str(&format!(" /{} {} 0 R", font.resource(), 5 + n));
        }
        resources.push_str(" >>");
        if !self.images().is_empty() {
            resources.push_str(" /XObject <<");
            for n in 0..self.images().len() {
                resources.push_str(&format!(" /Im{} {} 0 R", n + 1, first_image + n));
            }
            resources.push_str(" >>");
        }
        resources.push_str(" >>");

        let page = format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources {} /Contents 4 0 R >>",
            fmt_num(pt(PAGE_WIDTH)),
            fmt_num(pt(PAGE_HEIGHT)),
            resources
        );
        doc.object(3, page.as_bytes())?;
        doc.stream(4, "", &content)?;

        for (n, font) in Font::ALL.iter().enumerate() {
            let dict = format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                font.base_font()
            );
            doc.object(5 + n, dict.as_bytes())?;
        }

        for (n, image) in self.images().iter().enumerate() {
            let color_space = match image.components {
                1 => "/DeviceGray",
                4 => "/DeviceCMYK",
                _ => "/DeviceRGB",
            };
            let dict = format!(
                "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Filter /DCTDecode",
                image.width_px, image.height_px, color_space
            );
            doc.stream(first_image + n, &dict, &image.data)?;
        }

        let title = self.title().map(|t| t.to_string()).unwrap_or_else(|| self.heading());
        let mut info = b"<< /Title ".to_vec();
        info.extend_from_slice(&pdf_string(&title));
        info.extend_from_slice(b" /Producer (pharmacy-indent-core) >>");
        doc.object(info_id, &info)?;

        doc.finish(info_id)
    }

    fn content_stream(&self) -> FormResult<Vec<u8>> {
        let mut out = Vec::new();
        for op in self.ops() {
            match op {
                DrawOp::Text { x, y, size, font, text } => {
                    write!(
                        out,
                        "BT 0 g /{} {} Tf {} {} Td ",
                        font.resource(),
                        fmt_num(*size),
                        fmt_num(pt(*x)),
                        fmt_num(flip(*y))
                    )?;
                    out.extend_from_slice(&pdf_string(text));
                    out.extend_from_slice(b" Tj ET\n");
                }
                DrawOp::Line { x1, y1, x2, y2, width, dash, gray } => {
                    let dash = match dash {
                        Some(d) => format!("[{} {}] 0 d", fmt_num(pt(*d)), fmt_num(pt(*d))),
                        None => "[] 0 d".to_string(),
                    };
                    writeln!(
                        out,
                        "q {} w {} {} G {} {} m {} {} l S Q",
                        fmt_num(pt(*width)),
                        dash,
                        fmt_num(*gray as f64 / 255.0),
                        fmt_num(pt(*x1)),
                        fmt_num(flip(*y1)),
                        fmt_num(pt(*x2)),
                        fmt_num(flip(*y2))
                    )?;
                }
                DrawOp::Rect { x, y, w, h, width } => {
                    writeln!(
                        out,
                        "q {} w 0 G {} {} {} {} re S Q",
                        fmt_num(pt(*width)),
                        fmt_num(pt(*x)),
                        fmt_num(flip(y + h)),
                        fmt_num(pt(*w)),
                        fmt_num(pt(*h))
                    )?;
                }
                DrawOp::Image { index, x, y, w, h } => {
                    writeln!(
                        out,
                        "q {} 0 0 {} {} {} cm /Im{} Do Q",
                        fmt_num(pt(*w)),
                        fmt_num(pt(*h)),
                        fmt_num(pt(*x)),
                        fmt_num(flip(y + h)),
                        index + 1
                    )?;
                }
            }
        }
        Ok(out)
    }
}

#[derive(Default)]
struct PdfDocument {
    buf: Vec<u8>,
    /// Byte offset of each object, indexed by object number - 1
    offsets: Vec<usize>,
}

impl PdfDocument {
    fn start_object(&mut self, id: usize) -> FormResult<()> {
        if self.buf.is_empty() {
            self.buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        }
        if self.offsets.len() < id {
            self.offsets.resize(id, 0);
        }
        self.offsets[id - 1] = self.buf.len();
        writeln!(self.buf, "{id} 0 obj")?;
        Ok(())
    }

    fn object(&mut self, id: usize, body: &[u8]) -> FormResult<()> {
        self.start_object(id)?;
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
        Ok(())
    }

    /// Stream object; `dict` holds extra entries besides `/Length`.
    fn stream(&mut self, id: usize, dict: &str, data: &[u8]) -> FormResult<()> {
        self.start_object(id)?;
        write!(self.buf, "<< {} /Length {} >>\nstream\n", dict, data.len())?;
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        Ok(())
    }

    fn finish(mut self, info_id: usize) -> FormResult<Vec<u8>> {
        let xref = self.buf.len();
        let size = self.offsets.len() + 1;
        write!(self.buf, "xref\n0 {size}\n0000000000 65535 f \n")?;
        for offset in &self.offsets {
            write!(self.buf, "{offset:010} 00000 n \n")?;
        }
        write!(
            self.buf,
            "trailer\n<< /Size {size} /Root 1 0 R /Info {info_id} 0 R >>\nstartxref\n{xref}\n%%EOF\n"
        )?;
        Ok(self.buf)
    }
}

/// Format a number compactly with at most three decimals.
fn fmt_num(v: f64) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Literal string in WinAnsi encoding with delimiters escaped.
fn pdf_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 2);
    out.push(b'(');
    for c in text.chars() {
        match winansi(c) {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(winansi(c));
            }
            byte => out.push(byte),
        }
    }
    out.push(b')');
    out
}

fn winansi(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        '„' => 0x84,
        '…' => 0x85,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '™' => 0x99,
        '\t' | '\n' | '\r' => b' ',
        _ => b'?',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{tiny_jpeg, FormBuilder, Signatories, Signatory, SignatureImage};
    use crate::models::{IndentRequest, InventoryItem, RequestWithItem};
    use chrono::NaiveDate;

    fn sample_rows() -> Vec<RequestWithItem> {
        ["Paracetamol (500mg)", "Ibuprofen"]
            .iter()
            .map(|name| {
                let item = InventoryItem::new(name.to_string());
                RequestWithItem {
                    request: IndentRequest::new(item.id.clone(), "10".into()),
                    item: Some(item),
                }
            })
            .collect()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_pdf_structure() {
        let mut form = FormBuilder::new().build(
            "OPD",
            &sample_rows(),
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        );
        form.set_title("OPD_Indent_OPD_2025-01-02.pdf");
        let pdf = form.to_pdf().unwrap();

        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(pdf.ends_with(b"%%EOF\n"));
        assert!(contains(&pdf, b"/Count 1"));
        assert!(contains(&pdf, b"/BaseFont /Helvetica-Bold"));
        assert!(contains(&pdf, b"/BaseFont /Helvetica-Oblique"));
        assert!(contains(&pdf, b"(Paracetamol \\(500mg\\)) Tj"));
        assert!(contains(&pdf, b"/Title (OPD_Indent_OPD_2025-01-02.pdf)"));
        assert!(contains(&pdf, b"[2.835 2.835] 0 d"));
        assert!(!contains(&pdf, b"/XObject"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let form = FormBuilder::new().build("IPD", &[], NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        let pdf = form.to_pdf().unwrap();
        let text = String::from_utf8_lossy(&pdf);

        let startxref: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .and_then(|n| n.parse().ok())
            .unwrap();
        assert!(pdf[startxref..].starts_with(b"xref\n0 9\n"));

        let table = String::from_utf8_lossy(&pdf[startxref..]);
        let entries: Vec<usize> = table
            .lines()
            .skip(3)
            .take(8)
            .map(|l| l[..10].parse().unwrap())
            .collect();
        for (n, offset) in entries.iter().enumerate() {
            let expected = format!("{} 0 obj", n + 1);
            assert!(pdf[*offset..].starts_with(expected.as_bytes()));
        }
    }

    #[test]
    fn test_signature_image_embedded() {
        let builder = FormBuilder::with_signatories(Signatories {
            requester: Some(Signatory {
                name: "Aminah".into(),
                position: "PF".into(),
                signature: Some(SignatureImage::from_jpeg(tiny_jpeg(40, 20)).unwrap()),
            }),
            receiver: None,
        });
        let pdf = builder
            .build("OPD", &[], NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
            .to_pdf()
            .unwrap();
        assert!(contains(&pdf, b"/XObject << /Im1 8 0 R >>"));
        assert!(contains(&pdf, b"/Filter /DCTDecode"));
        assert!(contains(&pdf, b"/ColorSpace /DeviceGray"));
        assert!(contains(&pdf, b"/Im1 Do"));
    }

    #[test]
    fn test_text_encoding() {
        assert_eq!(pdf_string("a(b)\\"), b"(a\\(b\\)\\\\)".to_vec());
        assert_eq!(pdf_string("café"), b"(caf\xE9)".to_vec());
        assert_eq!(pdf_string("–"), b"(\x96)".to_vec());
        assert_eq!(pdf_string("日"), b"(?)".to_vec());
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(841.8897), "841.89");
        assert_eq!(fmt_num(12.0), "12");
        assert_eq!(fmt_num(-0.0001), "0");
        assert_eq!(fmt_num(0.5), "0.5");
    }
}
