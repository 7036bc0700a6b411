//! Cart spreadsheet export.
//!
//! One sheet per non-empty source group, written as one CSV file per sheet.

use std::io;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DocumentSink;
use crate::grouping::SourceGroups;

/// Column headers of every sheet.
pub const SHEET_HEADER: [&str; 2] = ["Drug Name", "Quantity"];

/// One sheet of the cart workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSheet {
    /// Source group key
    pub name: String,
    pub rows: Vec<CartSheetRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSheetRow {
    pub drug_name: String,
    pub quantity: String,
}

impl CartSheet {
    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str(&SHEET_HEADER.join(","));
        csv.push('\n');
        for row in &self.rows {
            csv.push_str(&format!(
                "{},{}\n",
                escape_csv(&row.drug_name),
                escape_csv(&row.quantity)
            ));
        }
        csv
    }
}

/// The whole cart as a workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartWorkbook {
    pub sheets: Vec<CartSheet>,
}

impl CartWorkbook {
    /// Build from grouped cart rows; empty groups get no sheet.
    pub fn from_groups(groups: &SourceGroups) -> Self {
        let sheets = groups
            .non_empty()
            .map(|group| CartSheet {
                name: group.key.to_string(),
                rows: group
                    .rows
                    .iter()
                    .map(|r| CartSheetRow {
                        drug_name: r.item_name().to_string(),
                        quantity: if r.request.requested_qty.is_empty() {
                            "0".to_string()
                        } else {
                            r.request.requested_qty.clone()
                        },
                    })
                    .collect(),
            })
            .collect();
        Self { sheets }
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// `(file name, contents)` per sheet, named `<prefix>_<date>_<sheet>.csv`.
    pub fn to_csv_files(&self, prefix: &str, date: NaiveDate) -> Vec<(String, String)> {
        self.sheets
            .iter()
            .map(|sheet| {
                let name = format!("{}_{}_{}.csv", prefix, date.format("%Y-%m-%d"), sheet.name);
                (name, sheet.to_csv())
            })
            .collect()
    }

    /// Save every sheet through `sink`; returns the number of files written.
    pub fn save<K: DocumentSink + ?Sized>(
        &self,
        sink: &K,
        prefix: &str,
        date: NaiveDate,
    ) -> io::Result<usize> {
        let files = self.to_csv_files(prefix, date);
        for (name, contents) in &files {
            sink.save_file(name, contents.as_bytes()).map_err(|e| {
                tracing::error!(file = %name, error = %e, "Failed to export to Excel");
                e
            })?;
        }
        tracing::info!(sheets = files.len(), "cart workbook exported");
        Ok(files.len())
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::{group_by_source, GroupingRule};
    use crate::models::{IndentRequest, InventoryItem, RequestWithItem};

    fn row(name: &str, source: &str, qty: &str) -> RequestWithItem {
        let mut item = InventoryItem::new(name.to_string());
        item.indent_source = Some(source.to_string());
        RequestWithItem {
            request: IndentRequest::new(item.id.clone(), qty.to_string()),
            item: Some(item),
        }
    }

    #[test]
    fn test_one_sheet_per_non_empty_group() {
        let groups = group_by_source(
            vec![row("Zinc", "OPD Kaunter", "10"), row("Amoxicillin, 250mg", "OPD Kaunter", "")],
            &GroupingRule::legacy_departments(),
            true,
        );
        let workbook = CartWorkbook::from_groups(&groups);

        assert_eq!(workbook.sheets.len(), 1);
        assert_eq!(workbook.sheets[0].name, "OPD");
        assert_eq!(
            workbook.sheets[0].to_csv(),
            "Drug Name,Quantity\n\"Amoxicillin, 250mg\",0\nZinc,10\n"
        );

        let files = workbook.to_csv_files("Indent_Cart", NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(files[0].0, "Indent_Cart_2025-01-02_OPD.csv");
    }

    #[test]
    fn test_missing_item_has_blank_name() {
        let groups = SourceGroups::from_groups(vec![crate::grouping::SourceGroup {
            key: "OPD".into(),
            rows: vec![RequestWithItem {
                request: IndentRequest::new("gone".into(), "5x30's".into()),
                item: None,
            }],
        }]);
        let csv = CartWorkbook::from_groups(&groups).sheets[0].to_csv();
        assert_eq!(csv, "Drug Name,Quantity\n,5x30's\n");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }
}
