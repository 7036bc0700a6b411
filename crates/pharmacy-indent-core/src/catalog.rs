//! Inventory browsing: search, filters, orderings and the short-expiry report.
//!
//! Everything here works on already-loaded items; nothing touches the store.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::grouping::collation_key;
use crate::models::InventoryItem;
use crate::quantity::parse_leading_int;

/// Category order on the locator page. Unlisted categories follow.
pub const LOCATOR_CATEGORY_ORDER: &[&str] = &[
    "OPD",
    "Eye/Ear/Nose/Inh",
    "DDA",
    "External",
    "Injection",
    "Syrup",
    "Others",
    "UOD",
];

/// Minimum similarity for a "did you mean" suggestion.
const MIN_SUGGESTION_SCORE: f64 = 0.75;

/// Filters applied to an inventory list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    /// Case-insensitive substring over name, codes, row, category and remarks
    pub text: Option<String>,
    pub section: Option<String>,
    pub indent_source: Option<String>,
}

impl CatalogQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, item: &InventoryItem) -> bool {
        if let Some(section) = self.section.as_deref() {
            if item.section.as_deref() != Some(section) {
                return false;
            }
        }
        if let Some(source) = self.indent_source.as_deref() {
            if item.indent_source.as_deref() != Some(source) {
                return false;
            }
        }
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => matches_text(item, &text.to_lowercase()),
            _ => true,
        }
    }
}

fn matches_text(item: &InventoryItem, needle: &str) -> bool {
    let fields = [
        Some(item.name.as_str()),
        item.item_code.as_deref(),
        item.pku.as_deref(),
        item.row.as_deref(),
        item.category.as_deref(),
        item.remarks.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|f| f.to_lowercase().contains(needle))
}

/// Items matching `query`, in their current order.
pub fn filter_items<'a>(items: &'a [InventoryItem], query: &CatalogQuery) -> Vec<&'a InventoryItem> {
    items.iter().filter(|i| query.matches(i)).collect()
}

/// Locator order: listed categories first in list order, then the rest by
/// category; name within a category.
pub fn sort_for_locator(items: &mut [InventoryItem]) {
    items.sort_by_cached_key(|item| {
        let category = item.category.clone().unwrap_or_default();
        let rank = LOCATOR_CATEGORY_ORDER
            .iter()
            .position(|c| *c == category)
            .unwrap_or(LOCATOR_CATEGORY_ORDER.len());
        let unlisted = if rank == LOCATOR_CATEGORY_ORDER.len() {
            collation_key(&category)
        } else {
            String::new()
        };
        (rank, unlisted, collation_key(&item.name))
    });
}

/// Shelf position used by the indent page ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ShelfKey {
    section_letters: String,
    section_number: i64,
    row_number: i64,
    bin_prefix: String,
    bin_number: i64,
}

impl ShelfKey {
    fn of(item: &InventoryItem) -> Option<Self> {
        let section = item.section.as_deref().filter(|s| !s.is_empty())?;
        let row = item.row.as_deref().filter(|s| !s.is_empty())?;
        let bin = item.bin.as_deref().filter(|s| !s.is_empty())?;
        Some(Self {
            section_letters: non_digits(section),
            section_number: digits_value(section),
            row_number: parse_leading_int(&row.replace(|c: char| c.is_ascii_alphabetic(), "")),
            bin_prefix: non_digits(bin),
            bin_number: digits_value(bin),
        })
    }
}

fn non_digits(s: &str) -> String {
    s.chars().filter(|c| !c.is_ascii_digit()).collect()
}

fn digits_value(s: &str) -> i64 {
    parse_leading_int(&s.chars().filter(char::is_ascii_digit).collect::<String>())
}

/// Natural shelf order: section letters, section number, row number, bin
/// prefix, bin number (so M2 sorts before M10). Items missing any
/// coordinate go last in their original order.
pub fn sort_by_shelf(items: &mut [InventoryItem]) {
    items.sort_by(|a, b| match (ShelfKey::of(a), ShelfKey::of(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Distinct non-empty sections, sorted.
pub fn distinct_sections(items: &[InventoryItem]) -> Vec<String> {
    distinct(items.iter().filter_map(|i| i.section.as_deref()))
}

/// Distinct non-empty indent sources, sorted.
pub fn distinct_sources(items: &[InventoryItem]) -> Vec<String> {
    distinct(items.iter().filter_map(|i| i.indent_source.as_deref()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.trim().is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One line of the short-expiry report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortExpiryEntry {
    pub item: InventoryItem,
    pub expires_on: NaiveDate,
    /// Negative once expired
    pub days_left: i64,
}

/// Flagged items with an expiry date, soonest first.
pub fn short_expiry_report(items: &[InventoryItem], today: NaiveDate) -> Vec<ShortExpiryEntry> {
    let mut entries: Vec<ShortExpiryEntry> = items
        .iter()
        .filter(|i| i.is_short_exp)
        .filter_map(|i| {
            i.short_exp.map(|expires_on| ShortExpiryEntry {
                item: i.clone(),
                expires_on,
                days_left: (expires_on - today).num_days(),
            })
        })
        .collect();
    entries.sort_by_key(|e| e.expires_on);
    entries
}

/// A near match for a search that found nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub item_id: String,
    pub name: String,
    pub score: f64,
}

/// Items whose names look like `query`, best first.
pub fn suggest(items: &[InventoryItem], query: &str, limit: usize) -> Vec<Suggestion> {
    let needle = collation_key(query.trim());
    if needle.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<Suggestion> = items
        .iter()
        .map(|item| {
            let name = collation_key(&item.name);
            // Compare against the name's leading words too, so "amlo" finds
            // "Amlodipine 5mg Tablet".
            let head: String = name.chars().take(needle.chars().count()).collect();
            let score = jaro_winkler(&needle, &name)
                .max(normalized_levenshtein(&needle, &head));
            Suggestion {
                item_id: item.id.clone(),
                name: item.name.clone(),
                score,
            }
        })
        .filter(|s| s.score >= MIN_SUGGESTION_SCORE)
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    scored
}
