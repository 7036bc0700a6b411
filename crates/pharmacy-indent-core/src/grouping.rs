//! Grouping of indent requests by source.
//!
//! Feeds both the collapsible cart display and the per-source export loop.
//! Buckets keep first-seen order (pre-seeded buckets first), and rows inside a
//! bucket keep fetch order unless name sorting is enabled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::RequestWithItem;

/// Key of a source bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceKey(pub String);

impl SourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How a request's item source maps to a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum GroupingRule {
    /// Fixed top-level buckets, always present even when empty.
    ///
    /// The bucket is picked from the first word of the source
    /// (`"IPD Substor"` goes to `IPD`), after applying `aliases`.
    Seeded {
        buckets: Vec<SourceKey>,
        /// First-word aliases, e.g. `MNF` -> `MFG`
        aliases: Vec<(String, SourceKey)>,
        fallback: SourceKey,
    },
    /// One bucket per literal source string.
    Literal { fallback: SourceKey },
}

impl Default for GroupingRule {
    fn default() -> Self {
        GroupingRule::Literal {
            fallback: SourceKey::from("OPD"),
        }
    }
}

impl GroupingRule {
    /// The IPD / OPD / MFG bucketing of the first schema revision.
    pub fn legacy_departments() -> Self {
        GroupingRule::Seeded {
            buckets: vec!["IPD".into(), "OPD".into(), "MFG".into()],
            aliases: vec![("MNF".to_string(), "MFG".into())],
            fallback: "OPD".into(),
        }
    }

    /// Resolve the bucket for an item source.
    pub fn bucket_for(&self, source: Option<&str>) -> SourceKey {
        let source = source.map(str::trim).filter(|s| !s.is_empty());
        match self {
            GroupingRule::Literal { fallback } => source
                .map(SourceKey::from)
                .unwrap_or_else(|| fallback.clone()),
            GroupingRule::Seeded {
                buckets,
                aliases,
                fallback,
            } => {
                let Some(source) = source else {
                    return fallback.clone();
                };
                let head = source
                    .split_whitespace()
                    .next()
                    .unwrap_or(source)
                    .to_uppercase();

                let resolved = aliases
                    .iter()
                    .find(|(alias, _)| alias.eq_ignore_ascii_case(&head))
                    .map(|(_, key)| key.clone())
                    .unwrap_or(SourceKey(head));

                if buckets.contains(&resolved) {
                    resolved
                } else {
                    fallback.clone()
                }
            }
        }
    }

    fn seeded_buckets(&self) -> &[SourceKey] {
        match self {
            GroupingRule::Seeded { buckets, .. } => buckets,
            GroupingRule::Literal { .. } => &[],
        }
    }
}

/// One bucket of requests.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceGroup {
    pub key: SourceKey,
    pub rows: Vec<RequestWithItem>,
}

impl SourceGroup {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Ordered collection of source buckets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceGroups {
    groups: Vec<SourceGroup>,
}

impl SourceGroups {
    /// Build from explicit groups, keeping their order.
    pub fn from_groups(groups: Vec<SourceGroup>) -> Self {
        Self { groups }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceGroup> {
        self.groups.iter()
    }

    /// Buckets with at least one row.
    pub fn non_empty(&self) -> impl Iterator<Item = &SourceGroup> {
        self.groups.iter().filter(|g| !g.is_empty())
    }

    pub fn get(&self, key: &SourceKey) -> Option<&SourceGroup> {
        self.groups.iter().find(|g| &g.key == key)
    }

    pub fn keys(&self) -> Vec<SourceKey> {
        self.groups.iter().map(|g| g.key.clone()).collect()
    }

    /// Total rows across all buckets.
    pub fn total_rows(&self) -> usize {
        self.groups.iter().map(SourceGroup::len).sum()
    }

    fn bucket_mut(&mut self, key: SourceKey) -> &mut SourceGroup {
        let idx = match self.groups.iter().position(|g| g.key == key) {
            Some(idx) => idx,
            None => {
                self.groups.push(SourceGroup {
                    key,
                    rows: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        &mut self.groups[idx]
    }
}

/// Partition requests into source buckets.
pub fn group_by_source(
    requests: Vec<RequestWithItem>,
    rule: &GroupingRule,
    sort_by_name: bool,
) -> SourceGroups {
    let mut groups = SourceGroups::default();
    for key in rule.seeded_buckets() {
        groups.bucket_mut(key.clone());
    }

    for request in requests {
        let key = rule.bucket_for(request.indent_source());
        groups.bucket_mut(key).rows.push(request);
    }

    if sort_by_name {
        for group in &mut groups.groups {
            // sort_by_cached_key is stable; equal names keep fetch order
            group.rows.sort_by_cached_key(|r| collation_key(r.item_name()));
        }
    }

    groups
}

/// Case- and accent-insensitive sort key for item names.
///
/// Approximates a base-strength locale comparison for Latin script: letters
/// are lowercased, diacritics dropped and ligatures expanded (`ß` → `ss`,
/// `æ` → `ae`). Punctuation and other scripts still compare by code point,
/// so `-` sorts before `_`, unlike a full locale collation.
pub fn collation_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match fold_ligature(c) {
            Some(expanded) => key.push_str(expanded),
            None => key.push(fold_accent(c)),
        }
    }
    key
}

fn fold_ligature(c: char) -> Option<&'static str> {
    match c {
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'þ' => Some("th"),
        'ĳ' => Some("ij"),
        _ => None,
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ð' | 'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ğ' | 'ģ' => 'g',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => 'i',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ŕ' | 'ř' => 'r',
        'ś' | 'ş' | 'š' | 'ș' => 's',
        'ţ' | 'ť' | 'ț' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndentRequest, InventoryItem};
    use proptest::prelude::*;

    fn row(name: &str, source: Option<&str>) -> RequestWithItem {
        let mut item = InventoryItem::new(name.to_string());
        item.indent_source = source.map(String::from);
        RequestWithItem {
            request: IndentRequest::new(item.id.clone(), "1".into()),
            item: Some(item),
        }
    }

    fn names(group: &SourceGroup) -> Vec<&str> {
        group.rows.iter().map(|r| r.item_name()).collect()
    }

    #[test]
    fn test_literal_grouping_with_fallback() {
        let rows = vec![
            row("b", Some("OPD Kaunter")),
            row("a", None),
            row("c", Some("IPD Substor")),
            row("d", Some("  ")),
        ];
        let groups = group_by_source(rows, &GroupingRule::default(), false);

        assert_eq!(
            groups.keys(),
            vec![
                SourceKey::from("OPD Kaunter"),
                SourceKey::from("OPD"),
                SourceKey::from("IPD Substor")
            ]
        );
        assert_eq!(names(groups.get(&"OPD".into()).unwrap()), vec!["a", "d"]);
    }

    #[test]
    fn test_seeded_buckets_render_when_empty() {
        let rows = vec![row("x", Some("MNF Eksternal")), row("y", Some("Prepacking"))];
        let groups = group_by_source(rows, &GroupingRule::legacy_departments(), true);

        assert_eq!(
            groups.keys(),
            vec![SourceKey::from("IPD"), SourceKey::from("OPD"), SourceKey::from("MFG")]
        );
        assert!(groups.get(&"IPD".into()).unwrap().is_empty());
        assert_eq!(names(groups.get(&"MFG".into()).unwrap()), vec!["x"]);
        assert_eq!(names(groups.get(&"OPD".into()).unwrap()), vec!["y"]);
    }

    #[test]
    fn test_sorting_is_case_and_accent_insensitive() {
        let rows = vec![
            row("zinc", Some("S")),
            row("Écran", Some("S")),
            row("amlodipine", Some("S")),
            row("Bisoprolol", Some("S")),
        ];
        let groups = group_by_source(rows, &GroupingRule::default(), true);
        assert_eq!(
            names(groups.get(&"S".into()).unwrap()),
            vec!["amlodipine", "Bisoprolol", "Écran", "zinc"]
        );
    }

    #[test]
    fn test_collation_folds_ligatures() {
        assert_eq!(collation_key("Straße"), collation_key("STRASSE"));
        assert_eq!(collation_key("Æther"), "aether");
        assert_eq!(collation_key("Œstrogen"), "oestrogen");
        assert_eq!(collation_key("Łódź"), "lodz");
        assert!(collation_key("Cæsium") < collation_key("Cafe"));
    }

    #[test]
    fn test_equal_names_keep_fetch_order() {
        let first = row("Aspirin", Some("S"));
        let second = row("aspirin", Some("S"));
        let ids = vec![first.request.id.clone(), second.request.id.clone()];
        let groups = group_by_source(vec![first, second], &GroupingRule::default(), true);
        let got: Vec<_> = groups.get(&"S".into()).unwrap().rows.iter().map(|r| r.request.id.clone()).collect();
        assert_eq!(got, ids);
    }

    proptest! {
        #[test]
        fn prop_total_deterministic_partition(
            entries in proptest::collection::vec(("[a-zA-Z]{1,8}", proptest::option::of("(OPD|IPD|MNF) [A-Z][a-z]{2,6}")), 0..40)
        ) {
            let rows: Vec<_> = entries.iter().map(|(n, s)| row(n, s.as_deref())).collect();
            let rule = GroupingRule::legacy_departments();

            let first = group_by_source(rows.clone(), &rule, true);
            let second = group_by_source(rows.clone(), &rule, true);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.total_rows(), rows.len());

            for original in &rows {
                let hits = first
                    .iter()
                    .filter(|g| g.rows.iter().any(|r| r.request.id == original.request.id))
                    .count();
                prop_assert_eq!(hits, 1);
                let expected = rule.bucket_for(original.indent_source());
                prop_assert!(first.get(&expected).unwrap().rows.iter().any(|r| r.request.id == original.request.id));
            }
        }
    }
}
