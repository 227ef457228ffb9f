//! Extracted record model.
//!
//! A [`Record`] is a flat map of scalar fields plus named repeating sections
//! (each section entry is itself a `Record`). Every scalar carries a
//! [`ValueSource`] so a value read off the page stays distinguishable from
//! one the engine derived or defaulted — the provenance is in-memory only
//! and never serialised; JSON output shows plain strings.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

// ── Field values ─────────────────────────────────────────────────────────

/// Where a field value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Read directly from the reconstructed table.
    Extracted,
    /// Computed by the engine (an average, a renumbered key).
    Derived,
    /// Substituted by a categorical default rule after reconciliation.
    Defaulted,
    /// Never found; the text is empty.
    Missing,
}

/// A scalar field value with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub text: String,
    pub source: ValueSource,
}

impl FieldValue {
    pub fn extracted(text: impl Into<String>) -> Self {
        Self { text: text.into(), source: ValueSource::Extracted }
    }

    pub fn derived(text: impl Into<String>) -> Self {
        Self { text: text.into(), source: ValueSource::Derived }
    }

    pub fn defaulted(text: impl Into<String>) -> Self {
        Self { text: text.into(), source: ValueSource::Defaulted }
    }

    pub fn missing() -> Self {
        Self { text: String::new(), source: ValueSource::Missing }
    }

    /// Empty after trimming. A whitespace-only OCR cell counts as empty.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::missing()
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

// ── Records ──────────────────────────────────────────────────────────────

/// One extracted record: scalars plus named repeating sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    scalars: BTreeMap<String, FieldValue>,
    sections: BTreeMap<String, Vec<Record>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.scalars.get(field)
    }

    /// The trimmed text of a scalar, `""` when absent.
    pub fn text(&self, field: &str) -> &str {
        self.scalars.get(field).map(|v| v.text.trim()).unwrap_or("")
    }

    pub fn is_field_empty(&self, field: &str) -> bool {
        self.scalars.get(field).map(|v| v.is_empty()).unwrap_or(true)
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.scalars.insert(field.into(), value);
    }

    pub fn scalars(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.scalars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn section(&self, name: &str) -> &[Record] {
        self.sections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn section_mut(&mut self, name: &str) -> &mut Vec<Record> {
        self.sections.entry(name.to_string()).or_default()
    }

    pub fn set_section(&mut self, name: impl Into<String>, entries: Vec<Record>) {
        self.sections.insert(name.into(), entries);
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// True when every scalar is empty and every section has no entries.
    pub fn is_empty(&self) -> bool {
        self.scalars.values().all(FieldValue::is_empty)
            && self.sections.values().all(Vec::is_empty)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.scalars.len() + self.sections.len()))?;
        for (k, v) in &self.scalars {
            map.serialize_entry(k, &v.text)?;
        }
        for (k, v) in &self.sections {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ── Breakdown trees ──────────────────────────────────────────────────────

/// A flat breakdown row before tree folding.
#[derive(Debug, Clone)]
pub struct BreakdownRow {
    pub name: String,
    /// Outline level derived from the row numbering; `None` when the
    /// numbering matched no known shape.
    pub level: Option<u8>,
    pub amounts: BTreeMap<String, String>,
}

/// A node of the hierarchical financial breakdown.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BreakdownNode {
    pub name: String,
    pub level: u8,
    #[serde(flatten)]
    pub amounts: BTreeMap<String, String>,
    pub items: Vec<BreakdownNode>,
}

/// Fold flat rows into a tree by outline level. A row nests under the most
/// recent row with a smaller level; level-0 total rows stay at the root and
/// take no children. Rows with no recognisable level become siblings of the
/// previous row.
pub fn fold_breakdown(rows: Vec<BreakdownRow>) -> Vec<BreakdownNode> {
    let mut roots: Vec<BreakdownNode> = Vec::new();
    let mut last_level: u8 = 1;
    for row in rows {
        let level = row.level.unwrap_or(last_level);
        last_level = level;
        let node = BreakdownNode {
            name: row.name,
            level,
            amounts: row.amounts,
            items: Vec::new(),
        };
        attach(&mut roots, node);
    }
    roots
}

fn attach(list: &mut Vec<BreakdownNode>, node: BreakdownNode) {
    if let Some(last) = list.last_mut() {
        if last.level != 0 && last.level < node.level {
            attach(&mut last.items, node);
            return;
        }
    }
    list.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, level: Option<u8>) -> BreakdownRow {
        BreakdownRow { name: name.into(), level, amounts: BTreeMap::new() }
    }

    #[test]
    fn record_serialises_to_plain_strings() {
        let mut rec = Record::new();
        rec.set("project", FieldValue::extracted("变电站扩建"));
        rec.set("weather", FieldValue::defaulted("晴"));
        let mut entry = Record::new();
        entry.set("code", FieldValue::extracted("N1"));
        rec.set_section("noise", vec![entry]);

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["project"], "变电站扩建");
        assert_eq!(json["weather"], "晴");
        assert_eq!(json["noise"][0]["code"], "N1");
    }

    #[test]
    fn provenance_survives_in_memory() {
        let mut rec = Record::new();
        rec.set("weather", FieldValue::defaulted("晴"));
        assert_eq!(rec.get("weather").unwrap().source, ValueSource::Defaulted);
    }

    #[test]
    fn empty_record_detection() {
        let mut rec = Record::new();
        assert!(rec.is_empty());
        rec.set("a", FieldValue::missing());
        assert!(rec.is_empty());
        rec.set("a", FieldValue::extracted("x"));
        assert!(!rec.is_empty());
    }

    #[test]
    fn fold_nests_by_level() {
        let tree = fold_breakdown(vec![
            row("主网工程", Some(1)),
            row("线路工程", Some(2)),
            row("土建", Some(3)),
            row("安装", Some(3)),
            row("变电工程", Some(2)),
            row("其他费用", Some(1)),
        ]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].items.len(), 2);
        assert_eq!(tree[0].items[0].items.len(), 2);
        assert_eq!(tree[0].items[1].name, "变电工程");
    }

    #[test]
    fn total_row_stays_at_root_without_children() {
        let tree = fold_breakdown(vec![
            row("合计", Some(0)),
            row("主网工程", Some(1)),
            row("线路工程", Some(2)),
        ]);
        assert_eq!(tree.len(), 2);
        assert!(tree[0].items.is_empty());
        assert_eq!(tree[1].items.len(), 1);
    }

    #[test]
    fn unknown_level_becomes_sibling_of_previous() {
        let tree = fold_breakdown(vec![
            row("主网工程", Some(1)),
            row("线路工程", Some(2)),
            row("未编号行", None),
        ]);
        assert_eq!(tree[0].items.len(), 2);
        assert_eq!(tree[0].items[1].name, "未编号行");
    }
}
