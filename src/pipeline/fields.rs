//! Stage 4: Field extraction — schema-directed values out of merged tables.
//!
//! Three strategies cover every form template seen so far:
//!
//! * **Label-adjacent** scalars: find the cell carrying the label keyword,
//!   take the next non-empty cell on the row — unless that cell is itself
//!   another field's label, in which case the value is parsed out of the
//!   combined `label: value` cell (the value ends at the next recognised
//!   label token).
//! * **Column-positional** rows: map header keywords to column indices,
//!   fall back to the schema's fixed default columns, then walk the data
//!   rows gated by a record-identifier pattern on the key column.
//! * **Derived** values: computed from the row's other fields when the
//!   explicit cell is blank (averages, outline levels).
//!
//! Header mapping claims columns left-to-right in schema field order, so a
//! keyword that appears twice (a day/night pair of `检测时间` columns)
//! resolves deterministically. When the header row leaves fields unmapped
//! and the following row carries their keywords, the remainder is mapped
//! from that second row and data starts one row later.
//!
//! Nothing in this stage raises: a missing label, a short row, a garbled
//! number all degrade to empty values with a `tracing` event.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::record::{FieldValue, Record};
use crate::schema::{
    Derivation, DocumentSchema, FieldSpec, RowsSpec, SectionSchema, SectionSource, Strategy,
    TextSpec, ValueCheck,
};
use crate::text;

use super::classify::ClassifiedTable;

/// Extract one record from the merged tables according to `schema`.
pub fn extract_record(tables: &[ClassifiedTable], schema: &DocumentSchema) -> Record {
    let mut record = Record::new();

    let boundaries = label_vocabulary(schema);
    for field in &schema.scalars {
        let value = extract_scalar(tables, field, &boundaries);
        if value.is_empty() {
            debug!(field = %field.name, "scalar label not found");
        }
        record.set(field.name.clone(), value);
    }

    for section in &schema.sections {
        let entries = match &section.source {
            SectionSource::Rows(rows) => extract_rows_section(tables, section, rows),
            SectionSource::LabeledText(spec) => extract_text_section(tables, section, spec),
        };
        debug!(section = %section.name, entries = entries.len(), "section extracted");
        record.set_section(section.name.clone(), entries);
    }

    record
}

/// Every label token that can terminate a combined-cell value: all scalar
/// keywords plus the free-text section anchors.
fn label_vocabulary(schema: &DocumentSchema) -> Vec<String> {
    let mut vocab: Vec<String> = schema.scalar_keywords().map(str::to_string).collect();
    for section in &schema.sections {
        if let SectionSource::LabeledText(spec) = &section.source {
            vocab.extend(spec.anchors.iter().cloned());
        }
    }
    vocab
}

// ── Label-adjacent scalars ───────────────────────────────────────────────

fn extract_scalar(
    tables: &[ClassifiedTable],
    field: &FieldSpec,
    boundaries: &[String],
) -> FieldValue {
    for table in tables {
        for row in &table.grid.rows {
            for (idx, cell) in row.iter().enumerate() {
                if !field.matches_label(cell) {
                    continue;
                }
                if let Some(value) = adjacent_value(row, idx, field, boundaries) {
                    return FieldValue::extracted(clean_value(&value, field));
                }
                if let Some(value) = combined_cell_value(cell, field, boundaries) {
                    return FieldValue::extracted(clean_value(&value, field));
                }
            }
        }
    }
    FieldValue::missing()
}

/// The next non-empty cell after the label, unless it is another label.
fn adjacent_value(
    row: &[String],
    label_idx: usize,
    field: &FieldSpec,
    boundaries: &[String],
) -> Option<String> {
    for cell in row.iter().skip(label_idx + 1) {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_foreign_label(trimmed, field, boundaries) {
            return None;
        }
        return Some(trimmed.to_string());
    }
    None
}

/// Does `cell` carry a label belonging to some other field?
fn is_foreign_label(cell: &str, field: &FieldSpec, boundaries: &[String]) -> bool {
    boundaries
        .iter()
        .filter(|kw| !field.keywords.contains(kw))
        .any(|kw| text::contains_keyword(cell, kw))
}

/// Parse `label: value` out of a combined cell. The value runs from the
/// label (skipping a colon) to the next recognised label token.
fn combined_cell_value(cell: &str, field: &FieldSpec, boundaries: &[String]) -> Option<String> {
    // OCR scatters spaces inside CJK labels, so work on the stripped text.
    let stripped = text::strip_ws(cell);
    let keyword = field
        .keywords
        .iter()
        .map(|kw| text::strip_ws(kw))
        .find(|kw| stripped.contains(kw.as_str()))?;
    let start = stripped.find(&keyword)? + keyword.len();
    let mut tail = &stripped[start..];
    tail = tail.trim_start_matches([':', '：']);

    let mut end = tail.len();
    for boundary in boundaries {
        let boundary = text::strip_ws(boundary);
        if field.keywords.iter().any(|kw| text::strip_ws(kw) == boundary) {
            continue;
        }
        if let Some(pos) = tail.find(&boundary) {
            end = end.min(pos);
        }
    }
    let value = tail[..end].trim_end_matches([':', '：']).trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn clean_value(raw: &str, field: &FieldSpec) -> String {
    if field.amount {
        text::clean_amount(raw)
    } else if field.numeric {
        text::clean_numeric(raw)
    } else {
        raw.trim().to_string()
    }
}

// ── Column-positional sections ───────────────────────────────────────────

/// Column index per field after keyword mapping, plus where data starts.
struct HeaderMap {
    columns: HashMap<String, usize>,
    data_start: usize,
}

fn extract_rows_section(
    tables: &[ClassifiedTable],
    section: &SectionSchema,
    spec: &RowsSpec,
) -> Vec<Record> {
    let mut entries: Vec<Record> = Vec::new();

    for table in tables {
        if let Some(rule) = &spec.table_rule {
            if table.rule_name.as_deref() != Some(rule.as_str()) {
                continue;
            }
        }
        entries.extend(extract_table_rows(table, section, spec));
    }

    if spec.dedup {
        entries = dedup_by_key(entries, &spec.key_field);
    }
    if let Some(prefix) = &spec.rekey_prefix {
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.set(spec.key_field.clone(), FieldValue::derived(format!("{}{}", prefix, i + 1)));
        }
    }
    entries
}

fn extract_table_rows(
    table: &ClassifiedTable,
    section: &SectionSchema,
    spec: &RowsSpec,
) -> Vec<Record> {
    let rows = &table.grid.rows;
    let header = map_header(rows, &section.fields);

    let Some(&key_col) = header.columns.get(&spec.key_field) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for row in rows.iter().skip(header.data_start) {
        if row.len() < spec.min_row_len {
            continue;
        }
        let key = row.get(key_col).map(|c| c.trim()).unwrap_or("");
        if key.is_empty() || !spec.key_pattern.is_match(key) {
            continue;
        }
        // A repeated header row inside the data (a merge seam) puts a
        // header keyword in the key column; drop it. Equality on the
        // stripped text, so a row whose name merely contains a keyword
        // (变电工程 vs the 变电 column) survives.
        let stripped_key = text::strip_ws(key);
        if section
            .fields
            .iter()
            .flat_map(|f| f.keywords.iter())
            .any(|kw| text::strip_ws(kw) == stripped_key)
        {
            continue;
        }
        if let Some(skip) = &spec.skip_pattern {
            let first = row.iter().map(|c| c.trim()).find(|c| !c.is_empty()).unwrap_or("");
            if skip.is_match(first) {
                debug!(key, "row skipped by section filter");
                continue;
            }
        }

        let entry = build_row_record(row, section, &header);
        if spec.require.iter().any(|f| entry.is_field_empty(f)) {
            debug!(key, "row dropped: required field empty");
            continue;
        }
        out.push(entry);
    }
    out
}

/// Map fields to columns by header keywords, claiming columns left-to-right
/// in schema field order; unmapped fields fall back to default columns.
fn map_header(rows: &[Vec<String>], fields: &[FieldSpec]) -> HeaderMap {
    let mut columns: HashMap<String, usize> = HashMap::new();
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut data_start = 0;

    if let Some(h) = find_header_row(rows, fields) {
        for field in fields {
            if field.keywords.is_empty() {
                continue;
            }
            if let Some(col) = claim_column(&rows[h], field, &claimed) {
                claimed.insert(col);
                columns.insert(field.name.clone(), col);
            }
        }
        data_start = h + 1;

        // Two-row header: unmapped fields may sit on the following row.
        if h + 1 < rows.len() {
            let mut mapped_below = false;
            for field in fields {
                if field.keywords.is_empty() || columns.contains_key(&field.name) {
                    continue;
                }
                if let Some(col) = claim_column(&rows[h + 1], field, &claimed) {
                    claimed.insert(col);
                    columns.insert(field.name.clone(), col);
                    mapped_below = true;
                }
            }
            if mapped_below {
                data_start = h + 2;
            }
        }
    }

    // Fixed layout fallback for anything the header never named. A default
    // column another field already claimed by keyword stays with that field;
    // the unmapped one yields empty values instead of stealing the column.
    for field in fields {
        if columns.contains_key(&field.name) {
            continue;
        }
        if let Some(col) = default_column(field) {
            if claimed.contains(&col) {
                continue;
            }
            claimed.insert(col);
            columns.insert(field.name.clone(), col);
        }
    }

    HeaderMap { columns, data_start }
}

/// First row where at least two distinct fields find their keyword.
fn find_header_row(rows: &[Vec<String>], fields: &[FieldSpec]) -> Option<usize> {
    rows.iter().position(|row| {
        let hits = fields
            .iter()
            .filter(|f| !f.keywords.is_empty())
            .filter(|f| row.iter().any(|cell| f.matches_label(cell)))
            .count();
        hits >= 2
    })
}

fn claim_column(row: &[String], field: &FieldSpec, claimed: &HashSet<usize>) -> Option<usize> {
    row.iter()
        .enumerate()
        .find(|(col, cell)| !claimed.contains(col) && field.matches_label(cell))
        .map(|(col, _)| col)
}

fn default_column(field: &FieldSpec) -> Option<usize> {
    match &field.strategy {
        Strategy::ColumnPositional { default_column } => *default_column,
        Strategy::Derived { default_column, .. } => *default_column,
        Strategy::LabelAdjacent => None,
    }
}

fn build_row_record(row: &[String], section: &SectionSchema, header: &HeaderMap) -> Record {
    let mut entry = Record::new();

    for field in &section.fields {
        let raw = header
            .columns
            .get(&field.name)
            .and_then(|&col| row.get(col))
            .map(|c| c.trim())
            .unwrap_or("");
        let value = apply_check(raw, field);
        if value.is_empty() {
            entry.set(field.name.clone(), FieldValue::missing());
        } else {
            entry.set(field.name.clone(), FieldValue::extracted(clean_value(&value, field)));
        }
    }

    // Derivations run after every column is read so siblings are in place.
    for field in &section.fields {
        let Strategy::Derived { derivation, .. } = &field.strategy else { continue };
        if !entry.is_field_empty(&field.name) {
            continue;
        }
        let derived = match derivation {
            Derivation::AverageOf(siblings) => {
                text::format_average(siblings.iter().map(|s| entry.text(s)))
            }
            Derivation::OutlineLevel { no, name } => {
                text::outline_level(entry.text(no), entry.text(name))
                    .map(|level| level.to_string())
            }
        };
        if let Some(value) = derived {
            entry.set(field.name.clone(), FieldValue::derived(value));
        }
    }

    entry
}

/// Blank values that fail the field's plausibility check.
fn apply_check(raw: &str, field: &FieldSpec) -> String {
    let ok = match field.check {
        None => true,
        Some(ValueCheck::HeightLike) => text::is_valid_height(raw),
        Some(ValueCheck::DateLike) => text::is_valid_monitor_time(raw),
    };
    if ok {
        raw.to_string()
    } else {
        if !raw.is_empty() {
            debug!(field = %field.name, raw, "value failed plausibility check");
        }
        String::new()
    }
}

/// Keep the first occurrence of each key across table fragments.
fn dedup_by_key(entries: Vec<Record>, key_field: &str) -> Vec<Record> {
    let mut seen: HashSet<String> = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let key = entry.text(key_field).to_string();
            key.is_empty() || seen.insert(key)
        })
        .collect()
}

// ── Labelled free-text sections ──────────────────────────────────────────

fn extract_text_section(
    tables: &[ClassifiedTable],
    section: &SectionSchema,
    spec: &TextSpec,
) -> Vec<Record> {
    let Some(text_block) = find_anchored_text(tables, &spec.anchors) else {
        return Vec::new();
    };

    let segments: Vec<(Option<String>, String)> = match &spec.segment {
        Some(re) => {
            let marks: Vec<(usize, Option<String>)> = re
                .captures_iter(&text_block)
                .filter_map(|caps| {
                    let m = caps.get(0)?;
                    Some((m.start(), caps.get(1).map(|g| g.as_str().trim().to_string())))
                })
                .collect();
            marks
                .iter()
                .enumerate()
                .map(|(i, (start, key))| {
                    let end = marks.get(i + 1).map(|(s, _)| *s).unwrap_or(text_block.len());
                    (key.clone(), text_block[*start..end].to_string())
                })
                .collect()
        }
        None => vec![(None, text_block.clone())],
    };

    let mut entries = Vec::new();
    for (segment_key, segment_text) in segments {
        let mut entry = Record::new();
        for field in &section.fields {
            entry.set(field.name.clone(), FieldValue::missing());
        }
        if let (Some(field), Some(key)) = (&spec.segment_field, segment_key) {
            entry.set(field.clone(), FieldValue::extracted(key));
        }
        for (field, chain) in &spec.chains {
            if let Some(value) = chain.first_match(&segment_text) {
                entry.set(field.clone(), FieldValue::extracted(value));
            }
        }
        if !entry.is_empty() {
            entries.push(entry);
        }
    }
    entries
}

/// Text of the first cell containing an anchor, joined with the rest of its
/// row — the value may live in the same combined cell or in the neighbours.
fn find_anchored_text(tables: &[ClassifiedTable], anchors: &[String]) -> Option<String> {
    for table in tables {
        for row in &table.grid.rows {
            for (idx, cell) in row.iter().enumerate() {
                if anchors.iter().any(|a| text::contains_keyword(cell, a)) {
                    let joined = row[idx..].join(" ");
                    return Some(text::normalize_ws(&joined));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;
    use crate::matcher::MatcherChain;
    use crate::pipeline::grid::Grid;
    use crate::record::ValueSource;

    fn table(rows: &[&[&str]]) -> ClassifiedTable {
        ClassifiedTable {
            grid: Grid {
                rows: rows
                    .iter()
                    .map(|r| r.iter().map(|c| c.to_string()).collect())
                    .collect(),
            },
            rule_name: None,
            page: 0,
        }
    }

    fn scalar_schema() -> DocumentSchema {
        DocumentSchema {
            doc_type: "t".into(),
            detect: vec![],
            rules: vec![],
            scalars: vec![
                FieldSpec::label("project", &["项目名称"]),
                FieldSpec::label("standardReferences", &["检测依据"]),
                FieldSpec::label("calibrationValueBefore", &["检测前校准值"]).numeric(),
            ],
            sections: vec![],
            required_scalars: vec![],
            required_sections: vec![],
            defaults: vec![],
            breakdown: None,
        }
    }

    #[test]
    fn label_adjacent_takes_next_cell() {
        let tables = vec![table(&[&["项目名称", "某变电站扩建工程", "检测依据", "GB 12348"]])];
        let rec = extract_record(&tables, &scalar_schema());
        assert_eq!(rec.text("project"), "某变电站扩建工程");
        assert_eq!(rec.text("standardReferences"), "GB 12348");
    }

    #[test]
    fn neighbour_guard_refuses_other_labels() {
        // 项目名称 directly followed by another label: no value to take.
        let tables = vec![table(&[&["项目名称", "检测依据", "GB 12348"]])];
        let rec = extract_record(&tables, &scalar_schema());
        assert_eq!(rec.text("project"), "");
        assert_eq!(rec.text("standardReferences"), "GB 12348");
        assert_eq!(rec.get("project").unwrap().source, ValueSource::Missing);
    }

    #[test]
    fn combined_cell_value_ends_at_next_label() {
        let tables = vec![table(&[&[
            "项目名称：输变电工程 检测依据：GB 12348-2008",
        ]])];
        let rec = extract_record(&tables, &scalar_schema());
        assert_eq!(rec.text("project"), "输变电工程");
        assert_eq!(rec.text("standardReferences"), "GB12348-2008");
    }

    #[test]
    fn numeric_scalar_is_cleaned() {
        let tables = vec![table(&[&["检测前校准值", "93.8 dB"]])];
        let rec = extract_record(&tables, &scalar_schema());
        assert_eq!(rec.text("calibrationValueBefore"), "93.8");
    }

    fn rows_section(rekey: Option<&str>, dedup: bool) -> SectionSchema {
        SectionSchema {
            name: "noise".into(),
            fields: vec![
                FieldSpec::column("code", &["编号"], Some(0)),
                FieldSpec::column("address", &["测点位置", "测点"], Some(1)),
                FieldSpec::column("dayMonitorAt", &["昼间检测时间", "检测时间"], Some(2)),
                FieldSpec::column("dayMonitorValue", &["昼间测量值", "测量值"], Some(3)).numeric(),
                FieldSpec::column("nightMonitorAt", &["夜间检测时间", "检测时间"], Some(4)),
                FieldSpec::column("nightMonitorValue", &["夜间测量值", "测量值"], Some(5)).numeric(),
            ],
            source: SectionSource::Rows(RowsSpec {
                table_rule: None,
                key_field: "code".into(),
                key_pattern: Regex::new(r"(?i)^[NM]\d+").unwrap(),
                min_row_len: 2,
                require: vec!["code".into(), "address".into()],
                skip_pattern: None,
                rekey_prefix: rekey.map(str::to_string),
                dedup,
            }),
        }
    }

    fn section_schema(section: SectionSchema) -> DocumentSchema {
        DocumentSchema {
            doc_type: "t".into(),
            detect: vec![],
            rules: vec![],
            scalars: vec![],
            sections: vec![section],
            required_scalars: vec![],
            required_sections: vec![],
            defaults: vec![],
            breakdown: None,
        }
    }

    #[test]
    fn single_row_header_maps_repeated_keywords_in_field_order() {
        let tables = vec![table(&[
            &["编号", "测点位置", "昼间检测时间", "昼间测量值", "夜间检测时间", "夜间测量值"],
            &["N1", "厂界东侧", "01.05 09:30", "52.3 dB", "01.05 22:10", "45.1"],
        ])];
        let rec = extract_record(&tables, &section_schema(rows_section(None, false)));
        let noise = rec.section("noise");
        assert_eq!(noise.len(), 1);
        assert_eq!(noise[0].text("dayMonitorValue"), "52.3");
        assert_eq!(noise[0].text("nightMonitorValue"), "45.1");
        assert_eq!(noise[0].text("dayMonitorAt"), "01.05 09:30");
    }

    #[test]
    fn two_row_header_shifts_data_start() {
        let tables = vec![table(&[
            &["编号", "测点位置", "昼间", "", "夜间", ""],
            &["", "", "检测时间", "测量值", "检测时间", "测量值"],
            &["N1", "东侧", "09:30", "52.3", "22:10", "45.1"],
        ])];
        let rec = extract_record(&tables, &section_schema(rows_section(None, false)));
        let noise = rec.section("noise");
        assert_eq!(noise.len(), 1);
        // First 检测时间 column claimed by the day field, second by night.
        assert_eq!(noise[0].text("dayMonitorAt"), "09:30");
        assert_eq!(noise[0].text("nightMonitorAt"), "22:10");
    }

    #[test]
    fn rows_failing_key_pattern_or_requirements_are_dropped() {
        let tables = vec![table(&[
            &["编号", "测点位置", "昼间检测时间", "昼间测量值", "夜间检测时间", "夜间测量值"],
            &["N1", "东侧", "", "52.3", "", "45.1"],
            &["合计", "—", "", "", "", ""],
            &["N2", "", "", "50.0", "", "44.0"],
        ])];
        let rec = extract_record(&tables, &section_schema(rows_section(None, false)));
        // 合计 fails the key pattern; N2 lacks the required address.
        assert_eq!(rec.section("noise").len(), 1);
    }

    #[test]
    fn seam_guard_drops_repeated_headers_but_keeps_keyword_containing_names() {
        let section = SectionSchema {
            name: "items".into(),
            fields: vec![
                FieldSpec::column("name", &["工程或费用名称", "工程名称"], Some(1)),
                FieldSpec::column("substation", &["变电"], Some(2)).numeric(),
                FieldSpec::column("staticInvestment", &["静态投资"], Some(3)).amount(),
            ],
            source: SectionSource::Rows(RowsSpec {
                table_rule: None,
                key_field: "name".into(),
                key_pattern: Regex::new(".").unwrap(),
                min_row_len: 3,
                require: vec!["name".into()],
                skip_pattern: None,
                rekey_prefix: None,
                dedup: false,
            }),
        };
        let tables = vec![table(&[
            &["序号", "工程或费用名称", "变电", "静态投资"],
            &["1", "变电工程", "100", "400"],
            // A second page re-stated the header after the merge seam.
            &["序号", "工程名称", "变电", "静态投资"],
            &["2", "其他费用", "", "100"],
        ])];
        let rec = extract_record(&tables, &section_schema(section));
        let items = rec.section("items");
        // 变电工程 contains the 变电 column keyword but is a real row.
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text("name"), "变电工程");
        assert_eq!(items[0].text("staticInvestment"), "400");
        assert_eq!(items[1].text("name"), "其他费用");
    }

    #[test]
    fn fragments_dedup_keeps_first_occurrence() {
        let header: &[&str] =
            &["编号", "测点位置", "昼间检测时间", "昼间测量值", "夜间检测时间", "夜间测量值"];
        let tables = vec![
            table(&[header, &["N1", "东侧", "a", "1", "b", "2"]]),
            table(&[header, &["N1", "重复行", "x", "9", "y", "9"], &["N2", "西侧", "c", "3", "d", "4"]]),
        ];
        let rec = extract_record(&tables, &section_schema(rows_section(None, true)));
        let noise = rec.section("noise");
        assert_eq!(noise.len(), 2);
        assert_eq!(noise[0].text("address"), "东侧");
        assert_eq!(noise[1].text("address"), "西侧");
    }

    #[test]
    fn rekeying_renumbers_with_derived_provenance() {
        let tables = vec![table(&[
            &["编号", "测点位置", "昼间检测时间", "昼间测量值", "夜间检测时间", "夜间测量值"],
            &["N3", "东侧", "a", "1", "b", "2"],
            &["M7", "西侧", "c", "3", "d", "4"],
        ])];
        let rec = extract_record(&tables, &section_schema(rows_section(Some("N"), false)));
        let noise = rec.section("noise");
        assert_eq!(noise[0].text("code"), "N1");
        assert_eq!(noise[1].text("code"), "N2");
        assert_eq!(noise[0].get("code").unwrap().source, ValueSource::Derived);
    }

    #[test]
    fn default_columns_carry_a_headerless_table() {
        let section = SectionSchema {
            name: "em".into(),
            fields: vec![
                FieldSpec::column("code", &["编号"], Some(0)),
                FieldSpec::column("height", &["高度"], Some(1)).check(ValueCheck::HeightLike),
                FieldSpec::column("v1", &[], Some(2)).numeric(),
                FieldSpec::column("v2", &[], Some(3)).numeric(),
                FieldSpec::derived(
                    "avg",
                    Derivation::AverageOf(vec!["v1".into(), "v2".into()]),
                    Some(4),
                ),
            ],
            source: SectionSource::Rows(RowsSpec {
                table_rule: None,
                key_field: "code".into(),
                key_pattern: Regex::new(r"(?i)^(EB|ZB)").unwrap(),
                min_row_len: 4,
                require: vec!["code".into()],
                skip_pattern: None,
                rekey_prefix: None,
                dedup: false,
            }),
        };
        let tables = vec![table(&[
            &["EB1", "1.5", "4.02", "4.10", ""],
            &["EB2", "09:30", "3.98", "4.00", "3.99"],
        ])];
        let rec = extract_record(&tables, &section_schema(section));
        let em = rec.section("em");
        assert_eq!(em.len(), 2);
        // Explicit average cell blank: derived from siblings.
        assert_eq!(em[0].text("avg"), "4.06");
        assert_eq!(em[0].get("avg").unwrap().source, ValueSource::Derived);
        // Explicit average present: kept as extracted.
        assert_eq!(em[1].text("avg"), "3.99");
        assert_eq!(em[1].get("avg").unwrap().source, ValueSource::Extracted);
        // A clock time is not a height.
        assert_eq!(em[1].text("height"), "");
        assert_eq!(em[0].text("height"), "1.5");
    }

    #[test]
    fn labelled_text_section_splits_on_segments() {
        let section = SectionSchema {
            name: "weather".into(),
            fields: vec![
                FieldSpec::column("monitorAt", &[], None),
                FieldSpec::column("weather", &[], None),
                FieldSpec::column("temp", &[], None),
            ],
            source: SectionSource::LabeledText(TextSpec {
                anchors: vec!["气象条件".into()],
                segment: Some(Regex::new(r"日期[：:]\s*([\d.\-]+)").unwrap()),
                segment_field: Some("monitorAt".into()),
                chains: vec![
                    (
                        "weather".into(),
                        MatcherChain::new("t", &[r"天气[：:]\s*([^\s，,；;]+)"]).unwrap(),
                    ),
                    (
                        "temp".into(),
                        MatcherChain::new("t", &[r"温度[：:]\s*([\d.\-]+)"]).unwrap(),
                    ),
                ],
            }),
        };
        let tables = vec![table(&[&[
            "气象条件",
            "日期：2024.01.05 天气：晴 温度：12.5 日期：2024.01.06 天气：多云 温度：9.8",
        ]])];
        let rec = extract_record(&tables, &section_schema(section));
        let weather = rec.section("weather");
        assert_eq!(weather.len(), 2);
        assert_eq!(weather[0].text("monitorAt"), "2024.01.05");
        assert_eq!(weather[0].text("weather"), "晴");
        assert_eq!(weather[1].text("temp"), "9.8");
    }

    #[test]
    fn missing_anchor_yields_empty_section() {
        let section = SectionSchema {
            name: "weather".into(),
            fields: vec![FieldSpec::column("weather", &[], None)],
            source: SectionSource::LabeledText(TextSpec {
                anchors: vec!["气象条件".into()],
                segment: None,
                segment_field: None,
                chains: vec![],
            }),
        };
        let tables = vec![table(&[&["别的内容"]])];
        let rec = extract_record(&tables, &section_schema(section));
        assert!(rec.section("weather").is_empty());
    }
}
