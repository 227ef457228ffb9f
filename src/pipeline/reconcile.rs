//! Stage 5: Record reconciliation — merging independent extraction passes.
//!
//! The primary record comes from the main markup; auxiliaries come from
//! fallback OCR passes over cropped regions of the same document. None of
//! them is authoritative, so the merge is non-empty-wins in priority order:
//! the primary's value stands unless empty, then the first auxiliary with a
//! non-empty value fills the gap. Repeating sections merge positionally by
//! index; trailing auxiliary entries append.
//!
//! Two quality gates run around the merge:
//!
//! * **Label leaks** — an extractor that misfires returns the label text
//!   itself as the value (`weather: "天气"`). A value equal to one of its
//!   own field's keywords is treated as empty on both sides of the merge.
//! * **Categorical defaults** — after the merge, a schema default fills a
//!   still-empty field when its sibling fields are populated (weather `晴`
//!   when temperature/humidity/wind carry values). The substituted value is
//!   tagged `ValueSource::Defaulted`, keeping it distinguishable from
//!   anything read off the page.
//!
//! Reconciliation never mutates its inputs; it builds a fresh record.

use tracing::debug;

use crate::record::{FieldValue, Record};
use crate::schema::{DocumentSchema, FieldSpec, SectionSchema};
use crate::text;

/// Is the extraction good enough to skip the fallback passes?
///
/// Incomplete when half or more of the required scalars are empty, when a
/// required section has no entries, or when any field smells of a label
/// leak.
pub fn is_complete(record: &Record, schema: &DocumentSchema) -> bool {
    if !schema.required_scalars.is_empty() {
        let missing = schema
            .required_scalars
            .iter()
            .filter(|name| record.is_field_empty(name.as_str()))
            .count();
        if missing * 2 >= schema.required_scalars.len() {
            debug!(missing, required = schema.required_scalars.len(), "record incomplete");
            return false;
        }
    }
    for name in &schema.required_sections {
        if record.section(name).is_empty() {
            debug!(section = %name, "required section empty");
            return false;
        }
    }
    if has_label_leak(record, schema) {
        return false;
    }
    true
}

/// Merge `primary` with `auxiliaries` and apply the schema's categorical
/// defaults. Inputs are untouched.
pub fn reconcile(primary: &Record, auxiliaries: &[Record], schema: &DocumentSchema) -> Record {
    let mut merged = primary.clone();
    scrub_leaks(&mut merged, schema);

    for aux in auxiliaries {
        for field in &schema.scalars {
            fill_scalar(&mut merged, aux, field);
        }
        for section in &schema.sections {
            merge_section(&mut merged, aux, section);
        }
    }

    for default in &schema.defaults {
        for entry in merged.section_mut(&default.section) {
            let siblings_populated =
                default.siblings.iter().any(|s| !entry.is_field_empty(s));
            if entry.is_field_empty(&default.field) && siblings_populated {
                debug!(field = %default.field, label = %default.label, "categorical default applied");
                entry.set(default.field.clone(), FieldValue::defaulted(default.label.clone()));
            }
        }
    }

    merged
}

fn fill_scalar(merged: &mut Record, aux: &Record, field: &FieldSpec) {
    if !merged.is_field_empty(&field.name) {
        return;
    }
    let Some(value) = aux.get(&field.name) else { return };
    if value.is_empty() || is_label_leak(&value.text, field) {
        return;
    }
    merged.set(field.name.clone(), value.clone());
}

fn merge_section(merged: &mut Record, aux: &Record, section: &SectionSchema) {
    let aux_entries = aux.section(&section.name);
    if aux_entries.is_empty() {
        return;
    }
    let target = merged.section_mut(&section.name);
    for (idx, aux_entry) in aux_entries.iter().enumerate() {
        if let Some(entry) = target.get_mut(idx) {
            for field in &section.fields {
                if !entry.is_field_empty(&field.name) {
                    continue;
                }
                let Some(value) = aux_entry.get(&field.name) else { continue };
                if value.is_empty() || is_label_leak(&value.text, field) {
                    continue;
                }
                entry.set(field.name.clone(), value.clone());
            }
        } else {
            let mut appended = aux_entry.clone();
            scrub_entry_leaks(&mut appended, &section.fields);
            target.push(appended);
        }
    }
}

// ── Label leaks ──────────────────────────────────────────────────────────

/// A value equal to one of its own field's keyword labels.
fn is_label_leak(value: &str, field: &FieldSpec) -> bool {
    let stripped = text::strip_ws(value);
    !stripped.is_empty()
        && field.keywords.iter().any(|kw| text::strip_ws(kw) == stripped)
}

fn has_label_leak(record: &Record, schema: &DocumentSchema) -> bool {
    for field in &schema.scalars {
        if is_label_leak(record.text(&field.name), field) {
            debug!(field = %field.name, "label leak detected");
            return true;
        }
    }
    for section in &schema.sections {
        for entry in record.section(&section.name) {
            for field in &section.fields {
                if is_label_leak(entry.text(&field.name), field) {
                    debug!(section = %section.name, field = %field.name, "label leak detected");
                    return true;
                }
            }
        }
    }
    false
}

fn scrub_leaks(record: &mut Record, schema: &DocumentSchema) {
    for field in &schema.scalars {
        if is_label_leak(record.text(&field.name), field) {
            record.set(field.name.clone(), FieldValue::missing());
        }
    }
    for section in &schema.sections {
        let fields = section.fields.clone();
        for entry in record.section_mut(&section.name) {
            scrub_entry_leaks(entry, &fields);
        }
    }
}

fn scrub_entry_leaks(entry: &mut Record, fields: &[FieldSpec]) {
    for field in fields {
        if is_label_leak(entry.text(&field.name), field) {
            entry.set(field.name.clone(), FieldValue::missing());
        }
    }
}
