//! Top-level extraction entry points.
//!
//! The orchestration is deliberately thin: split the input into pages,
//! resolve the schema (hint or marker detection), run the five pipeline
//! stages, and package the result as a [`DocumentOutput`]. Everything
//! interesting happens inside [`crate::pipeline`].

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, info};

use crate::config::ExtractConfig;
use crate::error::Markup2JsonError;
use crate::pipeline::classify::classify_page;
use crate::pipeline::fields::extract_record;
use crate::pipeline::grid::parse_tables;
use crate::pipeline::merge::merge_cross_page;
use crate::pipeline::reconcile::{is_complete, reconcile};
use crate::pipeline::ClassifiedTable;
use crate::record::{fold_breakdown, BreakdownNode, BreakdownRow, Record};
use crate::schema::DocumentSchema;

/// The document type reported when no schema's markers match and no hint
/// was given.
pub const UNKNOWN_DOCUMENT_TYPE: &str = "unknown";

/// The result of one extraction.
///
/// Serialises as `{"document_type": …, "data": {…}}`. When the schema
/// defines a financial breakdown, the flat section is replaced in the JSON
/// by its folded tree; the flat entries stay available on [`Self::data`].
#[derive(Debug, Clone)]
pub struct DocumentOutput {
    pub document_type: String,
    pub data: Record,
    pub breakdown: Option<Breakdown>,
}

/// A folded financial breakdown and the flat section it replaces on output.
#[derive(Debug, Clone)]
pub struct Breakdown {
    pub section: String,
    pub tree: Vec<BreakdownNode>,
}

impl DocumentOutput {
    fn unknown() -> Self {
        Self {
            document_type: UNKNOWN_DOCUMENT_TYPE.to_string(),
            data: Record::new(),
            breakdown: None,
        }
    }

    /// Compact JSON string of the output.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Pretty-printed JSON string of the output.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for DocumentOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("document_type", &self.document_type)?;
        match &self.breakdown {
            Some(breakdown) => map.serialize_entry(
                "data",
                &DataWithTree { record: &self.data, breakdown },
            )?,
            None => map.serialize_entry("data", &self.data)?,
        }
        map.end()
    }
}

/// The record with its flat breakdown section swapped for the folded tree.
struct DataWithTree<'a> {
    record: &'a Record,
    breakdown: &'a Breakdown,
}

impl Serialize for DataWithTree<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, value) in self.record.scalars() {
            map.serialize_entry(name, &value.text)?;
        }
        for name in self.record.section_names() {
            if name == self.breakdown.section {
                continue;
            }
            map.serialize_entry(name, self.record.section(name))?;
        }
        map.serialize_entry(&self.breakdown.section, &self.breakdown.tree)?;
        map.end()
    }
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Extract one document from markup; pages are split on the configured
/// delimiter.
///
/// Returns an `unknown` output when no document type can be resolved;
/// errors only on caller bugs (an unregistered hint, an invalid schema).
pub fn extract(markup: &str, config: &ExtractConfig) -> Result<DocumentOutput, Markup2JsonError> {
    let pages: Vec<&str> = markup.split(config.page_delimiter.as_str()).collect();
    extract_pages(&pages, config)
}

/// Extract one document from pre-split pages.
pub fn extract_pages(
    pages: &[&str],
    config: &ExtractConfig,
) -> Result<DocumentOutput, Markup2JsonError> {
    let Some(schema) = resolve_schema(pages, config)? else {
        info!("no document type detected");
        return Ok(DocumentOutput::unknown());
    };
    info!(doc_type = %schema.doc_type, pages = pages.len(), "extracting");

    let tables = run_pipeline(pages, schema, config);
    let record = extract_record(&tables, schema);
    // Zero-auxiliary reconciliation applies leak scrubbing and defaults.
    let record = reconcile(&record, &[], schema);

    Ok(build_output(record, schema))
}

/// Extract the primary markup and, when the result is incomplete, fill its
/// gaps from the auxiliary markups in priority order.
///
/// Auxiliaries come from fallback OCR passes over the same document; they
/// are extracted with the primary's schema and merged non-empty-wins.
pub fn extract_reconciled(
    primary: &str,
    auxiliaries: &[&str],
    config: &ExtractConfig,
) -> Result<DocumentOutput, Markup2JsonError> {
    let pages: Vec<&str> = primary.split(config.page_delimiter.as_str()).collect();
    let Some(schema) = resolve_schema(&pages, config)? else {
        info!("no document type detected");
        return Ok(DocumentOutput::unknown());
    };
    info!(doc_type = %schema.doc_type, auxiliaries = auxiliaries.len(), "extracting");

    let tables = run_pipeline(&pages, schema, config);
    let primary_record = extract_record(&tables, schema);

    let aux_records: Vec<Record> = if is_complete(&primary_record, schema) {
        debug!("primary extraction complete; auxiliaries skipped");
        Vec::new()
    } else {
        auxiliaries
            .iter()
            .map(|markup| {
                let aux_pages: Vec<&str> =
                    markup.split(config.page_delimiter.as_str()).collect();
                let aux_tables = run_pipeline(&aux_pages, schema, config);
                extract_record(&aux_tables, schema)
            })
            .collect()
    };

    let record = reconcile(&primary_record, &aux_records, schema);
    Ok(build_output(record, schema))
}

// ── Internals ────────────────────────────────────────────────────────────

/// Schema by hint, or by marker detection over the raw markup. A hint that
/// names no registered schema is a caller bug and errors out.
fn resolve_schema<'r>(
    pages: &[&str],
    config: &'r ExtractConfig,
) -> Result<Option<&'r DocumentSchema>, Markup2JsonError> {
    let registry = config.registry();
    if let Some(hint) = &config.document_type {
        let schema = registry.get(hint).ok_or_else(|| Markup2JsonError::UnknownDocumentType {
            doc_type: hint.clone(),
            known: registry.doc_types().collect::<Vec<_>>().join(", "),
        })?;
        return Ok(Some(schema));
    }
    let full_text = pages.join(" ");
    Ok(registry.detect(&full_text))
}

/// Stages 1–3: reconstruct, classify and merge every table of every page.
fn run_pipeline(
    pages: &[&str],
    schema: &DocumentSchema,
    config: &ExtractConfig,
) -> Vec<ClassifiedTable> {
    let mut tables = Vec::new();
    for (page, markup) in pages.iter().enumerate() {
        let grids = parse_tables(markup);
        debug!(page, tables = grids.len(), "page parsed");
        tables.extend(classify_page(grids, &schema.rules, page, config.header_rows));
    }
    if config.merge_cross_page {
        tables = merge_cross_page(tables, &schema.rules, &config.merge_policy());
    }
    tables
}

fn build_output(record: Record, schema: &DocumentSchema) -> DocumentOutput {
    let breakdown = schema.breakdown.as_ref().map(|spec| {
        let rows: Vec<BreakdownRow> = record
            .section(&spec.section)
            .iter()
            .map(|entry| BreakdownRow {
                name: entry.text(&spec.name_field).to_string(),
                level: entry.text(&spec.level_field).parse().ok(),
                amounts: spec
                    .amount_fields
                    .iter()
                    .filter(|f| !entry.is_field_empty(f))
                    .map(|f| (f.clone(), entry.text(f).to_string()))
                    .collect(),
            })
            .collect();
        Breakdown { section: spec.section.clone(), tree: fold_breakdown(rows) }
    });

    DocumentOutput { document_type: schema.doc_type.clone(), data: record, breakdown }
}
