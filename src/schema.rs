//! Declarative extraction schemas.
//!
//! A [`DocumentSchema`] describes one form template: how to recognise the
//! document, how to classify its tables, which scalar fields to pull with
//! which strategy, and which repeating sections to build. The extraction
//! engine in `pipeline::fields` interprets these tables; adding a new form
//! means writing data here (see `profiles`), not new control flow.

use regex::Regex;

use crate::error::Markup2JsonError;
use crate::matcher::MatcherChain;
use crate::text;

// ── Classification rules ─────────────────────────────────────────────────

/// How a rule's keywords combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Every keyword must appear in the header region.
    All,
    /// At least one keyword must appear.
    Any,
}

/// One ordered keyword rule; the first satisfied rule names the table.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub match_mode: MatchMode,
}

impl ClassificationRule {
    pub fn all(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            match_mode: MatchMode::All,
        }
    }

    pub fn any(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            match_mode: MatchMode::Any,
        }
    }
}

// ── Field strategies ─────────────────────────────────────────────────────

/// How a derived field computes its value when the explicit cell is blank.
#[derive(Debug, Clone)]
pub enum Derivation {
    /// Mean of the named sibling fields (unparseable siblings are skipped).
    AverageOf(Vec<String>),
    /// Outline level from the numbering field plus the name field.
    OutlineLevel { no: String, name: String },
}

/// The tagged per-field extraction strategy.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Find a cell containing a keyword; the value is the adjacent cell (or
    /// the remainder of a combined `label: value` cell).
    LabelAdjacent,
    /// Read a column located by header keywords, falling back to the fixed
    /// default column when the header never names it.
    ColumnPositional { default_column: Option<usize> },
    /// As `ColumnPositional`, but when the cell is blank the value is
    /// computed from the row's other fields.
    Derived { derivation: Derivation, default_column: Option<usize> },
}

/// Plausibility check applied to a freshly read cell; failures blank the
/// value instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCheck {
    /// Bare number with optional metre unit; never a clock time or a date.
    HeightLike,
    /// Starts with a full date; never a bare clock time.
    DateLike,
}

/// One field of a scalar panel or a repeating section.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    /// Keyword synonyms that locate the label (or header column).
    pub keywords: Vec<String>,
    pub strategy: Strategy,
    /// Strip to digits/`.`/`-` after reading.
    pub numeric: bool,
    /// Monetary cell: shed unit suffixes and thousands separators too.
    pub amount: bool,
    pub check: Option<ValueCheck>,
}

impl FieldSpec {
    pub fn label(name: &str, keywords: &[&str]) -> Self {
        Self::new(name, keywords, Strategy::LabelAdjacent)
    }

    pub fn column(name: &str, keywords: &[&str], default_column: Option<usize>) -> Self {
        Self::new(name, keywords, Strategy::ColumnPositional { default_column })
    }

    pub fn derived(name: &str, derivation: Derivation, default_column: Option<usize>) -> Self {
        Self::new(name, &[], Strategy::Derived { derivation, default_column })
    }

    fn new(name: &str, keywords: &[&str], strategy: Strategy) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            strategy,
            numeric: false,
            amount: false,
            check: None,
        }
    }

    pub fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }

    pub fn amount(mut self) -> Self {
        self.amount = true;
        self
    }

    pub fn check(mut self, check: ValueCheck) -> Self {
        self.check = Some(check);
        self
    }

    /// Does `cell` mention one of this field's label keywords?
    pub fn matches_label(&self, cell: &str) -> bool {
        self.keywords.iter().any(|kw| text::contains_keyword(cell, kw))
    }
}

// ── Sections ─────────────────────────────────────────────────────────────

/// A repeating section built from table data rows.
#[derive(Debug, Clone)]
pub struct RowsSpec {
    /// Only scan tables classified with this rule; `None` scans every table.
    pub table_rule: Option<String>,
    /// Field whose column gates data rows.
    pub key_field: String,
    /// Record-identifier pattern the key cell must match.
    pub key_pattern: Regex,
    /// Rows shorter than this are skipped outright.
    pub min_row_len: usize,
    /// Fields that must be non-empty for the row to be kept.
    pub require: Vec<String>,
    /// Drop rows whose key cell matches (summary rows in some layouts).
    pub skip_pattern: Option<Regex>,
    /// Renumber key cells to `prefix{n}` — OCR-read keys at this position
    /// are unreliable.
    pub rekey_prefix: Option<String>,
    /// Drop repeated keys across table fragments, keeping the first.
    pub dedup: bool,
}

/// A repeating section parsed out of one anchored free-text cell.
#[derive(Debug, Clone)]
pub struct TextSpec {
    /// The first cell containing one of these keywords feeds the parser.
    pub anchors: Vec<String>,
    /// One section entry per match; `None` treats the whole cell as a single
    /// segment. Capture group 1 lands in `segment_field`.
    pub segment: Option<Regex>,
    pub segment_field: Option<String>,
    /// Per-field matcher chains, run against each segment.
    pub chains: Vec<(String, MatcherChain)>,
}

#[derive(Debug, Clone)]
pub enum SectionSource {
    Rows(RowsSpec),
    LabeledText(TextSpec),
}

#[derive(Debug, Clone)]
pub struct SectionSchema {
    pub name: String,
    /// Evaluated in order; order breaks ties when several fields share a
    /// header keyword (day columns before night columns).
    pub fields: Vec<FieldSpec>,
    pub source: SectionSource,
}

impl SectionSchema {
    fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

// ── Document schema ──────────────────────────────────────────────────────

/// Fill `field` with `label` when it is empty but a sibling is populated.
/// Applied once, after reconciliation; the value carries
/// `ValueSource::Defaulted`.
#[derive(Debug, Clone)]
pub struct CategoricalDefault {
    pub section: String,
    pub field: String,
    pub siblings: Vec<String>,
    pub label: String,
}

/// Fold a flat section into a `{name, level, amounts, items}` tree on output.
#[derive(Debug, Clone)]
pub struct BreakdownSpec {
    pub section: String,
    pub no_field: String,
    pub name_field: String,
    pub level_field: String,
    pub amount_fields: Vec<String>,
}

/// Everything the engine knows about one form template.
#[derive(Debug, Clone)]
pub struct DocumentSchema {
    pub doc_type: String,
    /// Marker groups: the document matches when every group contributes at
    /// least one marker found in the raw markup.
    pub detect: Vec<Vec<String>>,
    pub rules: Vec<ClassificationRule>,
    pub scalars: Vec<FieldSpec>,
    pub sections: Vec<SectionSchema>,
    pub required_scalars: Vec<String>,
    pub required_sections: Vec<String>,
    pub defaults: Vec<CategoricalDefault>,
    pub breakdown: Option<BreakdownSpec>,
}

impl DocumentSchema {
    /// Does the raw markup carry this document type's markers?
    pub fn detect_in(&self, markup: &str) -> bool {
        !self.detect.is_empty()
            && self.detect.iter().all(|group| {
                group.iter().any(|marker| text::contains_keyword(markup, marker))
            })
    }

    pub fn section(&self, name: &str) -> Option<&SectionSchema> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Every scalar label keyword; used as the combined-cell value boundary
    /// and the neighbour guard vocabulary.
    pub fn scalar_keywords(&self) -> impl Iterator<Item = &str> {
        self.scalars.iter().flat_map(|f| f.keywords.iter().map(String::as_str))
    }

    /// Check internal references. A failure here is a schema-authoring bug.
    pub fn validate(&self) -> Result<(), Markup2JsonError> {
        let undefined = |field: &str, context: &str| Markup2JsonError::UndefinedField {
            schema: self.doc_type.clone(),
            field: field.to_string(),
            context: context.to_string(),
        };

        for name in &self.required_scalars {
            if !self.scalars.iter().any(|f| &f.name == name) {
                return Err(undefined(name, "required scalars"));
            }
        }
        for name in &self.required_sections {
            if self.section(name).is_none() {
                return Err(undefined(name, "required sections"));
            }
        }

        for section in &self.sections {
            for field in &section.fields {
                if let Strategy::Derived { derivation, .. } = &field.strategy {
                    let refs: Vec<&String> = match derivation {
                        Derivation::AverageOf(siblings) => siblings.iter().collect(),
                        Derivation::OutlineLevel { no, name } => vec![no, name],
                    };
                    for r in refs {
                        if !section.has_field(r) {
                            return Err(undefined(r, "derivation siblings"));
                        }
                    }
                }
            }
            match &section.source {
                SectionSource::Rows(rows) => {
                    if !section.has_field(&rows.key_field) {
                        return Err(undefined(&rows.key_field, "section key field"));
                    }
                    for r in &rows.require {
                        if !section.has_field(r) {
                            return Err(undefined(r, "section required fields"));
                        }
                    }
                }
                SectionSource::LabeledText(text_spec) => {
                    if let Some(f) = &text_spec.segment_field {
                        if !section.has_field(f) {
                            return Err(undefined(f, "segment field"));
                        }
                    }
                    for (f, _) in &text_spec.chains {
                        if !section.has_field(f) {
                            return Err(undefined(f, "matcher chain field"));
                        }
                    }
                }
            }
        }

        for default in &self.defaults {
            let Some(section) = self.section(&default.section) else {
                return Err(undefined(&default.section, "categorical default section"));
            };
            if !section.has_field(&default.field) {
                return Err(undefined(&default.field, "categorical default field"));
            }
            for sib in &default.siblings {
                if !section.has_field(sib) {
                    return Err(undefined(sib, "categorical default siblings"));
                }
            }
        }

        if let Some(breakdown) = &self.breakdown {
            let Some(section) = self.section(&breakdown.section) else {
                return Err(undefined(&breakdown.section, "breakdown section"));
            };
            for f in [&breakdown.no_field, &breakdown.name_field, &breakdown.level_field]
                .into_iter()
                .chain(breakdown.amount_fields.iter())
            {
                if !section.has_field(f) {
                    return Err(undefined(f, "breakdown fields"));
                }
            }
        }

        Ok(())
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Ordered schema collection; detection tries schemas in registration order.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<DocumentSchema>,
}

impl SchemaRegistry {
    /// Validate and register `schemas` in detection order.
    pub fn new(schemas: Vec<DocumentSchema>) -> Result<Self, Markup2JsonError> {
        for schema in &schemas {
            schema.validate()?;
        }
        Ok(Self { schemas })
    }

    pub fn get(&self, doc_type: &str) -> Option<&DocumentSchema> {
        self.schemas.iter().find(|s| s.doc_type == doc_type)
    }

    /// First schema whose markers all appear in the markup.
    pub fn detect(&self, markup: &str) -> Option<&DocumentSchema> {
        self.schemas.iter().find(|s| s.detect_in(markup))
    }

    pub fn doc_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.doc_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_section(name: &str, key: &str) -> SectionSchema {
        SectionSchema {
            name: name.to_string(),
            fields: vec![FieldSpec::column(key, &["编号"], Some(0))],
            source: SectionSource::Rows(RowsSpec {
                table_rule: None,
                key_field: key.to_string(),
                key_pattern: Regex::new(r"^\d+").unwrap(),
                min_row_len: 1,
                require: vec![],
                skip_pattern: None,
                rekey_prefix: None,
                dedup: false,
            }),
        }
    }

    fn minimal_schema() -> DocumentSchema {
        DocumentSchema {
            doc_type: "t".into(),
            detect: vec![vec!["测试表".into()]],
            rules: vec![],
            scalars: vec![FieldSpec::label("project", &["项目名称"])],
            sections: vec![minimal_section("rows", "code")],
            required_scalars: vec!["project".into()],
            required_sections: vec![],
            defaults: vec![],
            breakdown: None,
        }
    }

    #[test]
    fn valid_schema_passes() {
        assert!(minimal_schema().validate().is_ok());
    }

    #[test]
    fn undefined_required_scalar_is_fatal() {
        let mut schema = minimal_schema();
        schema.required_scalars.push("ghost".into());
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn undefined_derivation_sibling_is_fatal() {
        let mut schema = minimal_schema();
        schema.sections[0].fields.push(FieldSpec::derived(
            "avg",
            Derivation::AverageOf(vec!["v1".into()]),
            Some(3),
        ));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn detection_requires_every_group() {
        let mut schema = minimal_schema();
        schema.detect = vec![vec!["可研批复".into()], vec!["静态投资".into()]];
        assert!(schema.detect_in("…可研批复…静态投资…"));
        assert!(!schema.detect_in("…可研批复…"));
        // Whitespace scattered through a marker still matches.
        assert!(schema.detect_in("可研 批复 … 静态 投资"));
    }

    #[test]
    fn registry_detects_in_order() {
        let mut a = minimal_schema();
        a.doc_type = "a".into();
        a.detect = vec![vec!["共同标记".into()]];
        let mut b = minimal_schema();
        b.doc_type = "b".into();
        b.detect = vec![vec!["共同标记".into()]];
        let reg = SchemaRegistry::new(vec![a, b]).unwrap();
        assert_eq!(reg.detect("共同标记").unwrap().doc_type, "a");
        assert!(reg.get("b").is_some());
        assert!(reg.get("c").is_none());
    }
}
