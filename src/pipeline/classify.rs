//! Stage 2: Table classification — ordered keyword rules over the header.
//!
//! Bureaucratic form templates are fixed, so a table's identity is carried
//! entirely by its header text. The classifier joins the first few rows
//! into one normalised string (plus a whitespace-stripped variant, since
//! OCR scatters spaces inside CJK labels) and walks the schema's rules in
//! order; the first satisfied rule names the table. Tables no rule claims
//! stay in the pipeline unclassified — they are skipped by schema-directed
//! extraction but still take part in cross-page merging.

use tracing::debug;

use crate::schema::{ClassificationRule, MatchMode};
use crate::text;

use super::grid::Grid;

/// A grid with its classification verdict and source page.
#[derive(Debug, Clone)]
pub struct ClassifiedTable {
    pub grid: Grid,
    pub rule_name: Option<String>,
    /// Zero-based page the table came from.
    pub page: usize,
}

/// Classify every grid of one page.
pub fn classify_page(
    grids: Vec<Grid>,
    rules: &[ClassificationRule],
    page: usize,
    header_rows: usize,
) -> Vec<ClassifiedTable> {
    grids
        .into_iter()
        .map(|grid| {
            let rule_name = classify(&grid, rules, header_rows).map(|r| r.name.clone());
            debug!(page, rule = rule_name.as_deref().unwrap_or("-"), "classified table");
            ClassifiedTable { grid, rule_name, page }
        })
        .collect()
}

/// First rule satisfied by the grid's header region, if any.
pub fn classify<'r>(
    grid: &Grid,
    rules: &'r [ClassificationRule],
    header_rows: usize,
) -> Option<&'r ClassificationRule> {
    let header = header_text(grid, header_rows);
    rules.iter().find(|rule| rule_matches(rule, &header))
}

/// Normalised text of the first `min(header_rows, rows)` rows.
fn header_text(grid: &Grid, header_rows: usize) -> String {
    let window = header_rows.min(grid.row_count());
    let mut parts = Vec::with_capacity(window);
    for idx in 0..window {
        parts.push(grid.row_text(idx));
    }
    parts.join(" ")
}

fn rule_matches(rule: &ClassificationRule, header: &str) -> bool {
    match rule.match_mode {
        MatchMode::All => rule.keywords.iter().all(|kw| text::contains_keyword(header, kw)),
        MatchMode::Any => rule.keywords.iter().any(|kw| text::contains_keyword(header, kw)),
    }
}
