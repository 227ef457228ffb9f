//! Stage 1: Grid reconstruction — span-annotated markup to dense matrices.
//!
//! The upstream vision model emits HTML tables whose `rowspan`/`colspan`
//! attributes encode merged cells. Downstream stages want a rectangular
//! matrix where every logical position holds text, so spans are expanded:
//! a `colspan` cell keeps its text in the first column and pads the rest
//! with `""`; a `rowspan` cell repeats its text into the covered rows.
//!
//! Expansion runs on a carry map keyed by `(row, column)` — when a cell
//! spans downward, its text is registered for the same column of the next
//! row and re-registered until the span is exhausted. Pending carries are
//! drained before an explicit cell is placed and again after the last
//! explicit cell of the row, which keeps interleaved row- and column-spans
//! in their correct columns.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::text;

static RE_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table[^>]*>(.*?)</table>").unwrap());
static RE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").unwrap());
static RE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t[dh]\b([^>]*)>(.*?)</t[dh]>").unwrap());
static RE_ROWSPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)rowspan\s*=\s*["']?(\d+)"#).unwrap());
static RE_COLSPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)colspan\s*=\s*["']?(\d+)"#).unwrap());

/// A reconstructed table: rectangular, every row padded to the same width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    pub rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// All cells of row `idx` joined with single spaces.
    pub fn row_text(&self, idx: usize) -> String {
        self.rows
            .get(idx)
            .map(|r| text::normalize_ws(&r.join(" ")))
            .unwrap_or_default()
    }
}

/// Reconstruct every table in `markup`. Markup without a single well-formed
/// table yields an empty list, never an error.
pub fn parse_tables(markup: &str) -> Vec<Grid> {
    let grids: Vec<Grid> = RE_TABLE
        .captures_iter(markup)
        .filter_map(|caps| reconstruct(&caps[1]))
        .collect();
    debug!(tables = grids.len(), "reconstructed grids");
    grids
}

/// Expand one table body into a dense grid. `None` when no row survives.
fn reconstruct(body: &str) -> Option<Grid> {
    // (row, col) -> (text, rows still to cover)
    let mut carries: HashMap<(usize, usize), (String, usize)> = HashMap::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for (r, row_caps) in RE_ROW.captures_iter(body).enumerate() {
        let mut out: Vec<String> = Vec::new();
        let mut col = 0usize;

        for cell_caps in RE_CELL.captures_iter(&row_caps[1]) {
            drain_carries(&mut carries, r, &mut col, &mut out);

            let attrs = &cell_caps[1];
            let cell_text = text::clean_cell(&cell_caps[2]);
            let rowspan = span_attr(&RE_ROWSPAN, attrs);
            let colspan = span_attr(&RE_COLSPAN, attrs);

            for k in 0..colspan {
                let t = if k == 0 { cell_text.clone() } else { String::new() };
                if rowspan > 1 {
                    carries.insert((r + 1, col), (t.clone(), rowspan - 1));
                }
                out.push(t);
                col += 1;
            }
        }
        drain_carries(&mut carries, r, &mut col, &mut out);
        rows.push(out);
    }

    if rows.is_empty() {
        return None;
    }
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    Some(Grid { rows })
}

/// Place every carry pending at `(row, *col)`, re-registering unexhausted
/// spans for the next row.
fn drain_carries(
    carries: &mut HashMap<(usize, usize), (String, usize)>,
    row: usize,
    col: &mut usize,
    out: &mut Vec<String>,
) {
    while let Some((cell_text, remaining)) = carries.remove(&(row, *col)) {
        if remaining > 1 {
            carries.insert((row + 1, *col), (cell_text.clone(), remaining - 1));
        }
        out.push(cell_text);
        *col += 1;
    }
}

/// Span attribute value, clamped to at least 1. Unparseable spans default
/// to 1 rather than failing the table.
fn span_attr(re: &Regex, attrs: &str) -> usize {
    re.captures(attrs)
        .and_then(|c| c[1].parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(grid: &Grid) -> Vec<Vec<&str>> {
        grid.rows
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn rowspan_and_colspan_expand_densely() {
        let grids = parse_tables(
            r#"<table><tr><td rowspan="2">A</td><td colspan="2">B</td></tr>
               <tr><td>C</td><td>D</td></tr></table>"#,
        );
        assert_eq!(grids.len(), 1);
        assert_eq!(
            cells(&grids[0]),
            vec![vec!["A", "B", ""], vec!["A", "C", "D"]]
        );
    }

    #[test]
    fn rowspan_repeats_across_three_rows() {
        let grids = parse_tables(
            r#"<table>
               <tr><td rowspan="3">X</td><td>1</td></tr>
               <tr><td>2</td></tr>
               <tr><td>3</td></tr></table>"#,
        );
        assert_eq!(
            cells(&grids[0]),
            vec![vec!["X", "1"], vec!["X", "2"], vec!["X", "3"]]
        );
    }

    #[test]
    fn rowspan_with_colspan_pads_covered_rows() {
        let grids = parse_tables(
            r#"<table>
               <tr><td rowspan="2" colspan="2">W</td><td>a</td></tr>
               <tr><td>b</td></tr></table>"#,
        );
        assert_eq!(
            cells(&grids[0]),
            vec![vec!["W", "", "a"], vec!["W", "", "b"]]
        );
    }

    #[test]
    fn ragged_rows_are_padded_to_max_width() {
        let grids = parse_tables(
            "<table><tr><td>a</td><td>b</td><td>c</td></tr><tr><td>d</td></tr></table>",
        );
        assert_eq!(cells(&grids[0]), vec![vec!["a", "b", "c"], vec!["d", "", ""]]);
        assert_eq!(grids[0].col_count(), 3);
    }

    #[test]
    fn malformed_span_defaults_to_one() {
        let grids = parse_tables(
            r#"<table><tr><td rowspan="abc" colspan="">A</td><td>B</td></tr></table>"#,
        );
        assert_eq!(cells(&grids[0]), vec![vec!["A", "B"]]);
    }

    #[test]
    fn zero_span_clamps_to_one() {
        let grids =
            parse_tables(r#"<table><tr><td colspan="0">A</td><td>B</td></tr></table>"#);
        assert_eq!(cells(&grids[0]), vec![vec!["A", "B"]]);
    }

    #[test]
    fn th_cells_and_entities_are_handled() {
        let grids = parse_tables(
            "<table><tr><th>项目&nbsp;名称</th><td><b>X&amp;Y</b></td></tr></table>",
        );
        assert_eq!(cells(&grids[0]), vec![vec!["项目 名称", "X&Y"]]);
    }

    #[test]
    fn rowless_tables_are_dropped() {
        assert!(parse_tables("<table></table>").is_empty());
        assert!(parse_tables("no tables at all").is_empty());
    }

    #[test]
    fn multiple_tables_keep_document_order() {
        let grids = parse_tables(
            "<table><tr><td>first</td></tr></table><p/><table><tr><td>second</td></tr></table>",
        );
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0].rows[0][0], "first");
        assert_eq!(grids[1].rows[0][0], "second");
    }
}
