//! Stage 3: Cross-page merging — reuniting tables split by a page break.
//!
//! A table whose body continues onto the next page renders as two tables:
//! a header-only stub on page P and a headerless continuation on page P+1.
//! The merger splices such pairs back together. Acceptance is deliberately
//! conservative — a wrong merge corrupts two tables, a missed merge only
//! loses the stub's data rows:
//!
//! * the stub must be header-only (`rows ≤ header_rows + min_data_rows`),
//! * the candidate must sit on the very next page,
//! * both must classify to the same rule (or both be unclassified),
//! * column counts must agree within `column_tolerance`,
//! * a candidate whose first row re-states the rule's keywords is a fresh
//!   table of the same kind, not a continuation, and aborts the merge.
//!
//! One forward pass over ascending pages with an explicit consumed set; the
//! output of a pass is a fixed point, so re-running the merger is a no-op.

use tracing::debug;

use crate::schema::ClassificationRule;
use crate::text;

use super::classify::ClassifiedTable;
use super::grid::Grid;

/// Tunables for the merge pass; defaults mirror the extraction config.
#[derive(Debug, Clone)]
pub struct MergePolicy {
    pub header_rows: usize,
    pub min_data_rows: usize,
    pub column_tolerance: usize,
    /// Distinct rule keywords in the candidate's first row at which the
    /// candidate counts as a fresh header rather than a continuation.
    pub fresh_header_abort: usize,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            header_rows: 3,
            min_data_rows: 1,
            column_tolerance: 1,
            fresh_header_abort: 3,
        }
    }
}

/// Splice header-only tables with their next-page continuation.
pub fn merge_cross_page(
    tables: Vec<ClassifiedTable>,
    rules: &[ClassificationRule],
    policy: &MergePolicy,
) -> Vec<ClassifiedTable> {
    let mut slots: Vec<Option<ClassifiedTable>> = tables.into_iter().map(Some).collect();

    for i in 0..slots.len() {
        let Some(stub) = slots[i].as_ref() else { continue };
        if !is_header_only(&stub.grid, policy) {
            continue;
        }
        let Some(j) = find_continuation(&slots, i, rules, policy) else { continue };

        // Both ends checked; splice candidate j onto stub i.
        let Some(continuation) = slots[j].take() else { continue };
        let Some(stub) = slots[i].take() else { continue };
        debug!(
            page = stub.page,
            rule = stub.rule_name.as_deref().unwrap_or("-"),
            "merged cross-page table"
        );
        slots[i] = Some(ClassifiedTable {
            grid: splice(stub.grid, continuation.grid),
            rule_name: stub.rule_name,
            page: stub.page,
        });
    }

    slots.into_iter().flatten().collect()
}

/// A table too short to hold real data under the current policy.
pub fn is_header_only(grid: &Grid, policy: &MergePolicy) -> bool {
    grid.row_count() <= policy.header_rows + policy.min_data_rows
}

fn find_continuation(
    slots: &[Option<ClassifiedTable>],
    stub_idx: usize,
    rules: &[ClassificationRule],
    policy: &MergePolicy,
) -> Option<usize> {
    let stub = slots[stub_idx].as_ref()?;
    for (j, slot) in slots.iter().enumerate().skip(stub_idx + 1) {
        let Some(candidate) = slot else { continue };
        if candidate.page != stub.page + 1 {
            continue;
        }
        if candidate.rule_name != stub.rule_name {
            continue;
        }
        let stub_cols = stub.grid.col_count() as isize;
        let cand_cols = candidate.grid.col_count() as isize;
        if (stub_cols - cand_cols).unsigned_abs() > policy.column_tolerance {
            continue;
        }
        if starts_fresh_header(candidate, rules, policy) {
            debug!(page = candidate.page, "merge aborted: candidate restates header");
            continue;
        }
        return Some(j);
    }
    None
}

/// Does the candidate's first row re-state enough rule keywords to be a new
/// table of the same kind?
fn starts_fresh_header(
    candidate: &ClassifiedTable,
    rules: &[ClassificationRule],
    policy: &MergePolicy,
) -> bool {
    let Some(rule_name) = &candidate.rule_name else { return false };
    let Some(rule) = rules.iter().find(|r| &r.name == rule_name) else { return false };
    let first_row = candidate.grid.row_text(0);
    let hits = rule
        .keywords
        .iter()
        .filter(|kw| text::contains_keyword(&first_row, kw))
        .count();
    hits >= policy.fresh_header_abort
}

/// Stub rows followed by all continuation rows, padded to the wider width.
fn splice(stub: Grid, continuation: Grid) -> Grid {
    let width = stub.col_count().max(continuation.col_count());
    let mut rows = stub.rows;
    rows.extend(continuation.rows);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    Grid { rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(page: usize, rule: Option<&str>, rows: &[&[&str]]) -> ClassifiedTable {
        ClassifiedTable {
            grid: Grid {
                rows: rows
                    .iter()
                    .map(|r| r.iter().map(|c| c.to_string()).collect())
                    .collect(),
            },
            rule_name: rule.map(str::to_string),
            page,
        }
    }

    fn rules() -> Vec<ClassificationRule> {
        vec![ClassificationRule::all(
            "noise",
            &["编号", "测点", "昼间", "夜间"],
        )]
    }

    #[test]
    fn header_stub_merges_with_next_page_body() {
        let tables = vec![
            table(0, Some("noise"), &[&["编号", "测点", "昼间", "夜间"]]),
            table(
                1,
                Some("noise"),
                &[&["N1", "东侧", "52.3", "45.1"], &["N2", "西侧", "50.8", "44.0"]],
            ),
        ];
        let merged = merge_cross_page(tables, &rules(), &MergePolicy::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].grid.row_count(), 3);
        assert_eq!(merged[0].page, 0);
        assert_eq!(merged[0].grid.rows[1][0], "N1");
    }

    #[test]
    fn merge_pass_is_idempotent() {
        let tables = vec![
            table(0, Some("noise"), &[&["编号", "测点", "昼间", "夜间"]]),
            table(1, Some("noise"), &[&["N1", "东侧", "52.3", "45.1"]]),
        ];
        let policy = MergePolicy::default();
        let once = merge_cross_page(tables, &rules(), &policy);
        let twice = merge_cross_page(once.clone(), &rules(), &policy);
        assert_eq!(once.len(), twice.len());
        assert_eq!(once[0].grid, twice[0].grid);
    }

    #[test]
    fn different_rules_never_merge() {
        let tables = vec![
            table(0, Some("noise"), &[&["编号", "测点"]]),
            table(1, Some("other"), &[&["N1", "东侧"]]),
        ];
        assert_eq!(
            merge_cross_page(tables, &rules(), &MergePolicy::default()).len(),
            2
        );
    }

    #[test]
    fn both_unclassified_may_merge() {
        let tables = vec![
            table(0, None, &[&["a", "b"]]),
            table(1, None, &[&["1", "2"], &["3", "4"]]),
        ];
        let merged = merge_cross_page(tables, &rules(), &MergePolicy::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].grid.row_count(), 3);
    }

    #[test]
    fn column_count_gap_beyond_tolerance_blocks_merge() {
        let tables = vec![
            table(0, None, &[&["a", "b", "c", "d"]]),
            table(1, None, &[&["1", "2"]]),
        ];
        assert_eq!(
            merge_cross_page(tables, &rules(), &MergePolicy::default()).len(),
            2
        );
    }

    #[test]
    fn narrower_side_is_padded() {
        let tables = vec![
            table(0, None, &[&["a", "b", "c"]]),
            table(1, None, &[&["1", "2"]]),
        ];
        let merged = merge_cross_page(tables, &rules(), &MergePolicy::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].grid.rows[1], vec!["1", "2", ""]);
    }

    #[test]
    fn fresh_header_on_next_page_aborts_merge() {
        let tables = vec![
            table(0, Some("noise"), &[&["编号", "测点", "昼间", "夜间"]]),
            // A brand-new table of the same kind, not a continuation.
            table(
                1,
                Some("noise"),
                &[&["编号", "测点", "昼间", "夜间"], &["N9", "南侧", "49", "41"]],
            ),
        ];
        assert_eq!(
            merge_cross_page(tables, &rules(), &MergePolicy::default()).len(),
            2
        );
    }

    #[test]
    fn continuation_two_pages_away_is_ignored() {
        let tables = vec![
            table(0, Some("noise"), &[&["编号", "测点", "昼间", "夜间"]]),
            table(2, Some("noise"), &[&["N1", "东侧", "52.3", "45.1"]]),
        ];
        assert_eq!(
            merge_cross_page(tables, &rules(), &MergePolicy::default()).len(),
            2
        );
    }

    #[test]
    fn a_body_is_consumed_only_once() {
        let tables = vec![
            table(0, None, &[&["a", "b"]]),
            table(0, None, &[&["c", "d"]]),
            table(1, None, &[&["1", "2"]]),
        ];
        let merged = merge_cross_page(tables, &rules(), &MergePolicy::default());
        // First stub takes the body; the second finds nothing left.
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].grid.row_count(), 2);
        assert_eq!(merged[1].grid.row_count(), 1);
    }
}
