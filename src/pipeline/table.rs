//! HTML table markup → grid placements and merge spans.
//!
//! The extractor delivers tables as `<table><tr><td colspan=..>` markup. The
//! column count is fixed from row 0 (sum of its colspans). Each later cell is
//! placed at the first free column at or after a forward-only cursor, where
//! "free" means not already claimed by an earlier cell's row/col span.
//!
//! Building a [`TablePlan`] is pure: it is computed and checked against the
//! grid before anything is written, so malformed markup never leaves half a
//! table behind in the output.

use crate::error::{SinkError, TableError};
use crate::sink::{DocumentSink, TableHandle};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Largest accepted `colspan`/`rowspan`.
pub const MAX_SPAN: usize = 1000;

/// Largest accepted grid, in cells.
pub const MAX_GRID_CELLS: usize = 100_000;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());

/// Text written into one grid position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedCell {
    pub row: usize,
    pub col: usize,
    pub text: String,
}

/// Inclusive rectangle covered by one spanning cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSpan {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

/// Everything needed to write one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlan {
    pub rows: usize,
    pub cols: usize,
    /// Cell texts in placement order.
    pub cells: Vec<PlacedCell>,
    /// Merge spans in the order they were recorded.
    pub merges: Vec<MergeSpan>,
}

impl TablePlan {
    /// Write the plan into `sink`: create, optional style, cell texts, then merges.
    pub fn apply<S: DocumentSink + ?Sized>(
        &self,
        sink: &mut S,
        style: Option<&str>,
    ) -> Result<TableHandle, SinkError> {
        let table = sink.create_table(self.rows, self.cols)?;
        if let Some(style) = style {
            sink.set_table_style(table, style)?;
        }
        for cell in &self.cells {
            sink.set_cell_text(table, cell.row, cell.col, &cell.text)?;
        }
        for m in &self.merges {
            sink.merge_cells(table, (m.start_row, m.start_col), (m.end_row, m.end_col))?;
        }
        Ok(table)
    }
}

/// Build one plan per `<table>` in `markup`.
///
/// Fails as a whole if any table is malformed.
pub fn build_tables(markup: &str) -> Result<Vec<TablePlan>, TableError> {
    let fragment = Html::parse_fragment(markup);
    let plans = fragment
        .select(&TABLE)
        .map(build_one)
        .collect::<Result<Vec<_>, _>>()?;
    if plans.is_empty() {
        return Err(TableError::NoTable);
    }
    Ok(plans)
}

fn build_one(table: ElementRef<'_>) -> Result<TablePlan, TableError> {
    let rows: Vec<ElementRef<'_>> = table.select(&ROW).collect();
    let first = rows.first().ok_or(TableError::NoRows)?;

    let mut cols: usize = 0;
    let mut header_cells = 0;
    for cell in first.select(&CELL) {
        let colspan = span(&cell, "colspan", 0)?;
        cols = cols.checked_add(colspan).ok_or(TableError::TooLarge {
            rows: rows.len(),
            cols: usize::MAX,
            max: MAX_GRID_CELLS,
        })?;
        header_cells += 1;
    }
    if header_cells == 0 {
        return Err(TableError::EmptyHeaderRow);
    }

    let grid = Grid {
        rows: rows.len(),
        cols,
    };
    if rows
        .len()
        .checked_mul(cols)
        .is_none_or(|cells| cells > MAX_GRID_CELLS)
    {
        return Err(TableError::TooLarge {
            rows: grid.rows,
            cols: grid.cols,
            max: MAX_GRID_CELLS,
        });
    }
    let mut occupied: HashSet<(usize, usize)> = HashSet::new();
    let mut cells = Vec::new();
    let mut merges = Vec::new();

    for (r, tr) in rows.iter().enumerate() {
        let mut cursor = 0;
        for cell in tr.select(&CELL) {
            let colspan = span(&cell, "colspan", r)?;
            let rowspan = span(&cell, "rowspan", r)?;

            while occupied.contains(&(r, cursor)) {
                cursor += 1;
            }
            grid.check(r, cursor)?;
            cells.push(PlacedCell {
                row: r,
                col: cursor,
                text: cell_text(&cell),
            });

            if colspan > 1 || rowspan > 1 {
                let span = MergeSpan {
                    start_row: r,
                    start_col: cursor,
                    end_row: grid.offset(r, rowspan, cursor)?,
                    end_col: grid.offset(cursor, colspan, r)?,
                };
                grid.check(span.end_row, span.end_col)?;
                for rr in span.start_row..=span.end_row {
                    for cc in span.start_col..=span.end_col {
                        if !occupied.insert((rr, cc)) {
                            return Err(TableError::OverlappingSpans { row: rr, col: cc });
                        }
                    }
                }
                merges.push(span);
            }

            cursor = cursor.saturating_add(colspan);
        }
    }

    Ok(TablePlan {
        rows: grid.rows,
        cols: grid.cols,
        cells,
        merges,
    })
}

#[derive(Clone, Copy)]
struct Grid {
    rows: usize,
    cols: usize,
}

impl Grid {
    fn check(&self, row: usize, col: usize) -> Result<(), TableError> {
        if row < self.rows && col < self.cols {
            Ok(())
        } else {
            Err(TableError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// Last index covered by a span of `len` starting at `start`.
    fn offset(&self, start: usize, len: usize, other: usize) -> Result<usize, TableError> {
        start
            .checked_add(len - 1)
            .ok_or(TableError::OutOfBounds {
                row: start,
                col: other,
                rows: self.rows,
                cols: self.cols,
            })
    }
}

/// Span attribute value; absent or `0` counts as 1, above [`MAX_SPAN`] is invalid.
fn span(cell: &ElementRef<'_>, attr: &'static str, row: usize) -> Result<usize, TableError> {
    let Some(raw) = cell.value().attr(attr) else {
        return Ok(1);
    };
    let invalid = || TableError::InvalidSpan {
        row,
        attr,
        value: raw.to_string(),
    };
    let value: usize = raw.trim().parse().map_err(|_| invalid())?;
    if value > MAX_SPAN {
        return Err(invalid());
    }
    Ok(value.max(1))
}

/// Stripped text fragments, concatenated with no separator.
fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{DocOp, OpRecorder};

    fn one(markup: &str) -> TablePlan {
        let mut plans = build_tables(markup).unwrap();
        assert_eq!(plans.len(), 1);
        plans.remove(0)
    }

    fn placed(row: usize, col: usize, text: &str) -> PlacedCell {
        PlacedCell {
            row,
            col,
            text: text.to_string(),
        }
    }

    #[test]
    fn simple_grid_has_no_merges() {
        let plan = one("<table><tr><td>A</td><td>B</td></tr></table>");
        assert_eq!((plan.rows, plan.cols), (1, 2));
        assert_eq!(plan.cells, vec![placed(0, 0, "A"), placed(0, 1, "B")]);
        assert!(plan.merges.is_empty());
    }

    #[test]
    fn header_colspan_sets_column_count_and_merge() {
        let plan = one(
            r#"<table><tr><td colspan="2">H</td></tr><tr><td>a</td><td>b</td></tr></table>"#,
        );
        assert_eq!((plan.rows, plan.cols), (2, 2));
        assert_eq!(
            plan.merges,
            vec![MergeSpan {
                start_row: 0,
                start_col: 0,
                end_row: 0,
                end_col: 1
            }]
        );
        assert_eq!(
            plan.cells,
            vec![placed(0, 0, "H"), placed(1, 0, "a"), placed(1, 1, "b")]
        );
    }

    #[test]
    fn rowspan_pushes_later_cells_right() {
        let plan = one(
            r#"<table>
                <tr><td rowspan="2">A</td><td>B</td></tr>
                <tr><td>C</td></tr>
            </table>"#,
        );
        assert_eq!(plan.cells[2], placed(1, 1, "C"));
        assert_eq!(
            plan.merges[0],
            MergeSpan {
                start_row: 0,
                start_col: 0,
                end_row: 1,
                end_col: 0
            }
        );
    }

    #[test]
    fn short_row_is_left_as_is() {
        let plan = one(
            "<table><tr><td>1</td><td>2</td><td>3</td></tr><tr><td>x</td></tr></table>",
        );
        assert_eq!(plan.cols, 3);
        assert_eq!(plan.cells.last(), Some(&placed(1, 0, "x")));
        assert_eq!(plan.cells.len(), 4);
    }

    #[test]
    fn cell_text_concatenates_stripped_fragments() {
        let plan = one("<table><tr><th> total <b> 12 </b>\n</th></tr></table>");
        assert_eq!(plan.cells[0].text, "total12");
    }

    #[test]
    fn zero_span_counts_as_one() {
        let plan = one(r#"<table><tr><td colspan="0">A</td><td>B</td></tr></table>"#);
        assert_eq!(plan.cols, 2);
        assert!(plan.merges.is_empty());
    }

    #[test]
    fn build_is_idempotent() {
        let markup = r#"<table>
            <tr><td colspan="2">H</td><td rowspan="2">R</td></tr>
            <tr><td>a</td><td>b</td></tr>
        </table>"#;
        assert_eq!(build_tables(markup).unwrap(), build_tables(markup).unwrap());
    }

    #[test]
    fn every_table_in_the_markup_is_built() {
        let plans = build_tables(
            "<table><tr><td>A</td></tr></table><p>gap</p><table><tr><td>B</td><td>C</td></tr></table>",
        )
        .unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].cols, 2);
    }

    #[test]
    fn malformed_markup_errors() {
        assert_eq!(build_tables("<p>no table</p>"), Err(TableError::NoTable));
        assert_eq!(build_tables("<table></table>"), Err(TableError::NoRows));
        assert_eq!(
            build_tables("<table><tr></tr></table>"),
            Err(TableError::EmptyHeaderRow)
        );
        assert!(matches!(
            build_tables(r#"<table><tr><td colspan="wide">A</td></tr></table>"#),
            Err(TableError::InvalidSpan {
                attr: "colspan",
                ..
            })
        ));
    }

    #[test]
    fn cell_past_last_column_is_out_of_bounds() {
        let err = build_tables("<table><tr><td>A</td></tr><tr><td>b</td><td>c</td></tr></table>")
            .unwrap_err();
        assert_eq!(
            err,
            TableError::OutOfBounds {
                row: 1,
                col: 1,
                rows: 2,
                cols: 1
            }
        );
    }

    #[test]
    fn rowspan_past_last_row_is_out_of_bounds() {
        let err = build_tables(r#"<table><tr><td rowspan="3">A</td></tr></table>"#).unwrap_err();
        assert!(matches!(err, TableError::OutOfBounds { row: 2, .. }));
    }

    #[test]
    fn huge_colspan_is_invalid_not_overflow() {
        let markup = r#"<table><tr><td colspan="18446744073709551615">A</td><td>B</td></tr></table>"#;
        assert!(matches!(
            build_tables(markup),
            Err(TableError::InvalidSpan {
                row: 0,
                attr: "colspan",
                ..
            })
        ));
    }

    #[test]
    fn huge_rowspan_in_later_row_is_invalid() {
        let markup = r#"<table>
            <tr><td>A</td></tr>
            <tr><td rowspan="18446744073709551615">B</td></tr>
        </table>"#;
        assert!(matches!(
            build_tables(markup),
            Err(TableError::InvalidSpan {
                row: 1,
                attr: "rowspan",
                ..
            })
        ));
    }

    #[test]
    fn span_above_limit_rejected_before_planning() {
        let markup = r#"<table><tr><td colspan="200000000">A</td></tr></table>"#;
        assert!(matches!(
            build_tables(markup),
            Err(TableError::InvalidSpan { .. })
        ));
    }

    #[test]
    fn span_at_limit_is_accepted() {
        let plan = one(&format!(
            r#"<table><tr><td colspan="{MAX_SPAN}">wide</td></tr></table>"#
        ));
        assert_eq!(plan.cols, MAX_SPAN);
        assert_eq!(plan.merges[0].end_col, MAX_SPAN - 1);
    }

    #[test]
    fn oversized_grid_rejected() {
        let cell = format!(r#"<td colspan="{MAX_SPAN}">x</td>"#);
        let markup = format!("<table><tr>{}</tr></table>", cell.repeat(101));
        assert_eq!(
            build_tables(&markup),
            Err(TableError::TooLarge {
                rows: 1,
                cols: 101 * MAX_SPAN,
                max: MAX_GRID_CELLS
            })
        );
    }

    #[test]
    fn overlapping_spans_rejected() {
        let err = build_tables(
            r#"<table>
                <tr><td>A</td><td rowspan="2">B</td></tr>
                <tr><td colspan="2">C</td></tr>
            </table>"#,
        )
        .unwrap_err();
        assert_eq!(err, TableError::OverlappingSpans { row: 1, col: 1 });
    }

    #[test]
    fn apply_emits_create_style_cells_then_merges() {
        let plan = one(r#"<table><tr><td colspan="2">H</td></tr><tr><td>a</td><td>b</td></tr></table>"#);
        let mut rec = OpRecorder::new();
        let handle = plan.apply(&mut rec, Some("CustomTableStyle")).unwrap();
        let ops = rec.into_ops();
        assert_eq!(
            ops[0],
            DocOp::CreateTable {
                table: handle,
                rows: 2,
                cols: 2
            }
        );
        assert!(matches!(ops[1], DocOp::SetTableStyle { .. }));
        assert_eq!(ops.len(), 1 + 1 + 3 + 1);
        assert_eq!(
            ops[5],
            DocOp::MergeCells {
                table: handle,
                from: (0, 0),
                to: (0, 1)
            }
        );
    }
}
