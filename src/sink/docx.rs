//! `.docx` realisation of the sink operations, built on `docx-rs`.
//!
//! Tables stay editable until [`DocxBuilder::finish`]: cells are written and
//! merges recorded against an in-memory grid, then each table is laid out
//! once. Word expresses a merge as a horizontal `gridSpan` on the top-left
//! cell of each spanned row plus `vMerge` restart/continue markers down the
//! rows, so covered cells to the right are simply not emitted.

use super::{
    DocumentSink, ParagraphKind, TableHandle, COMPACT_PARAGRAPH_STYLE, TABLE_CELL_STYLE,
    TABLE_STYLE,
};
use crate::error::SinkError;
use crate::pipeline::table::MAX_GRID_CELLS;
use crate::pipeline::title::HeadingLevel;
use docx_rs::{
    BreakType, Docx, LineSpacing, Paragraph, Run, RunFonts, Style, StyleType, Table, TableCell,
    TableRow, VMergeType,
};
use std::io::{Cursor, Seek, Write};
use tracing::debug;

/// Word supports nine heading levels.
const MAX_HEADING_LEVEL: u8 = 9;

/// Total usable width of an A4 page with default margins, in twips.
const TABLE_WIDTH_TWIPS: usize = 9000;

/// Font used by the custom table styles.
const TABLE_FONT: &str = "宋体";

/// Builder that turns sink calls into a DOCX package.
#[derive(Debug, Default)]
pub struct DocxBuilder {
    items: Vec<Item>,
    tables: Vec<TableModel>,
}

#[derive(Debug)]
enum Item {
    Paragraph(Paragraph),
    Table(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Merge {
    r0: usize,
    c0: usize,
    r1: usize,
    c1: usize,
}

impl Merge {
    fn covers(&self, row: usize, col: usize) -> bool {
        (self.r0..=self.r1).contains(&row) && (self.c0..=self.c1).contains(&col)
    }

    fn overlaps(&self, other: &Merge) -> bool {
        self.r0 <= other.r1 && other.r0 <= self.r1 && self.c0 <= other.c1 && other.c0 <= self.c1
    }
}

#[derive(Debug)]
struct TableModel {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<String>>,
    merges: Vec<Merge>,
    style: Option<String>,
}

/// Vertical-merge marker of a laid-out cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VMerge {
    Restart,
    Continue,
}

/// One `<w:tc>` after merges are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LaidCell {
    grid_span: usize,
    vmerge: Option<VMerge>,
    texts: Vec<String>,
}

impl TableModel {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![String::new(); cols]; rows],
            merges: Vec::new(),
            style: None,
        }
    }

    fn layout(&self) -> Vec<Vec<LaidCell>> {
        (0..self.rows)
            .map(|row| {
                (0..self.cols)
                    .filter_map(|col| self.lay_cell(row, col))
                    .collect()
            })
            .collect()
    }

    fn lay_cell(&self, row: usize, col: usize) -> Option<LaidCell> {
        let Some(m) = self.merges.iter().find(|m| m.covers(row, col)) else {
            return Some(LaidCell {
                grid_span: 1,
                vmerge: None,
                texts: vec![self.cells[row][col].clone()],
            });
        };
        if col != m.c0 {
            return None;
        }

        let tall = m.r1 > m.r0;
        if row == m.r0 {
            // Merged content keeps every non-empty covered cell, row-major
            let texts: Vec<String> = (m.r0..=m.r1)
                .flat_map(|r| (m.c0..=m.c1).map(move |c| (r, c)))
                .map(|(r, c)| self.cells[r][c].clone())
                .filter(|t| !t.is_empty())
                .collect();
            Some(LaidCell {
                grid_span: m.c1 - m.c0 + 1,
                vmerge: tall.then_some(VMerge::Restart),
                texts,
            })
        } else {
            Some(LaidCell {
                grid_span: m.c1 - m.c0 + 1,
                vmerge: Some(VMerge::Continue),
                texts: Vec::new(),
            })
        }
    }

    fn to_docx(&self) -> Table {
        let cell_style = self.style.as_ref().map(|_| style_id(TABLE_CELL_STYLE));
        let rows = self
            .layout()
            .into_iter()
            .map(|cells| {
                TableRow::new(
                    cells
                        .into_iter()
                        .map(|laid| laid_to_docx(laid, cell_style.as_deref()))
                        .collect(),
                )
            })
            .collect();

        let col_width = TABLE_WIDTH_TWIPS / self.cols.max(1);
        let mut table = Table::new(rows).set_grid(vec![col_width; self.cols]);
        if let Some(ref style) = self.style {
            table = table.style(&style_id(style));
        }
        table
    }
}

fn laid_to_docx(laid: LaidCell, paragraph_style: Option<&str>) -> TableCell {
    let mut cell = TableCell::new();
    let texts = if laid.texts.is_empty() {
        vec![String::new()]
    } else {
        laid.texts
    };
    for text in texts {
        let mut p = Paragraph::new().add_run(Run::new().add_text(text));
        if let Some(style) = paragraph_style {
            p = p.style(style);
        }
        cell = cell.add_paragraph(p);
    }
    if laid.grid_span > 1 {
        cell = cell.grid_span(laid.grid_span);
    }
    match laid.vmerge {
        Some(VMerge::Restart) => cell.vertical_merge(VMergeType::Restart),
        Some(VMerge::Continue) => cell.vertical_merge(VMergeType::Continue),
        None => cell,
    }
}

/// Style ids cannot contain spaces; names can.
fn style_id(name: &str) -> String {
    name.replace(' ', "")
}

fn heading_style_id(level: HeadingLevel) -> String {
    format!("Heading{}", level.get().min(MAX_HEADING_LEVEL))
}

fn document_styles() -> Vec<Style> {
    let mut styles: Vec<Style> = (1..=MAX_HEADING_LEVEL)
        .map(|level| {
            // 16pt for level 1 down to 11pt, sizes are in half-points
            let size = 32usize.saturating_sub(2 * usize::from(level - 1)).max(22);
            Style::new(format!("Heading{level}"), StyleType::Paragraph)
                .name(format!("heading {level}"))
                .size(size)
                .bold()
        })
        .collect();

    styles.push(
        Style::new(style_id(COMPACT_PARAGRAPH_STYLE), StyleType::Paragraph)
            .name(COMPACT_PARAGRAPH_STYLE)
            .size(22)
            .line_spacing(LineSpacing::new().before(0).after(0).line(240)),
    );

    let table_fonts = RunFonts::new()
        .ascii(TABLE_FONT)
        .hi_ansi(TABLE_FONT)
        .east_asia(TABLE_FONT);
    styles.push(
        Style::new(style_id(TABLE_STYLE), StyleType::Table)
            .name(TABLE_STYLE)
            .size(20)
            .fonts(table_fonts.clone())
            .line_spacing(LineSpacing::new().before(0).after(0).line(360)),
    );
    styles.push(
        Style::new(style_id(TABLE_CELL_STYLE), StyleType::Paragraph)
            .name(TABLE_CELL_STYLE)
            .size(20)
            .fonts(table_fonts)
            .line_spacing(LineSpacing::new().before(0).after(0).line(360)),
    );
    styles
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_mut(&mut self, table: TableHandle) -> Result<&mut TableModel, SinkError> {
        self.tables
            .get_mut(table.0)
            .ok_or(SinkError::UnknownTable(table.0))
    }

    /// Assemble the `docx-rs` document.
    pub fn finish(self) -> Docx {
        let mut docx = Docx::new();
        for style in document_styles() {
            docx = docx.add_style(style);
        }

        let mut tables: Vec<Option<TableModel>> = self.tables.into_iter().map(Some).collect();
        for item in self.items {
            match item {
                Item::Paragraph(p) => docx = docx.add_paragraph(p),
                Item::Table(idx) => {
                    if let Some(model) = tables.get_mut(idx).and_then(Option::take) {
                        debug!(
                            "Laying out table {} ({}x{}, {} merges)",
                            idx,
                            model.rows,
                            model.cols,
                            model.merges.len()
                        );
                        docx = docx.add_table(model.to_docx());
                    }
                }
            }
        }
        docx
    }

    /// Serialise into any seekable writer.
    pub fn write_to<W: Write + Seek>(self, writer: W) -> Result<(), SinkError> {
        self.finish()
            .build()
            .pack(writer)
            .map_err(|e| SinkError::Serialize(e.to_string()))
    }

    /// Serialise into memory.
    pub fn to_bytes(self) -> Result<Vec<u8>, SinkError> {
        let mut buf = Cursor::new(Vec::new());
        self.write_to(&mut buf)?;
        Ok(buf.into_inner())
    }
}

impl DocumentSink for DocxBuilder {
    fn add_heading(&mut self, text: &str, level: HeadingLevel) -> Result<(), SinkError> {
        let p = Paragraph::new()
            .add_run(Run::new().add_text(text))
            .style(&heading_style_id(level));
        self.items.push(Item::Paragraph(p));
        Ok(())
    }

    fn add_paragraph(
        &mut self,
        text: &str,
        _kind: ParagraphKind,
        style: Option<&str>,
    ) -> Result<(), SinkError> {
        let mut p = Paragraph::new();
        // Multi-line resolver output keeps its line structure
        for (i, line) in text.split('\n').enumerate() {
            let mut run = Run::new();
            if i > 0 {
                run = run.add_break(BreakType::TextWrapping);
            }
            p = p.add_run(run.add_text(line));
        }
        if let Some(style) = style {
            p = p.style(&style_id(style));
        }
        self.items.push(Item::Paragraph(p));
        Ok(())
    }

    fn add_page_break(&mut self) -> Result<(), SinkError> {
        let p = Paragraph::new().add_run(Run::new().add_break(BreakType::Page));
        self.items.push(Item::Paragraph(p));
        Ok(())
    }

    fn create_table(&mut self, rows: usize, cols: usize) -> Result<TableHandle, SinkError> {
        if rows.checked_mul(cols).is_none_or(|n| n > MAX_GRID_CELLS) {
            return Err(SinkError::TableTooLarge {
                rows,
                cols,
                max: MAX_GRID_CELLS,
            });
        }
        let handle = TableHandle(self.tables.len());
        self.tables.push(TableModel::new(rows, cols));
        self.items.push(Item::Table(handle.0));
        Ok(handle)
    }

    fn set_cell_text(
        &mut self,
        table: TableHandle,
        row: usize,
        col: usize,
        text: &str,
    ) -> Result<(), SinkError> {
        let model = self.table_mut(table)?;
        let cell = model
            .cells
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(SinkError::CellOutOfRange {
                table: table.0,
                row,
                col,
            })?;
        *cell = text.to_string();
        Ok(())
    }

    fn merge_cells(
        &mut self,
        table: TableHandle,
        from: (usize, usize),
        to: (usize, usize),
    ) -> Result<(), SinkError> {
        let model = self.table_mut(table)?;
        let merge = Merge {
            r0: from.0.min(to.0),
            c0: from.1.min(to.1),
            r1: from.0.max(to.0),
            c1: from.1.max(to.1),
        };
        if merge.r1 >= model.rows || merge.c1 >= model.cols {
            return Err(SinkError::CellOutOfRange {
                table: table.0,
                row: merge.r1,
                col: merge.c1,
            });
        }
        if model.merges.iter().any(|m| m.overlaps(&merge)) {
            return Err(SinkError::OverlappingMerge {
                table: table.0,
                r0: merge.r0,
                c0: merge.c0,
                r1: merge.r1,
                c1: merge.c1,
            });
        }
        model.merges.push(merge);
        Ok(())
    }

    fn set_table_style(&mut self, table: TableHandle, style: &str) -> Result<(), SinkError> {
        self.table_mut(table)?.style = Some(style.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> LaidCell {
        LaidCell {
            grid_span: 1,
            vmerge: None,
            texts: vec![text.to_string()],
        }
    }

    #[test]
    fn layout_without_merges_is_the_grid() {
        let mut m = TableModel::new(1, 2);
        m.cells[0][0] = "A".into();
        m.cells[0][1] = "B".into();
        assert_eq!(m.layout(), vec![vec![plain("A"), plain("B")]]);
    }

    #[test]
    fn horizontal_merge_becomes_grid_span() {
        let mut m = TableModel::new(2, 2);
        m.cells[0][0] = "Header".into();
        m.cells[1][0] = "a".into();
        m.cells[1][1] = "b".into();
        m.merges.push(Merge { r0: 0, c0: 0, r1: 0, c1: 1 });

        let laid = m.layout();
        assert_eq!(laid[0].len(), 1);
        assert_eq!(laid[0][0].grid_span, 2);
        assert_eq!(laid[0][0].vmerge, None);
        assert_eq!(laid[0][0].texts, vec!["Header".to_string()]);
        assert_eq!(laid[1], vec![plain("a"), plain("b")]);
    }

    #[test]
    fn vertical_merge_restarts_then_continues() {
        let mut m = TableModel::new(3, 2);
        m.cells[0][0] = "tall".into();
        m.cells[0][1] = "x".into();
        m.cells[1][1] = "y".into();
        m.cells[2][0] = "z".into();
        m.cells[2][1] = "w".into();
        m.merges.push(Merge { r0: 0, c0: 0, r1: 1, c1: 0 });

        let laid = m.layout();
        assert_eq!(laid[0][0].vmerge, Some(VMerge::Restart));
        assert_eq!(laid[1][0].vmerge, Some(VMerge::Continue));
        assert!(laid[1][0].texts.is_empty());
        assert_eq!(laid[1][1], plain("y"));
        assert_eq!(laid[2][0], plain("z"));
    }

    #[test]
    fn merged_text_collects_covered_cells() {
        let mut m = TableModel::new(1, 3);
        m.cells[0][0] = "a".into();
        m.cells[0][2] = "c".into();
        m.merges.push(Merge { r0: 0, c0: 0, r1: 0, c1: 2 });
        let laid = m.layout();
        assert_eq!(laid[0][0].texts, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn overlapping_merge_rejected() {
        let mut b = DocxBuilder::new();
        let t = b.create_table(2, 2).unwrap();
        b.merge_cells(t, (0, 0), (1, 0)).unwrap();
        let err = b.merge_cells(t, (1, 0), (1, 1)).unwrap_err();
        assert!(matches!(err, SinkError::OverlappingMerge { .. }));
    }

    #[test]
    fn oversized_table_rejected_without_allocating() {
        let mut b = DocxBuilder::new();
        assert!(matches!(
            b.create_table(200_000_000, 200_000_000),
            Err(SinkError::TableTooLarge { .. })
        ));
        assert!(matches!(
            b.create_table(usize::MAX, 2),
            Err(SinkError::TableTooLarge { .. })
        ));
        assert!(b.create_table(1, MAX_GRID_CELLS).is_ok());
    }

    #[test]
    fn out_of_range_cell_rejected() {
        let mut b = DocxBuilder::new();
        let t = b.create_table(1, 1).unwrap();
        let err = b.set_cell_text(t, 0, 1, "x").unwrap_err();
        assert!(matches!(err, SinkError::CellOutOfRange { col: 1, .. }));
        assert!(matches!(
            b.set_cell_text(TableHandle(9), 0, 0, "x"),
            Err(SinkError::UnknownTable(9))
        ));
    }

    #[test]
    fn writes_a_zip_package() {
        let mut b = DocxBuilder::new();
        b.add_heading("1 Introduction", HeadingLevel::TOP).unwrap();
        b.add_paragraph("Body text.", ParagraphKind::Body, Some(COMPACT_PARAGRAPH_STYLE))
            .unwrap();
        b.add_page_break().unwrap();
        let t = b.create_table(2, 2).unwrap();
        b.set_table_style(t, TABLE_STYLE).unwrap();
        b.set_cell_text(t, 0, 0, "H").unwrap();
        b.merge_cells(t, (0, 0), (0, 1)).unwrap();

        let bytes = b.to_bytes().unwrap();
        assert!(bytes.starts_with(b"PK"), "docx is a zip archive");
    }

    #[test]
    fn style_ids_drop_spaces() {
        assert_eq!(style_id("No Spacing"), "NoSpacing");
        assert_eq!(heading_style_id(HeadingLevel::new(12).unwrap()), "Heading9");
    }
}
