//! Output document abstraction.
//!
//! The router decides *what* to write; a [`DocumentSink`] decides *how*.
//! Two sinks ship with the crate:
//!
//! * [`OpRecorder`]: keeps the operation sequence as [`DocOp`] values.
//!   Used by tests and by `pdf2docx --dry-run`.
//! * [`docx::DocxBuilder`]: realises the operations as a `.docx` file.

pub mod docx;

use crate::error::SinkError;
use crate::pipeline::title::HeadingLevel;
use serde::{Deserialize, Serialize};

pub use docx::DocxBuilder;

/// Compact paragraph style for body text and footers.
pub const COMPACT_PARAGRAPH_STYLE: &str = "No Spacing";

/// Table style applied when custom styles are enabled.
pub const TABLE_STYLE: &str = "CustomTableStyle";

/// Paragraph style for text inside styled tables.
pub const TABLE_CELL_STYLE: &str = "CustomTable";

/// Opaque reference to a table created by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableHandle(pub usize);

/// What a paragraph represents. Sinks may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParagraphKind {
    Body,
    Footer,
    /// LaTeX from a formula recogniser.
    Formula,
    /// Generated explanation of a figure.
    Description,
}

/// Structural write operations against an output document.
pub trait DocumentSink {
    fn add_heading(&mut self, text: &str, level: HeadingLevel) -> Result<(), SinkError>;

    fn add_paragraph(
        &mut self,
        text: &str,
        kind: ParagraphKind,
        style: Option<&str>,
    ) -> Result<(), SinkError>;

    fn add_page_break(&mut self) -> Result<(), SinkError>;

    fn create_table(&mut self, rows: usize, cols: usize) -> Result<TableHandle, SinkError>;

    fn set_cell_text(
        &mut self,
        table: TableHandle,
        row: usize,
        col: usize,
        text: &str,
    ) -> Result<(), SinkError>;

    /// Merge the rectangle spanned by two corner cells, inclusive.
    fn merge_cells(
        &mut self,
        table: TableHandle,
        from: (usize, usize),
        to: (usize, usize),
    ) -> Result<(), SinkError>;

    /// Optional: sinks without style support keep the default.
    fn set_table_style(&mut self, table: TableHandle, style: &str) -> Result<(), SinkError> {
        let _ = (table, style);
        Ok(())
    }
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DocOp {
    Heading {
        text: String,
        level: HeadingLevel,
    },
    Paragraph {
        text: String,
        kind: ParagraphKind,
        style: Option<String>,
    },
    PageBreak,
    CreateTable {
        table: TableHandle,
        rows: usize,
        cols: usize,
    },
    SetCellText {
        table: TableHandle,
        row: usize,
        col: usize,
        text: String,
    },
    MergeCells {
        table: TableHandle,
        from: (usize, usize),
        to: (usize, usize),
    },
    SetTableStyle {
        table: TableHandle,
        style: String,
    },
}

/// Sink that records every call in order.
#[derive(Debug, Default, Clone)]
pub struct OpRecorder {
    ops: Vec<DocOp>,
    tables: usize,
}

impl OpRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DocOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<DocOp> {
        self.ops
    }
}

impl DocumentSink for OpRecorder {
    fn add_heading(&mut self, text: &str, level: HeadingLevel) -> Result<(), SinkError> {
        self.ops.push(DocOp::Heading {
            text: text.to_string(),
            level,
        });
        Ok(())
    }

    fn add_paragraph(
        &mut self,
        text: &str,
        kind: ParagraphKind,
        style: Option<&str>,
    ) -> Result<(), SinkError> {
        self.ops.push(DocOp::Paragraph {
            text: text.to_string(),
            kind,
            style: style.map(str::to_string),
        });
        Ok(())
    }

    fn add_page_break(&mut self) -> Result<(), SinkError> {
        self.ops.push(DocOp::PageBreak);
        Ok(())
    }

    fn create_table(&mut self, rows: usize, cols: usize) -> Result<TableHandle, SinkError> {
        let table = TableHandle(self.tables);
        self.tables += 1;
        self.ops.push(DocOp::CreateTable { table, rows, cols });
        Ok(table)
    }

    fn set_cell_text(
        &mut self,
        table: TableHandle,
        row: usize,
        col: usize,
        text: &str,
    ) -> Result<(), SinkError> {
        if table.0 >= self.tables {
            return Err(SinkError::UnknownTable(table.0));
        }
        self.ops.push(DocOp::SetCellText {
            table,
            row,
            col,
            text: text.to_string(),
        });
        Ok(())
    }

    fn merge_cells(
        &mut self,
        table: TableHandle,
        from: (usize, usize),
        to: (usize, usize),
    ) -> Result<(), SinkError> {
        if table.0 >= self.tables {
            return Err(SinkError::UnknownTable(table.0));
        }
        self.ops.push(DocOp::MergeCells { table, from, to });
        Ok(())
    }

    fn set_table_style(&mut self, table: TableHandle, style: &str) -> Result<(), SinkError> {
        if table.0 >= self.tables {
            return Err(SinkError::UnknownTable(table.0));
        }
        self.ops.push(DocOp::SetTableStyle {
            table,
            style: style.to_string(),
        });
        Ok(())
    }
}
