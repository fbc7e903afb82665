//! Error types for the edgequake-pdf2docx library.
//!
//! Failures come in three sizes, and each has its own type:
//!
//! * [`Pdf2DocxError`]: **Fatal for one document**: the PDF cannot be read,
//!   the OCR extractor refused it, or the DOCX could not be assembled or
//!   saved. Returned as `Err` from the `convert*` functions. Inside a batch
//!   it is recorded against that document and the batch moves on.
//!
//! * [`BlockError`]: **Non-fatal, one block**: a formula or description
//!   call failed, or a table's markup was malformed. The block is skipped,
//!   the error is stored in [`crate::output::ConversionOutput`] and the rest
//!   of the document is still written.
//!
//! * [`ResolverError`], [`TableError`], [`SinkError`]: the raw failure of
//!   one collaborator call, one table build or one document primitive. They
//!   are folded into one of the two types above by the router.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2docx library.
#[derive(Debug, Error)]
pub enum Pdf2DocxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The batch input directory holds no regular files.
    #[error("No input documents found in '{dir}'")]
    NoInputs { dir: PathBuf },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The OCR extraction call failed or returned unparseable JSON.
    #[error("Layout extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    /// The OCR service answered but refused the document.
    #[error("Layout extraction rejected by service (code {code}): {message}")]
    ExtractionRejected { code: i64, message: String },

    /// A resolver required by the configured image mode is missing.
    #[error("Resolver '{resolver}' is not configured.\n{hint}")]
    ResolverNotConfigured { resolver: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// A document primitive failed while assembling the output.
    #[error("Failed to assemble document: {0}")]
    DocumentBuildFailed(#[from] SinkError),

    /// Could not create or write the output DOCX file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single block.
///
/// The router logs it, skips the block and keeps going.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlockError {
    /// A formula, description or image-download call failed.
    #[error("Block {index}: {resolver} failed: {detail}")]
    Resolver {
        index: usize,
        resolver: String,
        detail: String,
    },

    /// The table markup could not be turned into a grid.
    #[error("Block {index}: malformed table markup: {detail}")]
    MalformedTable { index: usize, detail: String },

    /// The extractor produced a block type the router does not know.
    #[error("Block {index}: unknown block type '{kind}'")]
    UnknownKind { index: usize, kind: String },
}

impl BlockError {
    /// Index of the offending block in the extracted sequence.
    pub fn index(&self) -> usize {
        match self {
            BlockError::Resolver { index, .. }
            | BlockError::MalformedTable { index, .. }
            | BlockError::UnknownKind { index, .. } => *index,
        }
    }
}

/// Failure of one call to an external collaborator.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Connection, TLS or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The call exceeded its timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response could not be decoded into the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The service reported a failure in its own envelope.
    #[error("service error: {0}")]
    Service(String),

    /// The local inference process failed.
    #[error("model error: {0}")]
    Model(String),

    /// Image bytes could not be decoded or re-encoded.
    #[error("image error: {0}")]
    Image(String),

    /// Scratch-file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No resolver is wired up for this path.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl ResolverError {
    /// Map a reqwest failure, keeping timeouts distinguishable.
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            ResolverError::Timeout { secs: timeout_secs }
        } else {
            ResolverError::Transport(e.to_string())
        }
    }
}

/// Table markup that cannot be reconstructed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    /// The markup contains no `<table>` element.
    #[error("no <table> element found")]
    NoTable,

    /// A table has no `<tr>` rows.
    #[error("table has no rows")]
    NoRows,

    /// Row 0 has no cells, so the column count is undefined.
    #[error("first row has no cells")]
    EmptyHeaderRow,

    /// A `colspan`/`rowspan` attribute is not a number or is too large.
    #[error("invalid {attr} value '{value}' in row {row}")]
    InvalidSpan {
        row: usize,
        attr: &'static str,
        value: String,
    },

    /// A cell or merge span falls outside the declared grid.
    #[error("position ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// A span claims a position another span already covers.
    #[error("span at ({row}, {col}) overlaps an earlier span")]
    OverlappingSpans { row: usize, col: usize },

    /// The declared grid has more cells than a table may hold.
    #[error("{rows}x{cols} grid exceeds the {max}-cell limit")]
    TooLarge { rows: usize, cols: usize, max: usize },
}

/// Failure of a document-sink primitive.
#[derive(Debug, Error)]
pub enum SinkError {
    /// A table handle that the sink never issued.
    #[error("unknown table handle {0}")]
    UnknownTable(usize),

    /// A cell address outside the table.
    #[error("cell ({row}, {col}) is outside table {table}")]
    CellOutOfRange { table: usize, row: usize, col: usize },

    /// Two merge spans overlap.
    #[error("merge ({r0}, {c0})-({r1}, {c1}) overlaps an existing merge in table {table}")]
    OverlappingMerge {
        table: usize,
        r0: usize,
        c0: usize,
        r1: usize,
        c1: usize,
    },

    /// A table larger than the sink accepts.
    #[error("table {rows}x{cols} exceeds the {max}-cell limit")]
    TableTooLarge { rows: usize, cols: usize, max: usize },

    /// Serialising the document failed.
    #[error("serialisation failed: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_rejected_display() {
        let e = Pdf2DocxError::ExtractionRejected {
            code: 40101,
            message: "bad app id".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("40101"), "got: {msg}");
        assert!(msg.contains("bad app id"));
    }

    #[test]
    fn block_error_display_and_index() {
        let e = BlockError::Resolver {
            index: 7,
            resolver: "formula".into(),
            detail: "HTTP 500: oops".into(),
        };
        assert_eq!(e.index(), 7);
        assert!(e.to_string().contains("Block 7"));
        assert!(e.to_string().contains("formula"));
    }

    #[test]
    fn sink_error_converts_to_fatal() {
        let e: Pdf2DocxError = SinkError::UnknownTable(3).into();
        assert!(matches!(e, Pdf2DocxError::DocumentBuildFailed(_)));
        assert!(e.to_string().contains("unknown table handle 3"));
    }

    #[test]
    fn table_error_out_of_bounds_display() {
        let e = TableError::OutOfBounds {
            row: 1,
            col: 4,
            rows: 2,
            cols: 3,
        };
        assert_eq!(e.to_string(), "position (1, 4) is outside the 2x3 grid");
    }

    #[test]
    fn resolver_timeout_display() {
        let e = ResolverError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}
