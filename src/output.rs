//! Results returned by the conversion entry points.

use crate::error::BlockError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Counts for one routed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    /// Blocks returned by the extractor.
    pub total_blocks: usize,
    pub headings: usize,
    pub body_paragraphs: usize,
    pub footers: usize,
    /// Footer-like blocks too short to keep.
    pub dropped_footers: usize,
    pub tables: usize,
    /// Formula paragraphs, from either recogniser.
    pub formulas: usize,
    pub descriptions: usize,
    pub page_breaks: usize,
    /// Blocks skipped because of a [`BlockError`].
    pub failed_blocks: usize,
    /// Blocks of a type the router does not handle.
    pub unknown_blocks: usize,
    /// Wall-clock time for extraction, routing and serialisation.
    pub duration_ms: u64,
}

/// A converted document.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// File stem of the input, used to name the output.
    pub name: String,
    /// The serialised `.docx` package.
    pub docx: Vec<u8>,
    /// Per-block failures; the document was still written.
    pub errors: Vec<BlockError>,
    pub stats: DocumentStats,
}

/// Outcome for one document of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub input: PathBuf,
    /// Written file, when the conversion succeeded.
    pub output: Option<PathBuf>,
    pub stats: Option<DocumentStats>,
    #[serde(default)]
    pub block_errors: Vec<BlockError>,
    /// Fatal error that stopped this document.
    pub error: Option<String>,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of [`crate::convert_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per input, in input (name) order.
    pub documents: Vec<DocumentOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl BatchReport {
    /// True when every document was written.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.documents.iter().filter(|d| !d.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, error: Option<&str>) -> DocumentOutcome {
        DocumentOutcome {
            input: PathBuf::from(name),
            output: error.is_none().then(|| PathBuf::from(format!("{name}.docx"))),
            stats: None,
            block_errors: Vec::new(),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn report_lists_failures() {
        let report = BatchReport {
            documents: vec![outcome("a", None), outcome("b", Some("rejected"))],
            succeeded: 1,
            failed: 1,
            duration_ms: 5,
        };
        assert!(!report.all_succeeded());
        let failed: Vec<_> = report.failures().map(|d| d.input.clone()).collect();
        assert_eq!(failed, vec![PathBuf::from("b")]);
    }

    #[test]
    fn outcome_serialises_block_errors() {
        let mut o = outcome("a", None);
        o.block_errors.push(BlockError::UnknownKind {
            index: 4,
            kind: "formula".into(),
        });
        let json = serde_json::to_string(&o).unwrap();
        assert!(json.contains("UnknownKind"), "got: {json}");
        let back: DocumentOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back.block_errors.len(), 1);
    }
}
