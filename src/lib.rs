//! # edgequake-pdf2docx
//!
//! Convert scanned PDF documents into structured Word documents.
//!
//! An OCR layout service turns the PDF into a flat list of blocks
//! (paragraphs, images, tables) with layout hints. This crate rebuilds the
//! document structure from that list: headings with depth, body text,
//! footers, merged tables, page breaks, formulas as LaTeX and figure
//! explanations from a vision model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Extract  TextIn layout OCR → ordered blocks
//!  ├─ 3. Route    one ordered pass: classify paragraphs, plan tables,
//!  │              resolve images (SimpleTex / vision model / local model)
//!  ├─ 4. Sink     docx-rs document, or a recorded operation list
//!  └─ 5. Output   atomic .docx write + per-document stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2docx::{convert_to_file, ConversionConfig, Resolvers, SimpleTexConfig, TextInConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .textin(TextInConfig::new("app-id", "secret-code"))
//!         .simpletex(SimpleTexConfig::new("app-id", "app-secret"))
//!         .build()?;
//!     let resolvers = Resolvers::from_config(&config).await?;
//!     let output = convert_to_file("paper.pdf", "paper.docx", &config, &resolvers).await?;
//!     eprintln!("{} blocks, {} skipped", output.stats.total_blocks, output.errors.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2docx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod resolvers;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, Device, ImageMode, LocalModelConfig, PageBreakMode,
    SimpleTexConfig, TextInConfig, VisionConfig,
};
pub use convert::{convert, convert_batch, convert_blocks, convert_to_file, extract_blocks};
pub use error::{BlockError, Pdf2DocxError, ResolverError, SinkError, TableError};
pub use output::{BatchReport, ConversionOutput, DocumentOutcome, DocumentStats};
pub use pipeline::blocks::{BlockKind, ContentBlock};
pub use pipeline::title::HeadingLevel;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use resolvers::{
    BatchFormulaModel, FormulaRecognizer, ImageDescriber, ImageSource, LayoutExtractor, Resolvers,
};
pub use sink::{DocOp, DocumentSink, DocxBuilder, OpRecorder, ParagraphKind};
