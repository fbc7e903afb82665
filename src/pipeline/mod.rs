//! Pipeline stages for PDF-to-DOCX conversion.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ blocks ──▶ router ──▶ sink
//! (path/URL)  (OCR)    (normalise)  │         (docx / recorder)
//!                                   ├─ classify + title   paragraphs
//!                                   ├─ table              HTML tables
//!                                   └─ resolvers          images
//! ```
//!
//! 1. [`input`]: read a local PDF or download a URL, checking the magic bytes
//! 2. [`blocks`]: parse the extractor response into [`blocks::ContentBlock`]s
//! 3. [`router`]: the single ordered pass that decides every structural
//!    operation
//! 4. [`classify`] / [`title`]: footer, heading and body decisions for
//!    paragraph blocks
//! 5. [`table`]: HTML markup to grid placements and merge spans
//! 6. [`postprocess`]: cleanup of formula and description text before it is
//!    written

pub mod blocks;
pub mod classify;
pub mod input;
pub mod postprocess;
pub mod router;
pub mod table;
pub mod title;
