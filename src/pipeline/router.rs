//! The routing pass: one walk over the block list, in order, emitting
//! structural operations into a [`DocumentSink`].
//!
//! Per block the router:
//! 1. emits page breaks for any page-id increase (per [`PageBreakMode`])
//! 2. dispatches on the block kind:
//!    - paragraphs go through [`classify`] and the Preamble/MainBody cursor
//!    - tables are planned by [`table::build_tables`] and applied whole
//!    - images take the description, formula or local-batch path, chosen
//!      by looking at the *next* block's text
//!
//! Resolver failures and malformed tables skip only their block; the error
//! is collected and the walk continues. Sink failures are fatal.

use crate::config::{ConversionConfig, ImageMode, PageBreakMode};
use crate::error::{BlockError, Pdf2DocxError, ResolverError};
use crate::output::DocumentStats;
use crate::pipeline::blocks::{BlockKind, ContentBlock};
use crate::pipeline::classify::{classify, Region, Role};
use crate::pipeline::postprocess::{clean_description, clean_latex};
use crate::pipeline::table;
use crate::resolvers::{local_model, Resolvers};
use crate::sink::{
    DocumentSink, ParagraphKind, COMPACT_PARAGRAPH_STYLE, TABLE_STYLE,
};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Running state for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentCursor {
    pub region: Region,
    pub current_page: u32,
}

impl DocumentCursor {
    /// Start in the preamble on the first block's page (page 1 if empty).
    pub fn new(blocks: &[ContentBlock]) -> Self {
        Self {
            region: Region::Preamble,
            current_page: blocks.first().map_or(1, |b| b.page_id),
        }
    }
}

/// Number of page breaks to emit before a block on `next_page`.
pub fn page_breaks_before(mode: PageBreakMode, current_page: u32, next_page: u32) -> u32 {
    if next_page <= current_page {
        return 0;
    }
    match mode {
        PageBreakMode::Disabled => 0,
        PageBreakMode::EveryPage => next_page - current_page,
        PageBreakMode::OncePerBlock => 1,
    }
}

/// What the routing pass produced besides the sink calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    pub stats: DocumentStats,
    pub errors: Vec<BlockError>,
}

/// How an image block is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImagePath<'b> {
    Describe { caption: &'b str },
    Formula,
    LocalBatch,
}

/// Walks a block list for one document.
pub struct ContentRouter<'a> {
    config: &'a ConversionConfig,
    resolvers: &'a Resolvers,
}

/// Per-document mutable state that is not part of the cursor.
struct Run {
    outcome: RouteOutcome,
    scratch: Option<TempDir>,
    staged: usize,
}

impl<'a> ContentRouter<'a> {
    pub fn new(config: &'a ConversionConfig, resolvers: &'a Resolvers) -> Self {
        Self { config, resolvers }
    }

    /// Route `blocks` into `sink`.
    ///
    /// Returns `Err` only when the sink itself fails.
    pub async fn route<S>(
        &self,
        blocks: &[ContentBlock],
        sink: &mut S,
    ) -> Result<RouteOutcome, Pdf2DocxError>
    where
        S: DocumentSink + ?Sized,
    {
        let mut cursor = DocumentCursor::new(blocks);
        let mut run = Run {
            outcome: RouteOutcome::default(),
            scratch: None,
            staged: 0,
        };
        run.outcome.stats.total_blocks = blocks.len();

        let mut iter = blocks.iter().enumerate().peekable();
        while let Some((index, block)) = iter.next() {
            let next = iter.peek().map(|&(_, b)| b);

            self.emit_page_breaks(&mut cursor, block, sink, &mut run)?;

            match block.kind {
                BlockKind::Paragraph => self.route_paragraph(&mut cursor, block, sink, &mut run)?,
                BlockKind::Table => self.route_table(index, block, sink, &mut run)?,
                BlockKind::Image => self.route_image(index, block, next, sink, &mut run).await?,
                BlockKind::Other(ref kind) => {
                    warn!("Block {}: unknown block type '{}', skipped", index, kind);
                    run.outcome.stats.unknown_blocks += 1;
                    run.outcome.errors.push(BlockError::UnknownKind {
                        index,
                        kind: kind.clone(),
                    });
                }
            }
        }

        // Scratch directory (if any) is removed here
        drop(run.scratch);
        Ok(run.outcome)
    }

    fn emit_page_breaks<S: DocumentSink + ?Sized>(
        &self,
        cursor: &mut DocumentCursor,
        block: &ContentBlock,
        sink: &mut S,
        run: &mut Run,
    ) -> Result<(), Pdf2DocxError> {
        if !self.config.page_breaks.is_enabled() || block.page_id <= cursor.current_page {
            return Ok(());
        }
        let breaks = page_breaks_before(self.config.page_breaks, cursor.current_page, block.page_id);
        for _ in 0..breaks {
            sink.add_page_break()?;
        }
        debug!(
            "Page {} → {}: {} break(s)",
            cursor.current_page, block.page_id, breaks
        );
        run.outcome.stats.page_breaks += breaks as usize;
        cursor.current_page = block.page_id;
        Ok(())
    }

    fn body_style(&self) -> Option<&'static str> {
        self.config
            .apply_custom_styles
            .then_some(COMPACT_PARAGRAPH_STYLE)
    }

    fn route_paragraph<S: DocumentSink + ?Sized>(
        &self,
        cursor: &mut DocumentCursor,
        block: &ContentBlock,
        sink: &mut S,
        run: &mut Run,
    ) -> Result<(), Pdf2DocxError> {
        let decision = classify(block, cursor.region, self.config.min_footer_chars);
        if decision.region != cursor.region {
            debug!("Entering main body at '{}'", block.text);
        }
        cursor.region = decision.region;

        let stats = &mut run.outcome.stats;
        match decision.role {
            Role::Dropped => stats.dropped_footers += 1,
            Role::Footer => {
                let style = self.config.compact_footers.then_some(COMPACT_PARAGRAPH_STYLE);
                sink.add_paragraph(&block.text, ParagraphKind::Footer, style)?;
                stats.footers += 1;
            }
            Role::Heading(level) => {
                sink.add_heading(&block.text, level)?;
                stats.headings += 1;
            }
            Role::Body => {
                sink.add_paragraph(&block.text, ParagraphKind::Body, self.body_style())?;
                stats.body_paragraphs += 1;
            }
        }
        Ok(())
    }

    fn route_table<S: DocumentSink + ?Sized>(
        &self,
        index: usize,
        block: &ContentBlock,
        sink: &mut S,
        run: &mut Run,
    ) -> Result<(), Pdf2DocxError> {
        let plans = match table::build_tables(&block.text) {
            Ok(plans) => plans,
            Err(e) => {
                warn!("Block {}: malformed table skipped: {}", index, e);
                run.outcome.stats.failed_blocks += 1;
                run.outcome.errors.push(BlockError::MalformedTable {
                    index,
                    detail: e.to_string(),
                });
                return Ok(());
            }
        };

        let style = self.config.apply_custom_styles.then_some(TABLE_STYLE);
        for plan in &plans {
            debug!(
                "Block {}: table {}x{} with {} merge(s)",
                index,
                plan.rows,
                plan.cols,
                plan.merges.len()
            );
            plan.apply(sink, style)?;
            run.outcome.stats.tables += 1;
        }
        Ok(())
    }

    fn image_path<'b>(&self, next: Option<&'b ContentBlock>) -> ImagePath<'b> {
        match self.config.image_mode {
            ImageMode::LocalBatch => ImagePath::LocalBatch,
            ImageMode::Formula => ImagePath::Formula,
            ImageMode::DescriptionOrFormula => match next {
                Some(b) if b.text.starts_with(self.config.figure_caption_prefix.as_str()) => {
                    ImagePath::Describe { caption: &b.text }
                }
                _ => ImagePath::Formula,
            },
        }
    }

    async fn route_image<S: DocumentSink + ?Sized>(
        &self,
        index: usize,
        block: &ContentBlock,
        next: Option<&ContentBlock>,
        sink: &mut S,
        run: &mut Run,
    ) -> Result<(), Pdf2DocxError> {
        let path = self.image_path(next);

        let Some(url) = block.image_url.as_deref() else {
            self.block_failed(
                run,
                index,
                "image",
                ResolverError::InvalidResponse("image block has no image_url".to_string()),
            );
            return Ok(());
        };

        match path {
            ImagePath::Describe { caption } => {
                debug!("Block {}: describing figure '{}'", index, caption);
                match self.describe(url, caption).await {
                    Ok(text) => {
                        sink.add_paragraph(&text, ParagraphKind::Description, None)?;
                        run.outcome.stats.descriptions += 1;
                    }
                    Err(e) => self.block_failed(run, index, "description", e),
                }
            }
            ImagePath::Formula => {
                debug!("Block {}: recognising formula", index);
                match self.recognize(url).await {
                    Ok(latex) => {
                        sink.add_paragraph(&format!("${latex}$"), ParagraphKind::Formula, None)?;
                        run.outcome.stats.formulas += 1;
                    }
                    Err(e) => self.block_failed(run, index, "formula", e),
                }
            }
            ImagePath::LocalBatch => {
                debug!("Block {}: running local formula model", index);
                match self.recognize_local(url, run).await {
                    Ok(results) => {
                        for latex in results {
                            sink.add_paragraph(&latex, ParagraphKind::Formula, self.body_style())?;
                            run.outcome.stats.formulas += 1;
                        }
                    }
                    Err(e) => self.block_failed(run, index, "local model", e),
                }
            }
        }
        Ok(())
    }

    fn block_failed(&self, run: &mut Run, index: usize, resolver: &str, e: ResolverError) {
        warn!("Block {}: {} failed, block skipped: {}", index, resolver, e);
        run.outcome.stats.failed_blocks += 1;
        run.outcome.errors.push(BlockError::Resolver {
            index,
            resolver: resolver.to_string(),
            detail: e.to_string(),
        });
    }

    async fn describe(&self, url: &str, caption: &str) -> Result<String, ResolverError> {
        let describer = self
            .resolvers
            .describer
            .as_ref()
            .ok_or(ResolverError::NotConfigured("image describer"))?;
        let text = clean_description(&describer.describe(url, caption).await?);
        if text.is_empty() {
            return Err(ResolverError::InvalidResponse("empty description".to_string()));
        }
        Ok(text)
    }

    async fn recognize(&self, url: &str) -> Result<String, ResolverError> {
        let formula = self
            .resolvers
            .formula
            .as_ref()
            .ok_or(ResolverError::NotConfigured("formula recogniser"))?;
        let bytes = self.resolvers.images.fetch(url).await?;
        Ok(clean_latex(&formula.recognize(&bytes).await?))
    }

    async fn recognize_local(&self, url: &str, run: &mut Run) -> Result<Vec<String>, ResolverError> {
        let model = self
            .resolvers
            .batch_model
            .as_ref()
            .ok_or(ResolverError::NotConfigured("local formula model"))?;
        let bytes = self.resolvers.images.fetch(url).await?;

        if run.scratch.is_none() {
            run.scratch = Some(tempfile::Builder::new().prefix("pdf2docx-").tempdir()?);
        }
        let Some(dir) = run.scratch.as_ref().map(|d| d.path().to_path_buf()) else {
            return Err(ResolverError::NotConfigured("scratch directory"));
        };

        let staged = local_model::stage_image(&dir, run.staged, &bytes).await?;
        run.staged += 1;
        let result = model.recognize_dir(&dir).await;
        if let Err(e) = tokio::fs::remove_file(&staged).await {
            warn!("Could not remove scratch image {}: {}", staged.display(), e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::title::HeadingLevel;
    use crate::resolvers::{FormulaRecognizer, ImageDescriber, ImageSource};
    use crate::sink::{DocOp, OpRecorder};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct StaticImages;

    #[async_trait]
    impl ImageSource for StaticImages {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResolverError> {
            if url.contains("missing") {
                return Err(ResolverError::Status {
                    status: 404,
                    body: String::new(),
                });
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    struct EchoFormula;

    #[async_trait]
    impl FormulaRecognizer for EchoFormula {
        async fn recognize(&self, image: &[u8]) -> Result<String, ResolverError> {
            Ok(format!("$x_{}$", image.len()))
        }
    }

    #[derive(Default)]
    struct RecordingDescriber {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ImageDescriber for RecordingDescriber {
        async fn describe(&self, image_url: &str, caption: &str) -> Result<String, ResolverError> {
            self.calls
                .lock()
                .unwrap()
                .push((image_url.to_string(), caption.to_string()));
            Ok(format!("```\nexplains {caption}\n```"))
        }
    }

    fn resolvers(describer: Arc<RecordingDescriber>) -> Resolvers {
        Resolvers::new(Arc::new(StaticImages))
            .with_formula(Arc::new(EchoFormula))
            .with_describer(describer)
    }

    fn config(mode: PageBreakMode) -> ConversionConfig {
        ConversionConfig::builder().page_breaks(mode).build().unwrap()
    }

    async fn route(blocks: &[ContentBlock], config: &ConversionConfig) -> (Vec<DocOp>, RouteOutcome) {
        let r = resolvers(Arc::new(RecordingDescriber::default()));
        let mut rec = OpRecorder::new();
        let outcome = ContentRouter::new(config, &r)
            .route(blocks, &mut rec)
            .await
            .unwrap();
        (rec.into_ops(), outcome)
    }

    fn breaks_before_each(ops: &[DocOp]) -> Vec<usize> {
        let mut counts = vec![0];
        for op in ops {
            match op {
                DocOp::PageBreak => *counts.last_mut().unwrap() += 1,
                _ => counts.push(0),
            }
        }
        counts.pop();
        counts
    }

    #[test]
    fn page_break_counts_per_mode() {
        assert_eq!(page_breaks_before(PageBreakMode::EveryPage, 2, 4), 2);
        assert_eq!(page_breaks_before(PageBreakMode::OncePerBlock, 2, 4), 1);
        assert_eq!(page_breaks_before(PageBreakMode::Disabled, 2, 4), 0);
        assert_eq!(page_breaks_before(PageBreakMode::EveryPage, 4, 4), 0);
        assert_eq!(page_breaks_before(PageBreakMode::EveryPage, 4, 3), 0);
    }

    #[test]
    fn cursor_starts_on_first_page() {
        assert_eq!(DocumentCursor::new(&[]).current_page, 1);
        let blocks = [ContentBlock::paragraph("x", 3)];
        assert_eq!(DocumentCursor::new(&blocks).current_page, 3);
    }

    #[tokio::test]
    async fn page_ids_drive_breaks() {
        let blocks: Vec<_> = [1, 1, 2, 2, 4]
            .iter()
            .map(|&p| ContentBlock::paragraph("text", p))
            .collect();

        let (ops, outcome) = route(&blocks, &config(PageBreakMode::EveryPage)).await;
        assert_eq!(breaks_before_each(&ops), vec![0, 0, 1, 0, 2]);
        assert_eq!(outcome.stats.page_breaks, 3);

        let (ops, _) = route(&blocks, &config(PageBreakMode::OncePerBlock)).await;
        assert_eq!(breaks_before_each(&ops), vec![0, 0, 1, 0, 1]);

        let (ops, _) = route(&blocks, &config(PageBreakMode::Disabled)).await;
        assert!(!ops.contains(&DocOp::PageBreak));
    }

    #[tokio::test]
    async fn trigger_heading_not_reprocessed() {
        let blocks = vec![
            ContentBlock::footer("Journal of Things", 1),
            ContentBlock::paragraph("1 Introduction", 1).with_outline(0),
            ContentBlock::paragraph("Body.", 1),
        ];
        let (ops, outcome) = route(&blocks, &config(PageBreakMode::EveryPage)).await;
        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[1],
            DocOp::Heading {
                text: "1 Introduction".into(),
                level: HeadingLevel::TOP
            }
        );
        assert!(matches!(ops[2], DocOp::Paragraph { kind: ParagraphKind::Body, .. }));
        assert_eq!(outcome.stats.headings, 1);
        assert_eq!(outcome.stats.footers, 1);
    }

    #[tokio::test]
    async fn caption_routes_to_describer() {
        let describer = Arc::new(RecordingDescriber::default());
        let r = resolvers(Arc::clone(&describer));
        let blocks = vec![
            ContentBlock::image("https://img/fig.png", 1),
            ContentBlock::paragraph("图 1 系统结构", 1),
        ];
        let config = ConversionConfig::default();
        let mut rec = OpRecorder::new();
        ContentRouter::new(&config, &r)
            .route(&blocks, &mut rec)
            .await
            .unwrap();

        assert_eq!(
            describer.calls.lock().unwrap().as_slice(),
            [("https://img/fig.png".to_string(), "图 1 系统结构".to_string())]
        );
        assert_eq!(
            rec.ops()[0],
            DocOp::Paragraph {
                text: "explains 图 1 系统结构".into(),
                kind: ParagraphKind::Description,
                style: None
            }
        );
    }

    #[tokio::test]
    async fn trailing_image_takes_formula_path() {
        let blocks = vec![
            ContentBlock::paragraph("Body", 1),
            ContentBlock::image("abc", 1),
        ];
        let (ops, outcome) = route(&blocks, &ConversionConfig::default()).await;
        assert_eq!(
            ops[1],
            DocOp::Paragraph {
                text: "$x_3$".into(),
                kind: ParagraphKind::Formula,
                style: None
            }
        );
        assert_eq!(outcome.stats.formulas, 1);
    }

    #[tokio::test]
    async fn failed_fetch_skips_only_that_block() {
        let blocks = vec![
            ContentBlock::image("https://img/missing.png", 1),
            ContentBlock::paragraph("After", 1),
        ];
        let (ops, outcome) = route(&blocks, &ConversionConfig::default()).await;
        assert_eq!(ops.len(), 1);
        assert_eq!(outcome.stats.failed_blocks, 1);
        assert!(matches!(
            &outcome.errors[0],
            BlockError::Resolver { index: 0, resolver, .. } if resolver == "formula"
        ));
    }

    #[tokio::test]
    async fn malformed_table_is_skipped() {
        let blocks = vec![
            ContentBlock::table("<table></table>", 1),
            ContentBlock::table("<table><tr><td>A</td></tr></table>", 1),
        ];
        let (ops, outcome) = route(&blocks, &ConversionConfig::default()).await;
        assert_eq!(outcome.stats.tables, 1);
        assert!(matches!(outcome.errors[0], BlockError::MalformedTable { index: 0, .. }));
        assert!(matches!(ops[0], DocOp::CreateTable { rows: 1, cols: 1, .. }));
    }

    #[tokio::test]
    async fn unknown_kind_logged_and_skipped() {
        let mut odd = ContentBlock::paragraph("x", 1);
        odd.kind = BlockKind::Other("formula".into());
        let (ops, outcome) = route(&[odd], &ConversionConfig::default()).await;
        assert!(ops.is_empty());
        assert_eq!(outcome.stats.unknown_blocks, 1);
    }

    #[tokio::test]
    async fn styles_follow_config() {
        let blocks = vec![
            ContentBlock::footer("Running title", 1),
            ContentBlock::paragraph("Body", 1),
            ContentBlock::table("<table><tr><td>A</td></tr></table>", 1),
        ];
        let plain = ConversionConfig::builder()
            .apply_custom_styles(false)
            .compact_footers(false)
            .build()
            .unwrap();
        let (ops, _) = route(&blocks, &plain).await;
        assert!(ops.iter().all(|op| !matches!(op, DocOp::SetTableStyle { .. })));
        assert!(matches!(&ops[0], DocOp::Paragraph { style: None, .. }));
        assert!(matches!(&ops[1], DocOp::Paragraph { style: None, .. }));

        let (ops, _) = route(&blocks, &ConversionConfig::default()).await;
        assert!(matches!(&ops[0], DocOp::Paragraph { style: Some(s), .. } if s == COMPACT_PARAGRAPH_STYLE));
        assert!(ops.iter().any(|op| matches!(op, DocOp::SetTableStyle { .. })));
    }
}
