//! Conversion entry points.
//!
//! | Function | Does |
//! |----------|------|
//! | [`extract_blocks`] | input → extractor → block list |
//! | [`convert_blocks`] | block list → any [`DocumentSink`] |
//! | [`convert`] | input → `.docx` bytes |
//! | [`convert_to_file`] | input → `.docx` file (atomic write) |
//! | [`convert_batch`] | directory → directory, documents in parallel |

use crate::config::ConversionConfig;
use crate::error::Pdf2DocxError;
use crate::output::{BatchReport, ConversionOutput, DocumentOutcome};
use crate::pipeline::blocks::ContentBlock;
use crate::pipeline::input;
use crate::pipeline::router::{ContentRouter, RouteOutcome};
use crate::resolvers::Resolvers;
use crate::sink::{DocumentSink, DocxBuilder};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Resolve `input` (path or URL) and run the layout extractor on it.
pub async fn extract_blocks(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
    resolvers: &Resolvers,
) -> Result<Vec<ContentBlock>, Pdf2DocxError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    extract_resolved(&resolved, resolvers).await
}

async fn extract_resolved(
    resolved: &input::ResolvedInput,
    resolvers: &Resolvers,
) -> Result<Vec<ContentBlock>, Pdf2DocxError> {
    let extractor = resolvers
        .extractor
        .as_ref()
        .ok_or_else(|| Pdf2DocxError::ResolverNotConfigured {
            resolver: "layout extractor".to_string(),
            hint: "Set TEXTIN_API_ID and TEXTIN_API_CODE, or pass --textin-app-id/--textin-secret."
                .to_string(),
        })?;

    let blocks = extractor.extract(&resolved.bytes).await?;
    info!("{}: extracted {} blocks", resolved.stem, blocks.len());
    Ok(blocks)
}

/// Route an already-extracted block list into `sink`.
///
/// Sink-agnostic: pass an [`crate::sink::OpRecorder`] to inspect the
/// operation sequence without producing a file.
pub async fn convert_blocks<S>(
    blocks: &[ContentBlock],
    config: &ConversionConfig,
    resolvers: &Resolvers,
    sink: &mut S,
) -> Result<RouteOutcome, Pdf2DocxError>
where
    S: DocumentSink + ?Sized,
{
    ContentRouter::new(config, resolvers).route(blocks, sink).await
}

/// Convert a PDF file or URL to `.docx` bytes.
///
/// # Errors
/// Fatal for this document only:
/// - input not found, unreadable or not a PDF
/// - extractor missing, unreachable or refusing the document
/// - the document could not be assembled
///
/// Per-block failures are returned in [`ConversionOutput::errors`].
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
    resolvers: &Resolvers,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_resolved(&resolved, config, resolvers, start).await
}

async fn convert_resolved(
    resolved: &input::ResolvedInput,
    config: &ConversionConfig,
    resolvers: &Resolvers,
    start: Instant,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let blocks = extract_resolved(resolved, resolvers).await?;

    let mut builder = DocxBuilder::new();
    let RouteOutcome { mut stats, errors } =
        convert_blocks(&blocks, config, resolvers, &mut builder).await?;
    let docx = builder.to_bytes()?;

    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "{}: {} blocks, {} skipped, {} bytes, {}ms",
        resolved.stem,
        stats.total_blocks,
        stats.failed_blocks,
        docx.len(),
        stats.duration_ms
    );

    Ok(ConversionOutput {
        name: resolved.stem.clone(),
        docx,
        errors,
        stats,
    })
}

/// Convert a PDF and write the `.docx` to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
    resolvers: &Resolvers,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let output = convert(input_str, config, resolvers).await?;
    write_atomic(output_path.as_ref(), &output.docx).await?;
    Ok(output)
}

/// Write `bytes` to `path` via a sibling temporary file and a rename.
///
/// Parent directories are created as needed.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2DocxError> {
    let write_err = |e: std::io::Error| Pdf2DocxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_inputs(dir: &Path) -> Result<Vec<PathBuf>, Pdf2DocxError> {
    let entries = std::fs::read_dir(dir).map_err(|_| Pdf2DocxError::FileNotFound {
        path: dir.to_path_buf(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(Pdf2DocxError::NoInputs {
            dir: dir.to_path_buf(),
        });
    }
    Ok(files)
}

/// Convert every file in `input_dir` to `<stem>.docx` in `output_dir`.
///
/// At most `config.concurrency` documents are in flight. A failing document
/// is recorded in the report and the rest continue.
///
/// # Errors
/// Only when the batch cannot start: the input directory is missing or
/// empty, or the output directory cannot be created.
pub async fn convert_batch(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
    resolvers: &Resolvers,
) -> Result<BatchReport, Pdf2DocxError> {
    let start = Instant::now();
    let input_dir = input_dir.as_ref();
    let output_dir = output_dir.as_ref();

    let inputs = list_inputs(input_dir)?;
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Pdf2DocxError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let total = inputs.len();
    info!(
        "Batch: {} documents from {} → {} ({} at a time)",
        total,
        input_dir.display(),
        output_dir.display(),
        config.concurrency
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut documents: Vec<DocumentOutcome> = stream::iter(
        inputs
            .into_iter()
            .map(|path| convert_one(path, output_dir, config, resolvers)),
    )
    .buffer_unordered(config.concurrency)
    .collect()
    .await;
    documents.sort_by(|a, b| a.input.cmp(&b.input));

    let succeeded = documents.iter().filter(|d| d.is_success()).count();
    let report = BatchReport {
        failed: documents.len() - succeeded,
        succeeded,
        documents,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} documents, {}ms",
        report.succeeded, total, report.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, report.succeeded);
    }
    Ok(report)
}

async fn convert_one(
    path: PathBuf,
    output_dir: &Path,
    config: &ConversionConfig,
    resolvers: &Resolvers,
) -> DocumentOutcome {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(&name);
    }

    let result = async {
        let start = Instant::now();
        let resolved = input::resolve_local(&path).await?;
        let output = convert_resolved(&resolved, config, resolvers, start).await?;
        let out_path = output_dir.join(format!("{}.docx", output.name));
        write_atomic(&out_path, &output.docx).await?;
        Ok::<_, Pdf2DocxError>((out_path, output))
    }
    .await;

    match result {
        Ok((out_path, output)) => {
            info!("{}: written to {}", name, out_path.display());
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_complete(&name, output.stats.total_blocks);
            }
            DocumentOutcome {
                input: path,
                output: Some(out_path),
                stats: Some(output.stats),
                block_errors: output.errors,
                error: None,
            }
        }
        Err(e) => {
            warn!("{}: conversion failed: {}", name, e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_error(&name, &e.to_string());
            }
            DocumentOutcome {
                input: path,
                output: None,
                stats: None,
                block_errors: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}
