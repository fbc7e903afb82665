//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! The layout extractor takes the raw PDF as its request body, so nothing
//! here touches the file system beyond reading the local file. Both paths
//! check the `%PDF` magic before returning so callers get a meaningful error
//! instead of an opaque rejection from the extraction service.

use crate::error::Pdf2DocxError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF ready to send to the extractor.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// File stem used to name the output (`paper` for `paper.pdf`).
    pub stem: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL to PDF bytes.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2DocxError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Pdf2DocxError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input)).await
    }
}

/// Read a local file, validating existence, permissions and PDF magic.
pub async fn resolve_local(path: &Path) -> Result<ResolvedInput, Pdf2DocxError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2DocxError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Pdf2DocxError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };
    check_magic(&bytes, path)?;

    debug!("Resolved local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput {
        stem: stem_of(path),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2DocxError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2DocxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let download_err = |e: reqwest::Error| {
        if e.is_timeout() {
            Pdf2DocxError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2DocxError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(download_err)?;
    if !response.status().is_success() {
        return Err(Pdf2DocxError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(download_err)?.to_vec();
    let filename = filename_from_url(url);
    check_magic(&bytes, Path::new(&filename))?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(ResolvedInput {
        stem: stem_of(Path::new(&filename)),
        bytes,
    })
}

fn check_magic(bytes: &[u8], path: &Path) -> Result<(), Pdf2DocxError> {
    if !bytes.starts_with(PDF_MAGIC) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2DocxError::NotAPdf {
            path: PathBuf::from(path),
            magic,
        });
    }
    Ok(())
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Last path segment of the URL, or `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}
