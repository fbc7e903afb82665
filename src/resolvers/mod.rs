//! External collaborators behind narrow async traits.
//!
//! The router only knows these traits. Each network or process adapter
//! receives its own settings struct at construction, so credentials never
//! live in process-wide state and tests can substitute in-memory fakes.
//!
//! | Trait | Production adapter | Used for |
//! |-------|--------------------|----------|
//! | [`LayoutExtractor`] | [`textin::TextInExtractor`] | PDF → block list |
//! | [`ImageSource`] | [`fetch::HttpImageSource`] | image URL → bytes |
//! | [`FormulaRecognizer`] | [`simpletex::SimpleTexRecognizer`] | image → LaTeX |
//! | [`ImageDescriber`] | [`vision::VisionDescriber`] | figure → prose |
//! | [`BatchFormulaModel`] | [`local_model::LocalModelRunner`] | image dir → LaTeX list |

pub mod fetch;
pub mod local_model;
pub mod simpletex;
pub mod textin;
pub mod vision;

use crate::config::{ConversionConfig, ImageMode};
use crate::error::{Pdf2DocxError, ResolverError};
use crate::pipeline::blocks::ContentBlock;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Turns a PDF into the ordered block list.
///
/// Failures here are fatal for the document.
#[async_trait]
pub trait LayoutExtractor: Send + Sync {
    async fn extract(&self, pdf: &[u8]) -> Result<Vec<ContentBlock>, Pdf2DocxError>;
}

/// Downloads the image behind an image block.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResolverError>;
}

/// Recognises one formula image as LaTeX, without delimiters.
#[async_trait]
pub trait FormulaRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String, ResolverError>;
}

/// Explains a captioned figure in prose.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe(&self, image_url: &str, caption: &str) -> Result<String, ResolverError>;
}

/// Runs a local model over every image in a directory.
///
/// Returns one result per recognised image. Implementations shared between
/// documents must serialise their calls.
#[async_trait]
pub trait BatchFormulaModel: Send + Sync {
    async fn recognize_dir(&self, dir: &Path) -> Result<Vec<String>, ResolverError>;
}

/// The set of collaborators one conversion uses.
///
/// Cheap to clone; every member is shared.
#[derive(Clone)]
pub struct Resolvers {
    pub extractor: Option<Arc<dyn LayoutExtractor>>,
    pub images: Arc<dyn ImageSource>,
    pub formula: Option<Arc<dyn FormulaRecognizer>>,
    pub describer: Option<Arc<dyn ImageDescriber>>,
    pub batch_model: Option<Arc<dyn BatchFormulaModel>>,
}

impl std::fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolvers")
            .field("extractor", &self.extractor.is_some())
            .field("formula", &self.formula.is_some())
            .field("describer", &self.describer.is_some())
            .field("batch_model", &self.batch_model.is_some())
            .finish()
    }
}

impl Resolvers {
    /// Only an image source; add the rest with the `with_*` methods.
    pub fn new(images: Arc<dyn ImageSource>) -> Self {
        Self {
            extractor: None,
            images,
            formula: None,
            describer: None,
            batch_model: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn LayoutExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_formula(mut self, formula: Arc<dyn FormulaRecognizer>) -> Self {
        self.formula = Some(formula);
        self
    }

    pub fn with_describer(mut self, describer: Arc<dyn ImageDescriber>) -> Self {
        self.describer = Some(describer);
        self
    }

    pub fn with_batch_model(mut self, model: Arc<dyn BatchFormulaModel>) -> Self {
        self.batch_model = Some(model);
        self
    }

    /// Build the production adapters named by `config`.
    ///
    /// Missing credentials leave the matching slot empty. The vision model
    /// is only resolved for [`ImageMode::DescriptionOrFormula`]; if no
    /// provider can be found, figures fail per block instead of the whole run.
    pub async fn from_config(config: &ConversionConfig) -> Result<Self, Pdf2DocxError> {
        let api_client = http_client(config.api_timeout_secs)?;
        let download_client = http_client(config.download_timeout_secs)?;

        let images: Arc<dyn ImageSource> = Arc::new(fetch::HttpImageSource::new(
            download_client,
            config.download_timeout_secs,
        ));
        let mut resolvers = Resolvers::new(Arc::clone(&images));

        if let Some(ref textin) = config.textin {
            resolvers = resolvers.with_extractor(Arc::new(textin::TextInExtractor::new(
                api_client.clone(),
                textin.clone(),
                config.api_timeout_secs,
            )));
        }

        if let Some(ref simpletex) = config.simpletex {
            resolvers = resolvers.with_formula(Arc::new(simpletex::SimpleTexRecognizer::new(
                api_client.clone(),
                simpletex.clone(),
                config.api_timeout_secs,
            )));
        }

        if config.image_mode == ImageMode::DescriptionOrFormula {
            match vision::resolve_provider(&config.vision) {
                Ok(provider) => {
                    debug!("Vision provider resolved for figure descriptions");
                    resolvers = resolvers.with_describer(Arc::new(vision::VisionDescriber::new(
                        provider,
                        images,
                        &config.vision,
                    )));
                }
                Err(e) => warn!("Figure descriptions disabled: {}", e),
            }
        }

        if let Some(ref local) = config.local_model {
            resolvers =
                resolvers.with_batch_model(Arc::new(local_model::LocalModelRunner::new(local.clone())));
        }

        Ok(resolvers)
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, Pdf2DocxError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2DocxError::Internal(format!("HTTP client: {e}")))
}

/// Read a non-success response into a [`ResolverError::Status`].
pub(crate) async fn status_error(response: reqwest::Response) -> ResolverError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ResolverError::Status {
        status,
        body: truncate(&body, 200),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
