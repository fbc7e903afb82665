//! Configuration types for PDF-to-DOCX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Routing switches (page breaks, styles,
//! image handling) sit next to one settings struct per external resolver;
//! each adapter receives its own struct at construction and nothing reads
//! credentials from process-wide state.

use crate::error::Pdf2DocxError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default TextIn PDF-to-markdown endpoint.
pub const DEFAULT_TEXTIN_ENDPOINT: &str = "https://api.textin.com/ai/service/v1/pdf_to_markdown";

/// Default SimpleTex formula OCR endpoint.
pub const DEFAULT_SIMPLETEX_ENDPOINT: &str = "https://server.simpletex.cn/api/latex_ocr";

/// Caption prefix ("Figure") that routes an image to the description model.
pub const DEFAULT_FIGURE_PREFIX: &str = "图";

/// Configuration for a PDF-to-DOCX conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2docx::{ConversionConfig, ImageMode, PageBreakMode};
///
/// let config = ConversionConfig::builder()
///     .page_breaks(PageBreakMode::Disabled)
///     .image_mode(ImageMode::Formula)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// How page-id transitions turn into page breaks. Default: [`PageBreakMode::EveryPage`].
    pub page_breaks: PageBreakMode,

    /// Apply the compact body style and the custom table styles. Default: true.
    ///
    /// When off, body paragraphs and tables use the document defaults.
    pub apply_custom_styles: bool,

    /// Write footer-like paragraphs with the compact "No Spacing" style. Default: true.
    pub compact_footers: bool,

    /// How image blocks are resolved. Default: [`ImageMode::DescriptionOrFormula`].
    pub image_mode: ImageMode,

    /// Caption prefix that marks the block after an image as a figure caption.
    /// Default: `"图"`.
    pub figure_caption_prefix: String,

    /// Footer-like paragraphs shorter than this many characters are dropped.
    /// Default: 3.
    pub min_footer_chars: usize,

    /// OCR/layout extraction service.
    pub textin: Option<TextInConfig>,

    /// Network formula recogniser.
    pub simpletex: Option<SimpleTexConfig>,

    /// Vision model used for figure descriptions.
    pub vision: VisionConfig,

    /// Local batch formula model (only used by [`ImageMode::LocalBatch`]).
    pub local_model: Option<LocalModelConfig>,

    /// Number of documents converted at once in a batch. Default: 4.
    ///
    /// Blocks inside one document are always processed in order; this only
    /// bounds how many documents run side by side.
    pub concurrency: usize,

    /// Download timeout for PDF and image URLs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-call timeout for the OCR, formula and vision services in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional batch progress listener.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            page_breaks: PageBreakMode::default(),
            apply_custom_styles: true,
            compact_footers: true,
            image_mode: ImageMode::default(),
            figure_caption_prefix: DEFAULT_FIGURE_PREFIX.to_string(),
            min_footer_chars: 3,
            textin: None,
            simpletex: None,
            vision: VisionConfig::default(),
            local_model: None,
            concurrency: 4,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("page_breaks", &self.page_breaks)
            .field("apply_custom_styles", &self.apply_custom_styles)
            .field("compact_footers", &self.compact_footers)
            .field("image_mode", &self.image_mode)
            .field("figure_caption_prefix", &self.figure_caption_prefix)
            .field("min_footer_chars", &self.min_footer_chars)
            .field("textin", &self.textin)
            .field("simpletex", &self.simpletex)
            .field("vision", &self.vision)
            .field("local_model", &self.local_model)
            .field("concurrency", &self.concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn page_breaks(mut self, mode: PageBreakMode) -> Self {
        self.config.page_breaks = mode;
        self
    }

    pub fn apply_custom_styles(mut self, v: bool) -> Self {
        self.config.apply_custom_styles = v;
        self
    }

    pub fn compact_footers(mut self, v: bool) -> Self {
        self.config.compact_footers = v;
        self
    }

    pub fn image_mode(mut self, mode: ImageMode) -> Self {
        self.config.image_mode = mode;
        self
    }

    pub fn figure_caption_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.figure_caption_prefix = prefix.into();
        self
    }

    pub fn min_footer_chars(mut self, n: usize) -> Self {
        self.config.min_footer_chars = n;
        self
    }

    pub fn textin(mut self, textin: TextInConfig) -> Self {
        self.config.textin = Some(textin);
        self
    }

    pub fn simpletex(mut self, simpletex: SimpleTexConfig) -> Self {
        self.config.simpletex = Some(simpletex);
        self
    }

    pub fn vision(mut self, vision: VisionConfig) -> Self {
        self.config.vision = vision;
        self
    }

    pub fn local_model(mut self, model: LocalModelConfig) -> Self {
        self.config.local_model = Some(model);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2DocxError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Pdf2DocxError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.figure_caption_prefix.is_empty() {
            return Err(Pdf2DocxError::InvalidConfig(
                "Figure caption prefix must not be empty".into(),
            ));
        }
        if c.image_mode == ImageMode::LocalBatch && c.local_model.is_none() {
            return Err(Pdf2DocxError::InvalidConfig(
                "Image mode 'local-batch' needs a local model command".into(),
            ));
        }
        if let Some(ref m) = c.local_model {
            if m.program.trim().is_empty() {
                return Err(Pdf2DocxError::InvalidConfig(
                    "Local model program must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Resolver settings ───────────────────────────────────────────────────

/// Credentials and endpoint for the TextIn layout extractor.
#[derive(Clone, Serialize, Deserialize)]
pub struct TextInConfig {
    pub app_id: String,
    pub secret_code: String,
    pub endpoint: String,
}

impl TextInConfig {
    pub fn new(app_id: impl Into<String>, secret_code: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            secret_code: secret_code.into(),
            endpoint: DEFAULT_TEXTIN_ENDPOINT.to_string(),
        }
    }
}

impl fmt::Debug for TextInConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextInConfig")
            .field("app_id", &self.app_id)
            .field("secret_code", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Credentials and endpoint for the SimpleTex formula recogniser.
#[derive(Clone, Serialize, Deserialize)]
pub struct SimpleTexConfig {
    pub app_id: String,
    pub app_secret: String,
    pub endpoint: String,
}

impl SimpleTexConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            endpoint: DEFAULT_SIMPLETEX_ENDPOINT.to_string(),
        }
    }
}

impl fmt::Debug for SimpleTexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleTexConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Vision model settings for figure descriptions.
#[derive(Clone)]
pub struct VisionConfig {
    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens per description. Default: 2048.
    pub max_tokens: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            provider_name: None,
            model: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// External command that runs a local image-to-LaTeX model over a directory.
///
/// Invoked as `<program> <args...> --device <cpu|gpu> <image_dir>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    pub program: String,
    pub args: Vec<String>,
    pub device: Device,
}

impl LocalModelConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            device: Device::default(),
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How page-id increases turn into page breaks.
///
/// | Mode | pageIds `[1, 2, 4]` |
/// |------|---------------------|
/// | `Disabled` | no breaks |
/// | `EveryPage` | 1 break before block 1, 2 before block 2 |
/// | `OncePerBlock` | 1 break before block 1, 1 before block 2 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageBreakMode {
    /// Never emit page breaks.
    Disabled,
    /// One break per unit of page-id increase. (default)
    #[default]
    EveryPage,
    /// At most one break per block, however far the page id jumps.
    OncePerBlock,
}

impl PageBreakMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, PageBreakMode::Disabled)
    }
}

/// How image blocks are resolved into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageMode {
    /// Describe figures whose next block is a caption; treat everything
    /// else as a formula. (default)
    #[default]
    DescriptionOrFormula,
    /// Treat every image as a formula, via the network recogniser.
    Formula,
    /// Treat every image as a formula, via the local batch model.
    LocalBatch,
}

/// Inference device for the local formula model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Device {
    Cpu,
    #[default]
    Gpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Gpu => "gpu",
        }
    }
}

impl std::str::FromStr for Device {
    type Err = Pdf2DocxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "gpu" | "cuda" => Ok(Device::Gpu),
            other => Err(Pdf2DocxError::InvalidConfig(format!(
                "Unknown device '{other}' (expected cpu or gpu)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_richer_variant() {
        let c = ConversionConfig::default();
        assert_eq!(c.page_breaks, PageBreakMode::EveryPage);
        assert!(c.apply_custom_styles);
        assert!(c.compact_footers);
        assert_eq!(c.image_mode, ImageMode::DescriptionOrFormula);
        assert_eq!(c.figure_caption_prefix, "图");
        assert_eq!(c.min_footer_chars, 3);
    }

    #[test]
    fn local_batch_requires_model() {
        let err = ConversionConfig::builder()
            .image_mode(ImageMode::LocalBatch)
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2DocxError::InvalidConfig(_)));

        let ok = ConversionConfig::builder()
            .image_mode(ImageMode::LocalBatch)
            .local_model(LocalModelConfig::new("nougat-latex"))
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn empty_caption_prefix_rejected() {
        let err = ConversionConfig::builder()
            .figure_caption_prefix("")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("caption prefix"));
    }

    #[test]
    fn concurrency_clamped_to_one() {
        let c = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = ConversionConfig::builder()
            .textin(TextInConfig::new("app", "top-secret"))
            .simpletex(SimpleTexConfig::new("app2", "also-secret"))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("top-secret"));
        assert!(!dbg.contains("also-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn device_parsing() {
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Gpu);
        assert!("tpu".parse::<Device>().is_err());
    }
}
