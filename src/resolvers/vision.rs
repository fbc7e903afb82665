//! Figure descriptions through an `edgequake-llm` vision provider.
//!
//! The figure is downloaded, attached as a base64 image and sent with the
//! caption-bearing prompt from [`crate::prompts`].

use super::{ImageDescriber, ImageSource};
use crate::config::VisionConfig;
use crate::error::{Pdf2DocxError, ResolverError};
use crate::prompts::{describe_figure_prompt, DESCRIPTION_SYSTEM_PROMPT};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use image::ImageFormat;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Model used when a provider is named without one.
const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Describes captioned figures with a vision-language model.
pub struct VisionDescriber {
    provider: Arc<dyn LLMProvider>,
    images: Arc<dyn ImageSource>,
    temperature: f32,
    max_tokens: usize,
}

impl VisionDescriber {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        images: Arc<dyn ImageSource>,
        config: &VisionConfig,
    ) -> Self {
        Self {
            provider,
            images,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ImageDescriber for VisionDescriber {
    async fn describe(&self, image_url: &str, caption: &str) -> Result<String, ResolverError> {
        let start = Instant::now();
        let bytes = self.images.fetch(image_url).await?;
        let image = encode_image(&bytes)?;
        let prompt = describe_figure_prompt(caption);

        let messages = vec![
            ChatMessage::system(DESCRIPTION_SYSTEM_PROMPT),
            ChatMessage::user_with_images(&prompt, vec![image]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| ResolverError::Model(e.to_string()))?;

        debug!(
            "Figure description: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(ResolverError::InvalidResponse(
                "empty description".to_string(),
            ));
        }
        Ok(response.content)
    }
}

/// Wrap image bytes for the provider.
///
/// PNG and JPEG are passed through; anything else `image` can decode is
/// re-encoded as PNG.
pub fn encode_image(bytes: &[u8]) -> Result<ImageData, ResolverError> {
    let format = image::guess_format(bytes).map_err(|e| ResolverError::Image(e.to_string()))?;
    let (data, mime) = match format {
        ImageFormat::Png => (STANDARD.encode(bytes), "image/png"),
        ImageFormat::Jpeg => (STANDARD.encode(bytes), "image/jpeg"),
        _ => {
            let img =
                image::load_from_memory(bytes).map_err(|e| ResolverError::Image(e.to_string()))?;
            let mut buf = Vec::new();
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| ResolverError::Image(e.to_string()))?;
            (STANDARD.encode(&buf), "image/png")
        }
    };
    debug!("Encoded figure → {} bytes base64 ({})", data.len(), mime);
    Ok(ImageData::new(data, mime).with_detail("high"))
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2DocxError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2DocxError::ResolverNotConfigured {
            resolver: format!("vision ({provider_name})"),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. pre-built provider in [`VisionConfig::provider`]
/// 2. named provider + model
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, both set
/// 4. OpenAI when `OPENAI_API_KEY` is present
/// 5. `ProviderFactory::from_env` auto-detection
pub fn resolve_provider(config: &VisionConfig) -> Result<Arc<dyn LLMProvider>, Pdf2DocxError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2DocxError::ResolverNotConfigured {
            resolver: "vision (auto)".to_string(),
            hint: format!(
                "No vision model could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
