//! Local image-to-LaTeX model run as an external command.
//!
//! The command is invoked as `<program> <args...> --device <cpu|gpu> <dir>`
//! and must print its results on stdout, either as a JSON array of strings
//! or as one result per line. One model instance is assumed to hold the
//! device, so calls are serialised through an async mutex.

use super::BatchFormulaModel;
use crate::config::LocalModelConfig;
use crate::error::ResolverError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

/// Runs [`LocalModelConfig`] over a scratch directory.
#[derive(Debug)]
pub struct LocalModelRunner {
    config: LocalModelConfig,
    lock: Mutex<()>,
}

impl LocalModelRunner {
    pub fn new(config: LocalModelConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl BatchFormulaModel for LocalModelRunner {
    async fn recognize_dir(&self, dir: &Path) -> Result<Vec<String>, ResolverError> {
        let _guard = self.lock.lock().await;
        debug!(
            "Running {} on {} ({})",
            self.config.program,
            dir.display(),
            self.config.device.as_str()
        );

        let output = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg("--device")
            .arg(self.config.device.as_str())
            .arg(dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ResolverError::Model(format!("failed to start '{}': {e}", self.config.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolverError::Model(format!(
                "'{}' exited with {}: {}",
                self.config.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_model_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Results from stdout: a JSON string array, or one per non-empty line.
pub fn parse_model_output(stdout: &str) -> Result<Vec<String>, ResolverError> {
    let trimmed = stdout.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| ResolverError::InvalidResponse(format!("model output: {e}")));
    }
    Ok(trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Decode `bytes`, convert to RGB and write `<dir>/image_<index>.png`.
pub async fn stage_image(dir: &Path, index: usize, bytes: &[u8]) -> Result<PathBuf, ResolverError> {
    let img = image::load_from_memory(bytes).map_err(|e| ResolverError::Image(e.to_string()))?;
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut png = Vec::new();
    rgb.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| ResolverError::Image(e.to_string()))?;

    let path = dir.join(format!("image_{index}.png"));
    tokio::fs::write(&path, &png).await?;
    Ok(path)
}
