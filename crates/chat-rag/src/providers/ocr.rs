//! OCR provider trait and a tesseract-backed implementation

use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::OcrConfig;
use crate::error::{Error, Result};

/// Trait for recognising text in raw image bytes
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Return the text found in the image (possibly empty)
    async fn recognize(&self, image: &[u8]) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// OCR through the `tesseract` command line tool
pub struct TesseractOcr {
    config: OcrConfig,
}

impl TesseractOcr {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Check if tesseract is available
    pub async fn is_available(&self) -> bool {
        Command::new(&self.config.tesseract_bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl OcrProvider for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        // tesseract sniffs the format from content, the suffix only needs to exist
        let mut file = tempfile::Builder::new()
            .prefix("chat-rag-ocr-")
            .suffix(".img")
            .tempfile()?;
        file.write_all(image)?;
        file.flush()?;

        let path = file.path().to_string_lossy().to_string();
        let command = Command::new(&self.config.tesseract_bin)
            .args([path.as_str(), "stdout", "-l", self.config.language.as_str()])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), command)
            .await
            .map_err(|_| Error::Timeout {
                operation: "tesseract".to_string(),
                secs: self.config.timeout_secs,
            })?
            .map_err(|e| Error::ocr(&path, format!("failed to run {}: {}", self.config.tesseract_bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ocr(&path, format!("tesseract error: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        tracing::debug!("tesseract extracted {} characters", text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
