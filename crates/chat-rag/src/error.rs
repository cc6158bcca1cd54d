//! Error types for the RAG system

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source is neither a PDF, a supported image nor an http(s) URL
    #[error("Unsupported file type: {0}")]
    UnsupportedSource(String),

    /// Every page of the PDF came back without text
    #[error("All pages in '{source_id}' appear to be scanned. Please use a PDF with text content.")]
    AllPagesScanned { source_id: String },

    /// PDF could not be opened or decoded
    #[error("Failed to read PDF '{source_id}': {message}")]
    Pdf { source_id: String, message: String },

    /// OCR produced only whitespace
    #[error("No text extracted from the image '{source_id}'")]
    NoTextExtracted { source_id: String },

    /// OCR engine failed to run
    #[error("OCR failed for '{source_id}': {message}")]
    Ocr { source_id: String, message: String },

    /// Webpage had no visible text after markup stripping
    #[error("No visible text found on the webpage '{url}'")]
    NoVisibleText { url: String },

    /// Network failure or non-2xx response while fetching a webpage
    #[error("Failed to fetch '{url}': {message}")]
    Fetch { url: String, message: String },

    /// No persisted index at the storage path
    #[error("Vector index not found at '{}'. Please process and save embeddings first.", .0.display())]
    IndexNotFound(PathBuf),

    /// Embedding provider call failed
    #[error("Embedding generation failed: {0}")]
    EmbeddingProvider(String),

    /// Generation provider call failed
    #[error("LLM error: {0}")]
    GenerationProvider(String),

    /// A summarization batch failed
    #[error("Summarization failed at batch {batch}: {message}")]
    Summarization { batch: usize, message: String },

    /// A provider needs a credential that was not supplied
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Vector dimensionality disagrees with the index
    #[error("Embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Provider call exceeded its deadline
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingProvider(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationProvider(message.into())
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an OCR error
    pub fn ocr(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ocr {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error came from a remote provider rather than local input.
    /// Callers use this to decide whether retrying later could help.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingProvider(_)
                | Self::GenerationProvider(_)
                | Self::Summarization { .. }
                | Self::Fetch { .. }
                | Self::Ocr { .. }
                | Self::Timeout { .. }
        )
    }
}
