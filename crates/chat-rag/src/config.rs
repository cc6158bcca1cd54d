//! Configuration for the RAG system

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ingestion::Language;

/// Main RAG system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Backend provider (ollama or openai)
    pub backend: BackendProvider,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// LLM configuration
    pub llm: LlmConfig,
    /// Vector index configuration
    pub index: IndexConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Summarization configuration
    pub summarization: SummarizationConfig,
    /// OCR configuration
    pub ocr: OcrConfig,
    /// Webpage fetch configuration
    pub fetch: FetchConfig,
}

impl RagConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections fall back to defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::config(format!("Invalid TOML: {}", e)))
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(dir) = lookup("CHAT_RAG_INDEX_DIR") {
            self.index.storage_path = PathBuf::from(dir);
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(backend) = lookup("CHAT_RAG_BACKEND") {
            match backend.to_lowercase().as_str() {
                "ollama" => self.backend = BackendProvider::Ollama,
                "openai" => self.backend = BackendProvider::OpenAi,
                other => tracing::warn!("Ignoring unknown CHAT_RAG_BACKEND '{}'", other),
            }
        }
    }

    /// Reject settings the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::config("chunking.chunk_size must be greater than 0"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be greater than 0"));
        }
        if self.summarization.batch_size == 0 {
            return Err(Error::config("summarization.batch_size must be greater than 0"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be greater than 0"));
        }
        Ok(())
    }
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// Local Ollama server for embeddings and chat
    #[default]
    Ollama,
    /// OpenAI-compatible API (requires an API key)
    OpenAi,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Chunks per embedding request
    pub batch_size: usize,
    /// Embedding batches allowed in flight at once
    pub max_concurrent_batches: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrent_batches: 1,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
    /// Boundary ladder to prefer when splitting
    pub language: Language,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            language: Language::Prose,
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Ollama embedding model name
    pub embed_model: String,
    /// Ollama generation model name
    pub generate_model: String,
    /// OpenAI-compatible base URL
    pub openai_base_url: String,
    /// OpenAI API key (usually supplied through OPENAI_API_KEY)
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    /// OpenAI embedding model name
    pub openai_embed_model: String,
    /// OpenAI chat model name
    pub openai_chat_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
            openai_embed_model: "text-embedding-3-small".to_string(),
            openai_chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the serialized index
    pub storage_path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("vector_index"),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Rewrite follow-up questions into standalone ones before retrieval
    pub condense_question: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            condense_question: false,
        }
    }
}

/// Summarization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    /// Items per summarization batch
    pub batch_size: usize,
    /// Map-phase calls allowed in flight at once
    pub max_concurrency: usize,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrency: 1,
        }
    }
}

/// OCR configuration (tesseract)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// tesseract executable
    pub tesseract_bin: String,
    /// tesseract language pack
    pub language: String,
    /// Timeout per image in seconds
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_bin: "tesseract".to_string(),
            language: "eng".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Webpage fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with requests
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("chat-rag/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
