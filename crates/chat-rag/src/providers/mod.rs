//! Provider abstractions for embeddings, LLM, OCR and page fetching
//!
//! This module provides trait-based abstractions that allow switching between
//! a local (Ollama) and a hosted (OpenAI-compatible) backend.

pub mod embedding;
pub mod fetch;
pub mod llm;
pub mod ocr;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use crate::config::{BackendProvider, RagConfig};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use fetch::{FetchedPage, HttpFetcher, PageFetcher};
pub use llm::LlmProvider;
pub use ocr::{OcrProvider, TesseractOcr};
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use openai::{OpenAiClient, OpenAiEmbedder, OpenAiLlm};

/// Build the embedding and generation providers for the configured backend
pub fn build(config: &RagConfig) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>)> {
    match config.backend {
        BackendProvider::Ollama => {
            let (embedder, llm) = OllamaProvider::new(&config.llm)?.split();
            tracing::info!(
                "Using Ollama backend at {} (embed: {}, generate: {})",
                config.llm.base_url,
                config.llm.embed_model,
                config.llm.generate_model
            );
            Ok((Arc::new(embedder), Arc::new(llm)))
        }
        BackendProvider::OpenAi => {
            let client = Arc::new(OpenAiClient::new(&config.llm)?);
            tracing::info!(
                "Using OpenAI backend (embed: {}, generate: {})",
                config.llm.openai_embed_model,
                config.llm.openai_chat_model
            );
            Ok((
                Arc::new(OpenAiEmbedder::from_client(
                    Arc::clone(&client),
                    config.llm.openai_embed_model.clone(),
                )),
                Arc::new(OpenAiLlm::from_client(
                    client,
                    config.llm.openai_chat_model.clone(),
                )),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_build_ollama_backend() {
        let config = RagConfig::default();
        let (embedder, llm) = build(&config).unwrap();
        assert_eq!(embedder.name(), "ollama");
        assert_eq!(llm.model(), "llama3.2:3b");
    }

    #[test]
    fn test_build_openai_without_key_fails() {
        let mut config = RagConfig::default();
        config.backend = BackendProvider::OpenAi;
        config.llm.openai_api_key = None;

        assert!(matches!(build(&config), Err(Error::MissingCredential(_))));
    }

    #[test]
    fn test_build_openai_backend() {
        let mut config = RagConfig::default();
        config.backend = BackendProvider::OpenAi;
        config.llm.openai_api_key = Some("sk-test".to_string());

        let (embedder, llm) = build(&config).unwrap();
        assert_eq!(embedder.model(), "text-embedding-3-small");
        assert_eq!(llm.name(), "openai");
    }
}
