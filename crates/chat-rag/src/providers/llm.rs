//! LLM provider trait for generating answers and summaries

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ChatMessage;

/// Trait for chat-style text generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (`/api/chat`)
/// - `OpenAiLlm`: OpenAI-compatible `/chat/completions` endpoint
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the given conversation
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
