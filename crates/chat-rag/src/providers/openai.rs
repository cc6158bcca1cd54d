//! OpenAI-compatible providers (`/embeddings` and `/chat/completions`)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::types::ChatMessage;

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

/// Authenticated client for an OpenAI-compatible API
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    temperature: f32,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client; fails when no API key is configured
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::MissingCredential("OPENAI_API_KEY".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
        })
    }

    /// Embed a batch of texts in one request
    pub async fn embeddings(&self, model: &str, input: &[String]) -> Result<Vec<Vec<f32>>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest { model, input })
            .send()
            .await
            .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "Embedding failed: HTTP {} - {}",
                status, body
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        order_embeddings(parsed.data, input.len())
    }

    /// Run a chat completion and return the first choice
    pub async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model,
            messages,
            temperature: self.temperature,
        };

        tracing::debug!("Generating with model: {}", model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::generation(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Generation failed: HTTP {} - {}",
                status, body
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse generation response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::generation("Response contained no choices"))
    }
}

/// Put embeddings back into input order and check the count
fn order_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(Error::embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// OpenAI embedding provider
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn from_client(client: Arc<OpenAiClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.client.embeddings(&self.model, texts).await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI chat provider
pub struct OpenAiLlm {
    client: Arc<OpenAiClient>,
    model: String,
}

impl OpenAiLlm {
    pub fn from_client(client: Arc<OpenAiClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.client.complete(&self.model, messages).await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
