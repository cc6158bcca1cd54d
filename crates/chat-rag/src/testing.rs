//! In-process fake providers shared by unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::types::{ChatMessage, Chunk, DocumentMetadata};

const VOCABULARY: [&str; 8] = [
    "leave", "policy", "salary", "cafeteria", "security", "password", "holiday", "parking",
];

/// Embeds text as keyword counts over a fixed vocabulary plus a bias term
pub struct KeywordEmbedder {
    pub batch_sizes: Mutex<Vec<usize>>,
    pub fail: AtomicBool,
    /// Fail only this batch call (1-based)
    pub fail_on_call: Option<usize>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            batch_sizes: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            fail_on_call: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|term| words.iter().filter(|w| w.as_str() == *term).count() as f32)
            .collect();
        vector.push(1.0);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) || self.fail_on_call == Some(call) {
            return Err(Error::embedding("invalid API key"));
        }
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn name(&self) -> &str {
        "keyword"
    }

    fn model(&self) -> &str {
        "keyword-v1"
    }
}

/// Returns a fixed reply and records every prompt it receives
pub struct ScriptedLlm {
    pub reply: String,
    pub fail: AtomicBool,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail: AtomicBool::new(false),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::generation("missing credential"));
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-v1"
    }
}

/// A chunk with the given text and a single-source metadata
pub fn chunk(text: &str, index: u32) -> Chunk {
    Chunk::new(
        text.to_string(),
        DocumentMetadata::new("handbook.pdf"),
        index,
        0,
        text.chars().count(),
    )
}
