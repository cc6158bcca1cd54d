//! Conversational retrieval session

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::types::{ChatHistory, ChatTurn, ScoredChunk};

use super::index::VectorIndex;

/// Session lifecycle
enum SessionState {
    /// No index loaded yet
    Uninitialized,
    /// Index loaded; history may be empty
    Ready(VectorIndex),
}

/// Answer with the chunks it was conditioned on
#[derive(Debug, Clone)]
pub struct SessionAnswer {
    pub answer: String,
    /// Question used for retrieval (the condensed one when condensation ran)
    pub retrieval_question: String,
    pub sources: Vec<ScoredChunk>,
}

/// Holds chat history and an index handle; answers questions against the index
pub struct RetrievalSession {
    index_path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    config: RetrievalConfig,
    state: SessionState,
    history: ChatHistory,
}

impl RetrievalSession {
    /// Create an uninitialized session; the index is loaded on the first `ask`
    pub fn new(
        index_path: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            index_path: index_path.into(),
            embedder,
            llm,
            config,
            state: SessionState::Uninitialized,
            history: ChatHistory::new(),
        }
    }

    /// Create a ready session around an already loaded index
    pub fn with_index(index: VectorIndex, llm: Arc<dyn LlmProvider>, config: RetrievalConfig) -> Self {
        Self {
            index_path: index.path().to_path_buf(),
            embedder: index.embedder(),
            llm,
            config,
            state: SessionState::Ready(index),
            history: ChatHistory::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Forget the conversation; the loaded index is kept
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Load the index if not done yet
    ///
    /// A failed load keeps the session uninitialized.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let index = VectorIndex::load(&self.index_path, Arc::clone(&self.embedder)).await?;
        tracing::info!("Retrieval session ready ({} records)", index.len());
        self.state = SessionState::Ready(index);
        Ok(())
    }

    /// Answer a question and record the turn
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        Ok(self.ask_with_sources(question).await?.answer)
    }

    /// Answer a question, returning the retrieved chunks too
    ///
    /// Nothing is appended to history unless every step succeeded.
    pub async fn ask_with_sources(&mut self, question: &str) -> Result<SessionAnswer> {
        self.initialize().await?;

        let retrieval_question = self.condense_question(question).await?;

        let SessionState::Ready(index) = &self.state else {
            return Err(Error::internal("session is not initialized"));
        };
        let sources = index.query(&retrieval_question, self.config.top_k).await?;
        tracing::debug!(
            "Retrieved {} chunk(s) for '{}'",
            sources.len(),
            retrieval_question
        );

        let messages = PromptBuilder::build_conversation(question, &sources, &self.history.pairs());
        let answer = self.llm.generate(&messages).await.map_err(|e| {
            tracing::error!("Generation failed: {}", e);
            e
        })?;

        self.history.push(ChatTurn::new(question, answer.clone()));

        Ok(SessionAnswer {
            answer,
            retrieval_question,
            sources,
        })
    }

    /// Rewrite a follow-up as a standalone question when condensation is enabled
    /// and there is history; otherwise return the question unchanged
    pub async fn condense_question(&self, question: &str) -> Result<String> {
        if !self.config.condense_question || self.history.is_empty() {
            return Ok(question.to_string());
        }

        let messages = PromptBuilder::build_condense_prompt(question, &self.history.pairs());
        let condensed = self.llm.generate(&messages).await?;
        let condensed = condensed.trim();

        if condensed.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(condensed.to_string())
        }
    }
}
