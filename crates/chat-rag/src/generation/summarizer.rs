//! Batched map-reduce summarization

use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::config::SummarizationConfig;
use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::types::{Chunk, Document};

use super::prompt::PromptBuilder;

/// Anything that carries text to summarise
pub trait Summarizable {
    fn summary_text(&self) -> &str;
}

impl Summarizable for Document {
    fn summary_text(&self) -> &str {
        &self.text
    }
}

impl Summarizable for Chunk {
    fn summary_text(&self) -> &str {
        &self.text
    }
}

/// Summarizes items batch by batch
pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
    batch_size: usize,
    max_concurrency: usize,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &SummarizationConfig) -> Self {
        Self {
            llm,
            batch_size: config.batch_size.max(1),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Summarize all items
    ///
    /// Each batch is summarised on its own; the batch summaries are joined with
    /// newlines in batch order. Any failing batch fails the whole call.
    pub async fn summarize<T: Summarizable>(&self, items: &[T]) -> Result<String> {
        if items.is_empty() {
            return Ok(String::new());
        }

        let batches: Vec<&[T]> = items.chunks(self.batch_size).collect();
        tracing::info!(
            "Summarizing {} item(s) in {} batch(es) with {}",
            items.len(),
            batches.len(),
            self.llm.name()
        );

        let mut summaries = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            let number = i + 1;
            tracing::debug!("Summarizing batch {}/{}", number, batches.len());

            let summary = self.summarize_batch(batch).await.map_err(|e| {
                tracing::error!("Summarization failed at batch {}: {}", number, e);
                Error::Summarization {
                    batch: number,
                    message: e.to_string(),
                }
            })?;
            summaries.push(summary);
        }

        Ok(summaries.join("\n"))
    }

    async fn summarize_batch<T: Summarizable>(&self, batch: &[T]) -> Result<String> {
        let partials: Vec<String> = stream::iter(batch.iter())
            .map(|item| {
                let messages = PromptBuilder::build_summary_prompt(item.summary_text());
                async move { self.llm.generate(&messages).await }
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        if partials.len() == 1 {
            return Ok(partials.into_iter().next().unwrap_or_default());
        }

        let messages = PromptBuilder::build_combine_prompt(&partials);
        self.llm.generate(&messages).await
    }
}
