//! Prompt templates for conversational retrieval and summarization

use crate::types::{ChatMessage, ScoredChunk};

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build context from retrieved chunks
    pub fn build_context(results: &[ScoredChunk]) -> String {
        let mut context = String::new();

        for (i, result) in results.iter().enumerate() {
            context.push_str(&format!(
                "[{}] {}\n\n{}\n\n---\n\n",
                i + 1,
                result.chunk.metadata.format_citation(),
                result.chunk.text
            ));
        }

        context
    }

    /// Build the message list for a conversational answer
    ///
    /// Order: instructions with context, prior turns oldest first, then the question.
    pub fn build_conversation(
        question: &str,
        results: &[ScoredChunk],
        history: &[(String, String)],
    ) -> Vec<ChatMessage> {
        let system = format!(
            r#"Use the following pieces of context to answer the user's question.
If the answer is not in the context, say that you don't know instead of making one up.

CONTEXT:
{context}"#,
            context = Self::build_context(results)
        );

        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(system));
        for (asked, answered) in history {
            messages.push(ChatMessage::user(asked.clone()));
            messages.push(ChatMessage::assistant(answered.clone()));
        }
        messages.push(ChatMessage::user(question));
        messages
    }

    /// Build the prompt that rewrites a follow-up into a standalone question
    pub fn build_condense_prompt(question: &str, history: &[(String, String)]) -> Vec<ChatMessage> {
        let transcript = history
            .iter()
            .map(|(q, a)| format!("Human: {}\nAssistant: {}", q, a))
            .collect::<Vec<_>>()
            .join("\n");

        vec![ChatMessage::user(format!(
            r#"Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question.

Chat History:
{transcript}

Follow Up Input: {question}

Standalone question:"#,
            transcript = transcript,
            question = question
        ))]
    }

    /// Build a summarization prompt (map step)
    pub fn build_summary_prompt(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(format!(
            r#"Write a concise summary of the following:

"{text}"

CONCISE SUMMARY:"#,
            text = text
        ))]
    }

    /// Build the prompt that merges partial summaries (reduce step)
    pub fn build_combine_prompt(summaries: &[String]) -> Vec<ChatMessage> {
        Self::build_summary_prompt(&summaries.join("\n"))
    }
}
