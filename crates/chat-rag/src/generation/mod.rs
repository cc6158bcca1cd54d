//! Prompt construction and summarization

mod prompt;
mod summarizer;

pub use prompt::PromptBuilder;
pub use summarizer::{Summarizable, Summarizer};
