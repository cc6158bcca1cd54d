//! chat-rag: conversational retrieval over PDFs, scanned images and webpages
//!
//! Sources are extracted into documents, split into overlapping chunks, embedded
//! into a persistent vector index and queried by a retrieval session that keeps
//! chat history. A batch summarizer works over the same chunks.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use generation::{Summarizable, Summarizer};
pub use ingestion::{split, Extractor, IngestPipeline, TextChunker};
pub use retrieval::{RetrievalSession, SessionAnswer, UpsertReport, VectorIndex};
pub use types::{ChatHistory, ChatTurn, Chunk, Document, DocumentMetadata, SourceKind};
