//! Core types for the RAG system

pub mod chat;
pub mod document;

pub use chat::{ChatHistory, ChatMessage, ChatTurn, Role};
pub use document::{Chunk, Document, DocumentMetadata, EmbeddingRecord, ScoredChunk, SourceKind};
