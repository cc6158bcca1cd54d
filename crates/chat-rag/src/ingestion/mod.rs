//! Document ingestion: extraction, visible-text parsing and chunking

mod chunker;
mod extractor;
mod html;
mod pipeline;

pub use chunker::{split, Language, TextChunker};
pub use extractor::Extractor;
pub use html::visible_text;
pub use pipeline::IngestPipeline;
