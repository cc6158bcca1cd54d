//! Ingestion pipeline orchestration

use crate::config::RagConfig;
use crate::error::Result;
use crate::types::Chunk;

use super::chunker::TextChunker;
use super::extractor::Extractor;

/// Main ingestion pipeline: extract every source, then chunk
pub struct IngestPipeline {
    /// Source extractor
    extractor: Extractor,
    /// Text chunker
    chunker: TextChunker,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(extractor: Extractor, chunker: TextChunker) -> Self {
        Self { extractor, chunker }
    }

    /// Build the default extractor and a chunker from configuration
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?
            .with_language(config.chunking.language);
        Ok(Self::new(Extractor::from_config(config)?, chunker))
    }

    /// Extract and chunk all sources, in source order
    pub async fn prepare(&self, sources: &[String]) -> Result<Vec<Chunk>> {
        let documents = self.extractor.extract_all(sources).await?;
        Ok(self.chunker.split(&documents))
    }
}
