//! Document and chunk types with source tracking

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Image suffixes routed to OCR
const IMAGE_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

/// The shape of an ingestion source, resolved once at the extractor boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// PDF file on disk
    Pdf(PathBuf),
    /// Image file on disk (OCR)
    Image(PathBuf),
    /// http(s) URL
    Webpage(String),
}

impl SourceKind {
    /// Detect the source kind from a path suffix or URL prefix (case-insensitive)
    pub fn detect(source: &str) -> Result<Self> {
        let lowered = source.to_lowercase();

        if lowered.ends_with(".pdf") {
            Ok(Self::Pdf(PathBuf::from(source)))
        } else if IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext)) {
            Ok(Self::Image(PathBuf::from(source)))
        } else if lowered.starts_with("http") {
            Ok(Self::Webpage(source.to_string()))
        } else {
            Err(Error::UnsupportedSource(source.to_string()))
        }
    }

    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "PDF",
            Self::Image(_) => "Image",
            Self::Webpage(_) => "Webpage",
        }
    }
}

/// Where a piece of text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File path or URL
    pub source: String,
    /// Page number (1-indexed, PDFs only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl DocumentMetadata {
    /// Metadata for a whole-source document
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: None,
        }
    }

    /// Metadata for a single PDF page
    pub fn page(source: impl Into<String>, page: u32) -> Self {
        Self {
            source: source.into(),
            page: Some(page),
        }
    }

    /// Format source for display
    pub fn format_citation(&self) -> String {
        match self.page {
            Some(page) => format!("{}, Page {}", self.source, page),
            None => self.source.clone(),
        }
    }
}

/// Normalized text extracted from one logical unit of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Extracted text
    pub text: String,
    /// Source metadata
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a new document
    pub fn new(text: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// A bounded window of a document's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content
    pub text: String,
    /// Metadata copied from the parent document
    pub metadata: DocumentMetadata,
    /// Chunk index within the parent document
    pub chunk_index: u32,
    /// Character span in the parent document text
    pub char_start: usize,
    pub char_end: usize,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(
        text: String,
        metadata: DocumentMetadata,
        chunk_index: u32,
        char_start: usize,
        char_end: usize,
    ) -> Self {
        Self {
            text,
            metadata,
            chunk_index,
            char_start,
            char_end,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// A chunk together with its embedding, owned by the vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Record ID
    pub id: Uuid,
    /// Embedded chunk
    pub chunk: Chunk,
    /// Embedding vector
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    /// Create a new record
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk,
            vector,
        }
    }
}

/// Query result with chunk and similarity
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity (-1.0 to 1.0, higher is more similar)
    pub similarity: f32,
}
