//! Text chunking with boundary preference and overlap
//!
//! Chunks are character windows over the parent text. The chunker walks a ladder of
//! boundaries (paragraph, line, sentence, clause, word) and cuts at the coarsest one
//! that fits in the window, falling back to a hard character cut. Chunks are never
//! trimmed, so consecutive spans tile the text and the overlap regions are exact
//! duplicates.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Boundary ladder selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Paragraphs, lines, sentences, clauses, words
    #[default]
    Prose,
    /// Headings and fences before the prose ladder
    Markdown,
    /// Class and function definitions before lines and words
    Python,
}

impl Language {
    fn ladder(&self) -> &'static [Boundary] {
        match self {
            Self::Prose => PROSE,
            Self::Markdown => MARKDOWN,
            Self::Python => PYTHON,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    /// Cut right after the separator
    After(&'static str),
    /// Cut after the leading newline of the pattern, so the line starts the next chunk
    LineStart(&'static str),
    /// Unicode sentence boundary (UAX #29)
    Sentence,
}

use Boundary::{After, LineStart, Sentence};

const PROSE: &[Boundary] = &[
    After("\n\n"),
    After("\n"),
    Sentence,
    After("; "),
    After(", "),
    After(" "),
];

const MARKDOWN: &[Boundary] = &[
    LineStart("\n#"),
    LineStart("\n```"),
    LineStart("\n---"),
    After("\n\n"),
    After("\n"),
    Sentence,
    After(" "),
];

const PYTHON: &[Boundary] = &[
    LineStart("\nclass "),
    LineStart("\ndef "),
    LineStart("\n\tdef "),
    LineStart("\n    def "),
    After("\n\n"),
    After("\n"),
    After(" "),
];

impl Boundary {
    /// Byte offsets (relative to `slice`) where a cut may be placed
    fn cut_points(&self, slice: &str) -> Vec<usize> {
        match self {
            After(sep) => slice
                .match_indices(sep)
                .map(|(i, m)| i + m.len())
                .collect(),
            LineStart(pattern) => slice.match_indices(pattern).map(|(i, _)| i + 1).collect(),
            Sentence => slice
                .split_sentence_bound_indices()
                .map(|(i, _)| i)
                .filter(|&i| i > 0)
                .collect(),
        }
    }
}

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Maximum overlap between consecutive chunks
    chunk_overlap: usize,
    /// Boundary ladder
    language: Language,
}

impl TextChunker {
    /// Create a new chunker; `chunk_overlap` must be smaller than `chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            language: Language::Prose,
        })
    }

    /// Use a different boundary ladder
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Split documents into chunks, preserving document and chunk order
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        tracing::info!(
            "Splitting {} document(s) into chunks (chunk_size={}, overlap={})",
            documents.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| self.split_document(doc))
            .collect();

        tracing::debug!("Created {} chunks", chunks.len());
        chunks
    }

    /// Split a single document
    pub fn split_document(&self, doc: &Document) -> Vec<Chunk> {
        let text = doc.text.as_str();
        let bounds = char_bounds(text);

        self.spans(text, &bounds)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                Chunk::new(
                    text[bounds[start]..bounds[end]].to_string(),
                    doc.metadata.clone(),
                    index as u32,
                    start,
                    end,
                )
            })
            .collect()
    }

    /// Character spans `[start, end)` of the chunks
    fn spans(&self, text: &str, bounds: &[usize]) -> Vec<(usize, usize)> {
        let total = bounds.len() - 1;
        let mut spans = Vec::new();
        if total == 0 {
            return spans;
        }

        let mut start = 0usize;
        let mut prev_end = 0usize;

        loop {
            if total - start <= self.chunk_size {
                spans.push((start, total));
                break;
            }

            let window_end = start + self.chunk_size;
            let end = self.find_break(text, bounds, start, prev_end, window_end);
            spans.push((start, end));

            let next = self.overlap_start(text, bounds, start, end);
            prev_end = end;
            start = next;
        }

        spans
    }

    /// Coarsest boundary in `(floor, window_end]`, or a hard cut at `window_end`
    fn find_break(
        &self,
        text: &str,
        bounds: &[usize],
        start: usize,
        floor: usize,
        window_end: usize,
    ) -> usize {
        let base = bounds[start];
        let slice = &text[base..bounds[window_end]];

        for boundary in self.language.ladder() {
            let best = boundary
                .cut_points(slice)
                .into_iter()
                .map(|rel| char_index(bounds, base + rel))
                .filter(|&c| c > floor && c <= window_end)
                .max();

            if let Some(cut) = best {
                return cut;
            }
        }

        window_end
    }

    /// Where the next chunk starts: the earliest clean boundary inside the last
    /// `chunk_overlap` characters of the current chunk
    fn overlap_start(&self, text: &str, bounds: &[usize], start: usize, end: usize) -> usize {
        if self.chunk_overlap == 0 {
            return end;
        }

        let lo = end.saturating_sub(self.chunk_overlap).max(start + 1);
        if lo >= end {
            return end;
        }

        let base = bounds[lo];
        let slice = &text[base..bounds[end]];

        self.language
            .ladder()
            .iter()
            .flat_map(|boundary| boundary.cut_points(slice))
            .map(|rel| char_index(bounds, base + rel))
            .filter(|&c| c >= lo && c < end)
            .min()
            .unwrap_or(lo)
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            language: Language::Prose,
        }
    }
}

/// Split documents with the given size and overlap using the prose ladder
pub fn split(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(TextChunker::new(chunk_size, chunk_overlap)?.split(documents))
}

/// Byte offset of every char plus the end offset
fn char_bounds(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect()
}

fn char_index(bounds: &[usize], byte: usize) -> usize {
    bounds.binary_search(&byte).unwrap_or_else(|i| i)
}
