//! Persistent vector index with batched embedding and cosine search

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::{Chunk, EmbeddingRecord, ScoredChunk};

/// Index file inside the storage directory
const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

/// Serialized form of the index
#[derive(Serialize, Deserialize)]
struct IndexFile {
    format_version: u32,
    dimensions: Option<usize>,
    embedding_model: String,
    records: Vec<EmbeddingRecord>,
}

/// Outcome of an upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Provider calls made
    pub batches: usize,
    /// Records added
    pub records: usize,
}

/// Embedding store bound to one storage directory
///
/// Mutating operations take `&mut self`, so one value is the single writer for
/// its path. Queries only need `&self`.
pub struct VectorIndex {
    path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrent_batches: usize,
    records: Vec<EmbeddingRecord>,
    dimensions: Option<usize>,
}

impl VectorIndex {
    /// Create an empty in-memory index for `path`; nothing is written until `save`
    pub fn new(path: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let defaults = EmbeddingConfig::default();
        Self {
            path: path.into(),
            embedder,
            batch_size: defaults.batch_size,
            max_concurrent_batches: defaults.max_concurrent_batches,
            records: Vec::new(),
            dimensions: None,
        }
    }

    /// Use the batch settings from configuration
    pub fn with_batch_config(mut self, config: &EmbeddingConfig) -> Self {
        self.batch_size = config.batch_size.max(1);
        self.max_concurrent_batches = config.max_concurrent_batches.max(1);
        self
    }

    /// Whether a saved index exists at `path`
    pub fn exists(path: &Path) -> bool {
        path.join(INDEX_FILE).is_file()
    }

    /// Restore an index from `path`
    pub async fn load(path: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let path = path.into();
        if !Self::exists(&path) {
            return Err(Error::IndexNotFound(path));
        }

        let raw = tokio::fs::read_to_string(path.join(INDEX_FILE)).await?;
        let file: IndexFile = serde_json::from_str(&raw)?;

        if file.format_version != FORMAT_VERSION {
            return Err(Error::internal(format!(
                "Unsupported index format version {} at {}",
                file.format_version,
                path.display()
            )));
        }
        if file.embedding_model != embedder.model() {
            tracing::warn!(
                "Index at {} was built with '{}' but the current embedder is '{}'",
                path.display(),
                file.embedding_model,
                embedder.model()
            );
        }

        tracing::info!("Loaded {} records from {}", file.records.len(), path.display());

        let mut index = Self::new(path, embedder);
        index.records = file.records;
        index.dimensions = file.dimensions;
        Ok(index)
    }

    /// Persist to the storage path, replacing any previous index there
    pub async fn save(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.path).await?;

        let file = IndexFile {
            format_version: FORMAT_VERSION,
            dimensions: self.dimensions,
            embedding_model: self.embedder.model().to_string(),
            records: self.records.clone(),
        };
        let json = serde_json::to_vec(&file)?;

        let tmp = self.path.join(format!("{}.tmp", INDEX_FILE));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.path.join(INDEX_FILE)).await?;

        tracing::info!("Saved {} records to {}", self.records.len(), self.path.display());
        Ok(())
    }

    /// Delete everything at the storage path and start empty. Idempotent.
    pub async fn clear(&mut self) -> Result<()> {
        Self::clear_path(&self.path).await?;
        self.records.clear();
        self.dimensions = None;
        Ok(())
    }

    /// Remove whatever is stored at `path` and leave an empty directory
    pub async fn clear_path(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path).await? {
            tokio::fs::remove_dir_all(path).await?;
        }
        tokio::fs::create_dir_all(path).await?;
        tracing::info!("Cleared vector index at {}", path.display());
        Ok(())
    }

    /// Embed and add chunks
    ///
    /// Records are only committed when every batch succeeded; on failure the
    /// index is left exactly as it was.
    pub async fn upsert(&mut self, chunks: &[Chunk]) -> Result<UpsertReport> {
        if chunks.is_empty() {
            return Ok(UpsertReport::default());
        }

        let batches: Vec<&[Chunk]> = chunks.chunks(self.batch_size).collect();
        let total = batches.len();
        tracing::info!(
            "Embedding {} chunks in {} batch(es) with {}",
            chunks.len(),
            total,
            self.embedder.name()
        );

        let embedder = &self.embedder;
        let mut embedded: Vec<(usize, Vec<Vec<f32>>)> = stream::iter(batches.iter().enumerate())
            .map(|(i, batch)| async move {
                let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
                let vectors = embedder.embed_batch(&texts).await?;
                if vectors.len() != batch.len() {
                    return Err(Error::embedding(format!(
                        "Provider returned {} vectors for {} texts",
                        vectors.len(),
                        batch.len()
                    )));
                }
                tracing::debug!("Embedded batch {}/{} ({} chunks)", i + 1, total, batch.len());
                Ok::<_, Error>((i, vectors))
            })
            .buffer_unordered(self.max_concurrent_batches)
            .try_collect()
            .await
            .map_err(|e| {
                tracing::error!("Upsert aborted: {}", e);
                e
            })?;
        embedded.sort_by_key(|(i, _)| *i);

        let mut dimensions = self.dimensions;
        let mut staged = Vec::with_capacity(chunks.len());
        for ((_, vectors), batch) in embedded.into_iter().zip(&batches) {
            for (vector, chunk) in vectors.into_iter().zip(batch.iter()) {
                let expected = *dimensions.get_or_insert(vector.len());
                if vector.len() != expected {
                    return Err(Error::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                staged.push(EmbeddingRecord::new(chunk.clone(), vector));
            }
        }

        let report = UpsertReport {
            batches: total,
            records: staged.len(),
        };
        self.records.extend(staged);
        self.dimensions = dimensions;
        Ok(report)
    }

    /// Replace the index content: embed, clear, save
    ///
    /// Chunks are embedded before anything is cleared, so a failed rebuild
    /// leaves both the in-memory and the stored index untouched.
    pub async fn rebuild(&mut self, chunks: &[Chunk]) -> Result<UpsertReport> {
        let mut staged = Self {
            path: self.path.clone(),
            embedder: Arc::clone(&self.embedder),
            batch_size: self.batch_size,
            max_concurrent_batches: self.max_concurrent_batches,
            records: Vec::new(),
            dimensions: None,
        };
        let report = staged.upsert(chunks).await?;

        if Self::exists(&self.path) || !self.records.is_empty() {
            self.clear().await?;
        }
        self.records = staged.records;
        self.dimensions = staged.dimensions;
        self.save().await?;
        Ok(report)
    }

    /// Return the `k` chunks most similar to `text`
    ///
    /// Ties keep insertion order. An empty index returns no results without
    /// calling the embedder.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(text).await?;
        if let Some(expected) = self.dimensions {
            if query_vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        let mut results: Vec<ScoredChunk> = self
            .records
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.chunk.clone(),
                similarity: cosine_similarity(&query_vector, &record.vector),
            })
            .collect();

        // sort_by is stable, equal scores keep insertion order
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(k);

        tracing::debug!("Query returned {} of {} records", results.len(), self.records.len());
        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.embedder)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // Non-finite components score as unrelated
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chunk, KeywordEmbedder};
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n).map(|i| chunk(&format!("chunk number {}", i), i as u32)).collect()
    }

    #[tokio::test]
    async fn test_upsert_batches_and_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_index");
        let embedder = Arc::new(KeywordEmbedder::new());

        let mut index = VectorIndex::new(&path, embedder.clone());
        let report = index.upsert(&chunks(120)).await.unwrap();

        assert_eq!(report, UpsertReport { batches: 3, records: 120 });
        assert_eq!(*embedder.batch_sizes.lock().unwrap(), vec![50, 50, 20]);

        index.save().await.unwrap();
        assert!(VectorIndex::exists(&path));

        let loaded = VectorIndex::load(&path, embedder).await.unwrap();
        assert_eq!(loaded.len(), 120);
        assert_eq!(loaded.dimensions(), Some(9));
    }

    #[tokio::test]
    async fn test_concurrent_batches_keep_input_order() {
        let dir = TempDir::new().unwrap();
        let config = EmbeddingConfig {
            batch_size: 7,
            max_concurrent_batches: 4,
        };
        let mut index = VectorIndex::new(dir.path(), Arc::new(KeywordEmbedder::new()))
            .with_batch_config(&config);

        let input = chunks(30);
        index.upsert(&input).await.unwrap();

        let stored: Vec<u32> = index.records.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(stored, (0..30).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let dir = TempDir::new().unwrap();
        let mut index = VectorIndex::new(dir.path(), Arc::new(KeywordEmbedder::new()));
        index
            .upsert(&[
                chunk("The cafeteria opens at eight.", 0),
                chunk("The leave policy grants 20 days of leave.", 1),
                chunk("Rotate your password for security.", 2),
            ])
            .await
            .unwrap();

        let results = index.query("What is the leave policy?", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_index, 1);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let mut index = VectorIndex::new(dir.path(), Arc::new(KeywordEmbedder::new()));
        index
            .upsert(&[chunk("alpha", 0), chunk("beta", 1), chunk("gamma", 2)])
            .await
            .unwrap();

        let results = index.query("delta", 3).await.unwrap();
        let order: Vec<u32> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_clear_then_query_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx");
        let embedder = Arc::new(KeywordEmbedder::new());
        let mut index = VectorIndex::new(&path, embedder.clone());
        index.upsert(&chunks(5)).await.unwrap();
        index.save().await.unwrap();

        index.clear().await.unwrap();
        index.clear().await.unwrap();

        assert!(path.is_dir());
        assert!(!VectorIndex::exists(&path));
        let calls_before = embedder.calls();
        assert!(index.query("anything", 4).await.unwrap().is_empty());
        assert_eq!(embedder.calls(), calls_before);
    }

    #[tokio::test]
    async fn test_load_missing_index() {
        let dir = TempDir::new().unwrap();
        let embedder = Arc::new(KeywordEmbedder::new());

        let err = VectorIndex::load(dir.path().join("nope"), embedder.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::IndexNotFound(_)));

        // An empty directory is not an index either
        let err = VectorIndex::load(dir.path(), embedder).await.err().unwrap();
        assert!(matches!(err, Error::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_upsert_leaves_index_unchanged() {
        let dir = TempDir::new().unwrap();
        let embedder = Arc::new(KeywordEmbedder::failing_on(3));
        let mut index = VectorIndex::new(dir.path(), embedder.clone());

        index.upsert(&chunks(10)).await.unwrap();
        assert_eq!(index.len(), 10);

        // second upsert: batch call 2 ok, call 3 fails
        let err = index.upsert(&chunks(60)).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider(_)));
        assert_eq!(index.len(), 10);

        embedder.fail.store(true, Ordering::SeqCst);
        assert!(index.upsert(&chunks(1)).await.is_err());
        assert_eq!(index.len(), 10);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx");
        let embedder = Arc::new(KeywordEmbedder::new());

        let mut index = VectorIndex::new(&path, embedder.clone());
        index.rebuild(&chunks(8)).await.unwrap();

        let mut fresh = VectorIndex::new(&path, embedder.clone());
        let report = fresh.rebuild(&chunks(3)).await.unwrap();
        assert_eq!(report.records, 3);

        let loaded = VectorIndex::load(&path, embedder).await.unwrap();
        assert_eq!(loaded.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx");
        let embedder = Arc::new(KeywordEmbedder::new());

        let mut index = VectorIndex::new(&path, embedder.clone());
        index.rebuild(&chunks(8)).await.unwrap();

        embedder.fail.store(true, Ordering::SeqCst);
        let err = index.rebuild(&chunks(3)).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider(_)));
        assert_eq!(index.len(), 8);
        assert_eq!(index.dimensions(), Some(9));

        let loaded = VectorIndex::load(&path, embedder).await.unwrap();
        assert_eq!(loaded.len(), 8);
    }

    #[tokio::test]
    async fn test_nan_vector_ranks_last() {
        let dir = TempDir::new().unwrap();
        let mut index = VectorIndex::new(dir.path(), Arc::new(KeywordEmbedder::new()));
        index.upsert(&[chunk("The leave policy.", 0)]).await.unwrap();
        index
            .records
            .push(EmbeddingRecord::new(chunk("corrupt", 1), vec![f32::NAN; 9]));
        index.upsert(&[chunk("The cafeteria menu.", 2)]).await.unwrap();

        let results = index.query("leave policy", 3).await.unwrap();
        let order: Vec<u32> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, vec![0, 2, 1]);
        assert_eq!(results[2].similarity, 0.0);
        assert!(results.iter().all(|r| r.similarity.is_finite()));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::INFINITY, 1.0], &[1.0, 1.0]), 0.0);
    }
}
