//! Embedding-based nearest-neighbor index over reference law chunks.
//!
//! Entries live in RAM behind an `RwLock` and are persisted as a
//! zstd-compressed bincode file. The embedding model is initialized
//! lazily on first use, so opening an index (or querying an empty one)
//! never pays the ONNX startup cost.
//!
//! Queries and stored chunks must use the same embedding model; the
//! model name is part of the index configuration, not a per-call choice.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use rayon::prelude::*;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AssistError, Result};
use crate::index::chunk::ReferenceChunk;
use crate::index::ReferenceSource;

pub struct ReferenceIndex {
    path: PathBuf,
    model: EmbeddingModel,
    embedder: Arc<RwLock<Option<TextEmbedding>>>,
    chunks: Arc<RwLock<Vec<ReferenceChunk>>>,
}

impl ReferenceIndex {
    /// Open the index at `path`, loading persisted chunks if the file
    /// exists. `model_name` selects the embedding model and must match
    /// the one used when the chunks were indexed.
    ///
    /// A file that cannot be read or decoded opens as an empty store:
    /// stored context is an enrichment, so losing it must not take the
    /// caller down with it. The next `persist` replaces the bad file.
    pub fn open(path: impl Into<PathBuf>, model_name: &str) -> Result<Self> {
        let path = path.into();
        let model = resolve_model(model_name)?;

        let chunks = if path.exists() {
            match load_chunks(&path) {
                Ok(loaded) => {
                    info!(count = loaded.len(), path = %path.display(), "loaded reference index");
                    loaded
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "unreadable reference index, starting empty");
                    Vec::new()
                }
            }
        } else {
            debug!(path = %path.display(), "no persisted index, starting empty");
            Vec::new()
        };

        Ok(Self {
            path,
            model,
            embedder: Arc::new(RwLock::new(None)),
            chunks: Arc::new(RwLock::new(chunks)),
        })
    }

    /// Insert or replace one chunk, keyed by its id. Embeds the content
    /// first unless an embedding is already attached.
    pub async fn upsert(&self, mut chunk: ReferenceChunk) -> Result<String> {
        if chunk.embedding.is_none() {
            let embeddings = self.embed(&[chunk.content.clone()]).await?;
            chunk.embedding = embeddings.into_iter().next();
        }

        let mut chunks = self.chunks.write().await;
        chunks.retain(|c| c.id != chunk.id);

        let id = chunk.id.clone();
        chunks.push(chunk);
        Ok(id)
    }

    /// Index every slice of one source document in a single embedding
    /// batch. Ids are derived from `(source, position)`, so re-running
    /// over the same document replaces entries instead of adding more.
    pub async fn upsert_document(&self, source: &str, slices: Vec<String>) -> Result<usize> {
        if slices.is_empty() {
            return Ok(0);
        }
        let embeddings = self.embed(&slices).await?;

        let mut chunks = self.chunks.write().await;
        let mut stored = 0usize;
        for (seq, (content, embedding)) in slices.into_iter().zip(embeddings).enumerate() {
            let chunk = ReferenceChunk::new(source, seq, content).with_embedding(embedding);
            chunks.retain(|c| c.id != chunk.id);
            chunks.push(chunk);
            stored += 1;
        }
        Ok(stored)
    }

    /// Return the `k` stored chunks most similar to `text`, best first,
    /// each with its similarity filled in. An empty query is a caller
    /// bug; an empty index is not — it just yields no context.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ReferenceChunk>> {
        if text.trim().is_empty() {
            return Err(AssistError::EmptyQuery);
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        // Checked before embedding so an empty index never loads the model.
        {
            let chunks = self.chunks.read().await;
            if chunks.is_empty() {
                return Ok(Vec::new());
            }
        }

        let query_embedding = self
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AssistError::RetrievalUnavailable("embedding produced no vector".to_string())
            })?;

        let chunks = self.chunks.read().await;
        let hits = rank(&query_embedding, &chunks, k);
        debug!(hits = hits.len(), k, "reference index query");
        Ok(hits)
    }

    pub async fn count(&self) -> usize {
        self.chunks.read().await.len()
    }

    /// Write the current chunks to disk, replacing any previous file.
    pub async fn persist(&self) -> Result<()> {
        let snapshot = self.chunks.read().await.clone();
        let path = self.path.clone();
        let count = snapshot.len();

        tokio::task::spawn_blocking(move || {
            let file = File::create(&path)?;
            let writer = BufWriter::new(file);
            let mut encoder = zstd::stream::write::Encoder::new(writer, 3)?;
            bincode::serialize_into(&mut encoder, &snapshot).map_err(|e| {
                AssistError::RetrievalUnavailable(format!("failed to encode index: {e}"))
            })?;
            encoder.finish()?;
            Ok::<(), AssistError>(())
        })
        .await
        .map_err(|e| AssistError::RetrievalUnavailable(format!("persist task failed: {e}")))??;

        info!(count, path = %self.path.display(), "persisted reference index");
        Ok(())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embedder_lock = self.embedder.write().await;
        if embedder_lock.is_none() {
            // First use may download the model; keep that off the async
            // workers so callers waiting on a deadline can still time out.
            let model = self.model.clone();
            let embedder =
                tokio::task::spawn_blocking(move || TextEmbedding::try_new(InitOptions::new(model)))
                    .await
                    .map_err(|e| {
                        AssistError::RetrievalUnavailable(format!("embedder init task failed: {e}"))
                    })?
                    .map_err(|e| {
                        AssistError::RetrievalUnavailable(format!(
                            "embedding model init failed: {e}"
                        ))
                    })?;
            *embedder_lock = Some(embedder);
        }
        let embedder = match embedder_lock.as_mut() {
            Some(e) => e,
            None => unreachable!("embedder initialized above"),
        };
        let mut embeddings = embedder.embed(texts.to_vec(), None).map_err(|e| {
            AssistError::RetrievalUnavailable(format!("embedding failed: {e}"))
        })?;
        for emb in &mut embeddings {
            normalize(emb);
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl ReferenceSource for ReferenceIndex {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ReferenceChunk>> {
        ReferenceIndex::query(self, text, k).await
    }
}

fn load_chunks(path: &Path) -> Result<Vec<ReferenceChunk>> {
    let file = File::open(path)?;
    let decoder = zstd::stream::read::Decoder::new(file)?;
    bincode::deserialize_from(decoder).map_err(|e| {
        AssistError::RetrievalUnavailable(format!(
            "failed to decode index at {}: {e}",
            path.display()
        ))
    })
}

/// Score every embedded chunk against the query vector and keep the top
/// `k`. The sort is stable, so equal scores keep insertion order.
fn rank(query: &[f32], chunks: &[ReferenceChunk], k: usize) -> Vec<ReferenceChunk> {
    let mut scored: Vec<(f32, ReferenceChunk)> = chunks
        .par_iter()
        .filter_map(|c| {
            c.embedding
                .as_ref()
                .map(|emb| (dot_product(query, emb), c.clone()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(k)
        .map(|(score, mut chunk)| {
            chunk.similarity = Some(score);
            chunk
        })
        .collect()
}

fn normalize(vec: &mut Vec<f32>) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec {
            *x /= norm;
        }
    }
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn resolve_model(name: &str) -> Result<EmbeddingModel> {
    match name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        other => Err(AssistError::Config(format!(
            "unknown embedding model '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // Preset embeddings keep these tests free of the ONNX runtime.
    fn chunk(source: &str, seq: usize, content: &str, emb: Vec<f32>) -> ReferenceChunk {
        ReferenceChunk::new(source, seq, content).with_embedding(emb)
    }

    #[tokio::test]
    async fn empty_query_text_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let index = ReferenceIndex::open(dir.path().join("laws.idx"), "all-minilm-l6-v2")?;
        assert!(matches!(index.query("", 3).await, Err(AssistError::EmptyQuery)));
        assert!(matches!(index.query("  \n ", 3).await, Err(AssistError::EmptyQuery)));
        Ok(())
    }

    #[tokio::test]
    async fn zero_k_returns_nothing_without_embedding() -> Result<()> {
        let dir = tempdir()?;
        let index = ReferenceIndex::open(dir.path().join("laws.idx"), "all-minilm-l6-v2")?;
        index.upsert(chunk("act", 0, "text", vec![1.0, 0.0])).await?;
        // Would need the model if it tried to embed; returning Ok proves
        // the guard fires first.
        assert!(index.query("anything", 0).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn empty_index_yields_empty_result() -> Result<()> {
        let dir = tempdir()?;
        let index = ReferenceIndex::open(dir.path().join("laws.idx"), "all-minilm-l6-v2")?;
        assert!(index.query("termination notice period", 3).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn reindexing_same_source_does_not_duplicate() -> Result<()> {
        let dir = tempdir()?;
        let index = ReferenceIndex::open(dir.path().join("laws.idx"), "all-minilm-l6-v2")?;

        for _ in 0..2 {
            index.upsert(chunk("act.pdf", 0, "first slice", vec![1.0, 0.0])).await?;
            index.upsert(chunk("act.pdf", 1, "second slice", vec![0.0, 1.0])).await?;
        }

        assert_eq!(index.count().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn upsert_replaces_content_for_same_id() -> Result<()> {
        let dir = tempdir()?;
        let index = ReferenceIndex::open(dir.path().join("laws.idx"), "all-minilm-l6-v2")?;

        index.upsert(chunk("act.pdf", 0, "old text", vec![1.0, 0.0])).await?;
        index.upsert(chunk("act.pdf", 0, "new text", vec![1.0, 0.0])).await?;

        let chunks = index.chunks.read().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "new text");
        Ok(())
    }

    #[tokio::test]
    async fn persisted_index_reloads_with_same_entries() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("laws.idx");

        let index = ReferenceIndex::open(&path, "all-minilm-l6-v2")?;
        index.upsert(chunk("act.pdf", 0, "notice period", vec![0.6, 0.8])).await?;
        index.upsert(chunk("act.pdf", 1, "security deposit", vec![0.8, 0.6])).await?;
        index.persist().await?;

        let reopened = ReferenceIndex::open(&path, "all-minilm-l6-v2")?;
        assert_eq!(reopened.count().await, 2);
        let chunks = reopened.chunks.read().await;
        assert_eq!(chunks[0].content, "notice period");
        assert_eq!(chunks[0].embedding.as_ref().map(Vec::len), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_index_file_opens_empty_and_is_replaced_on_persist() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("laws.idx");
        std::fs::write(&path, b"not a zstd stream")?;

        // An undecodable file must not fail the caller; it opens empty
        // and queries simply yield no context.
        let index = ReferenceIndex::open(&path, "all-minilm-l6-v2")?;
        assert_eq!(index.count().await, 0);
        assert!(index.query("notice period", 3).await?.is_empty());

        index.upsert(chunk("act.pdf", 0, "fresh entry", vec![1.0, 0.0])).await?;
        index.persist().await?;
        let reopened = ReferenceIndex::open(&path, "all-minilm-l6-v2")?;
        assert_eq!(reopened.count().await, 1);
        Ok(())
    }

    #[test]
    fn ranking_orders_by_similarity_descending() {
        let chunks = vec![
            chunk("a", 0, "far", vec![0.0, 1.0]),
            chunk("a", 1, "near", vec![1.0, 0.0]),
            chunk("a", 2, "middle", vec![0.7071, 0.7071]),
        ];
        let hits = rank(&[1.0, 0.0], &chunks, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "near");
        assert_eq!(hits[1].content, "middle");
        assert!(hits[0].similarity.unwrap() > hits[1].similarity.unwrap());
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        let chunks = vec![
            chunk("a", 0, "first", vec![1.0, 0.0]),
            chunk("a", 1, "second", vec![1.0, 0.0]),
        ];
        let hits = rank(&[1.0, 0.0], &chunks, 2);
        assert_eq!(hits[0].content, "first");
        assert_eq!(hits[1].content, "second");
    }

    #[test]
    fn rank_ignores_chunks_without_embeddings() {
        let chunks = vec![
            ReferenceChunk::new("a", 0, "no embedding"),
            chunk("a", 1, "embedded", vec![1.0, 0.0]),
        ];
        let hits = rank(&[1.0, 0.0], &chunks, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "embedded");
    }

    #[test]
    fn normalize_produces_unit_vectors() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((dot_product(&v, &v) - 1.0).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn unknown_model_name_is_a_config_error() {
        assert!(matches!(
            resolve_model("word2vec"),
            Err(AssistError::Config(_))
        ));
        assert!(resolve_model("ALL-MiniLM-L6-V2").is_ok());
    }
}
