//! Reference chunk types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-size slice of a reference document, the unit stored in and
/// returned by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceChunk {
    /// Stable identifier, `{source}_{seq}`. Deterministic so re-indexing
    /// the same document overwrites instead of duplicating.
    pub id: String,
    /// Name of the source document this slice came from
    pub source: String,
    /// Zero-based position of this slice within the source document
    pub seq: usize,
    /// The chunk text itself
    pub content: String,
    /// When this chunk was (re-)indexed
    pub indexed_at: DateTime<Utc>,
    /// Embedding vector (populated at index time)
    pub embedding: Option<Vec<f32>>,
    /// Similarity to the query (only set on search results)
    ///
    /// No `skip_serializing_if` on these options: the struct round-trips
    /// through bincode, which cannot decode skipped fields.
    pub similarity: Option<f32>,
}

impl ReferenceChunk {
    pub fn new(source: impl Into<String>, seq: usize, content: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            id: format!("{}_{}", source, seq),
            source,
            seq,
            content: content.into(),
            indexed_at: Utc::now(),
            embedding: None,
            similarity: None,
        }
    }

    /// Attach a precomputed embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Split `text` into consecutive slices of at most `size` characters.
/// Counts characters, not bytes, so multi-byte text never splits mid-char.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    if size == 0 {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for c in text.chars() {
        current.push(c);
        count += 1;
        if count == size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
