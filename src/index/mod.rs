//! Reference law index
//!
//! A persisted embedding index over chunks of reference legal text.
//! Populated offline by the ingestion job, queried read-only by the
//! analysis pipeline.

mod chunk;
mod store;

pub use chunk::{chunk_text, ReferenceChunk};
pub use store::ReferenceIndex;

use async_trait::async_trait;

use crate::error::Result;

/// Read side of the index as the analysis pipeline sees it. Ingestion
/// writes through the concrete [`ReferenceIndex`]; analysis only asks
/// for context.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Return up to `k` stored chunks relevant to `text`, best first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ReferenceChunk>>;
}
