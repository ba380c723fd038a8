//! Embedding providers: the trait seam plus the HTTP client implementation.

use anyhow::{anyhow, Result};

pub mod openai;

pub use openai::{EmbeddingClient, EmbeddingConfig};

/// Maps batches of text to fixed-dimension embedding vectors.
///
/// Implementations must preserve input order, return exactly one vector per
/// input, and keep the vector dimension constant across calls. The same
/// implementation must be used at index-build time and at query time, or
/// similarity scores are meaningless.
pub trait Embedder: Send + Sync {
    /// Embeds a batch of documents, preserving input order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single query string.
    fn embed_query(&self, input: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[input])?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for query"))
    }
}
