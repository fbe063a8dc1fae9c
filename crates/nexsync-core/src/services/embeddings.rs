//! Bridge between the sync engine and the nexsync-embeddings crate.
//!
//! The engine only sees the [`Embedder`] trait so tests can swap in a
//! scripted implementation.

use async_trait::async_trait;
pub use nexsync_embeddings::EmbedMode;
use nexsync_embeddings::EmbeddingService;

use crate::error::Result;

/// Turns texts into vectors, one per text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: Vec<String>, mode: EmbedMode) -> Result<Vec<Vec<f32>>>;

    /// Dimension of the produced vectors
    fn dimension(&self) -> usize;
}

#[async_trait]
impl Embedder for EmbeddingService {
    async fn embed(&self, texts: Vec<String>, mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        Ok(EmbeddingService::embed(self, texts, mode).await?)
    }

    fn dimension(&self) -> usize {
        EmbeddingService::dimension(self)
    }
}
