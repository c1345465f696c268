use async_trait::async_trait;

use crate::error::Result;
use crate::types::Document;

/// Synchronous, CPU-bound embedding model.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedding provider as seen by the retriever and the ingestion pipeline.
///
/// Implementations must return vectors of length [`dimension`](Self::dimension)
/// and should be deterministic for identical input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:d512`).
    fn provider_id(&self) -> &str;
    fn dimension(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| crate::error::Error::embedding(self.provider_id(), "provider returned no vector"))
    }
}

/// Persistent store of parsed documents, keyed by source identity.
///
/// A miss is `Ok(None)`, never an error.
pub trait DocumentCache: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<Document>>>;
    fn save(&self, key: &str, documents: &[Document]) -> Result<()>;
}
