//! Async adapter over synchronous embedders.
//!
//! Embedding runs on tokio's blocking pool so callers can put a timeout
//! around it without stalling the async workers.

use std::sync::Arc;

use async_trait::async_trait;
use souschef_core::error::{Error, Result};
use souschef_core::traits::{Embedder, EmbeddingProvider};
use tracing::debug;

pub struct LocalProvider {
    inner: Arc<dyn Embedder>,
    id: String,
}

impl LocalProvider {
    pub fn new(inner: Arc<dyn Embedder>, model_name: &str) -> Self {
        let id = format!("local:{}:d{}", model_name, inner.dim());
        Self { inner, id }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.inner.dim()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inner = Arc::clone(&self.inner);
        let owned = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || inner.embed_batch(&owned))
            .await
            .map_err(|e| Error::embedding(&self.id, format!("embedding task failed: {e}")))?
            .map_err(|e| match e {
                e @ Error::EmbeddingUnavailable { .. } => e,
                other => Error::embedding(&self.id, other),
            })?;

        if vectors.len() != texts.len() {
            return Err(Error::embedding(
                &self.id,
                format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            ));
        }
        let dim = self.inner.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::embedding(&self.id, format!("expected dimension {dim}, got {}", bad.len())));
        }
        debug!(provider = %self.id, texts = texts.len(), "embedded batch");
        Ok(vectors)
    }
}
