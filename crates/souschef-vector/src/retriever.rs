use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use souschef_core::error::{Error, Result};
use souschef_core::traits::EmbeddingProvider;
use souschef_core::types::RetrievalResult;

use crate::index::VectorIndex;

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub embed_timeout: Option<Duration>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K, embed_timeout: None }
    }
}

/// Embeds a query and searches one collection of the shared index.
///
/// Provider failures are returned as they are; nothing is retried.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, provider: Arc<dyn EmbeddingProvider>, config: RetrieverConfig) -> Result<Self> {
        if config.top_k == 0 {
            return Err(Error::InvalidConfig("retriever top_k must be at least 1".into()));
        }
        Ok(Self { index, provider, config })
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub async fn query(&self, collection: &str, text: &str) -> Result<RetrievalResult> {
        self.query_with_k(collection, text, self.config.top_k).await
    }

    pub async fn query_with_k(&self, collection: &str, text: &str, k: usize) -> Result<RetrievalResult> {
        // Fail before paying for an embedding call.
        if !self.index.contains(collection) {
            return Err(Error::CollectionNotFound(collection.to_string()));
        }
        let vector = self.embed(text).await?;
        let results = self.index.search(collection, &vector, k)?;
        debug!(collection, k, hits = results.len(), top = results.first().map(|r| r.score), "retrieved");
        Ok(results)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let fut = self.provider.embed(text);
        match self.config.embed_timeout {
            None => fut.await,
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| Error::Timeout { operation: format!("embedding with {}", self.provider.provider_id()), after })?,
        }
    }
}
