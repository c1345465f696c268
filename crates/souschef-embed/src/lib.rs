//! Embedding providers for souschef.
//!
//! `hash` / `hash-<dim>` selects the built-in [`HashEmbedder`]; `bge-m3`
//! selects the local candle model (requires the `candle` feature). Every
//! provider is wrapped in [`LocalProvider`] so embedding can be timed out.

use std::sync::Arc;

use souschef_core::config::Settings;
use souschef_core::error::{Error, Result};
use souschef_core::traits::{Embedder, EmbeddingProvider};
use tracing::info;

#[cfg(feature = "candle")]
pub mod candle;
mod hash;
mod provider;

pub use hash::HashEmbedder;
pub use provider::LocalProvider;

/// Which embedder a model name selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingModelKind {
    Hash { dim: usize },
    BgeM3,
}

impl EmbeddingModelKind {
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "hash" => Ok(Self::Hash { dim: HashEmbedder::DEFAULT_DIM }),
            "bge-m3" | "baai/bge-m3" => Ok(Self::BgeM3),
            other => match other.strip_prefix("hash-").map(str::parse::<usize>) {
                Some(Ok(dim)) if dim > 0 => Ok(Self::Hash { dim }),
                _ => Err(Error::InvalidConfig(format!("unknown embedding model '{other}'"))),
            },
        }
    }
}

pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    match EmbeddingModelKind::parse(&settings.embedding_model_name)? {
        EmbeddingModelKind::Hash { dim } => Ok(Arc::new(HashEmbedder::new(dim))),
        EmbeddingModelKind::BgeM3 => load_bge_m3(settings),
    }
}

/// The provider named by `settings.embedding_model_name`.
pub fn build_provider(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder = build_embedder(settings)?;
    let provider = LocalProvider::new(embedder, &settings.embedding_model_name);
    info!(provider = provider.provider_id(), "embedding provider ready");
    Ok(Arc::new(provider))
}

#[cfg(feature = "candle")]
fn load_bge_m3(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let dir = candle::resolve_model_dir(settings.model_dir.as_deref())?;
    Ok(Arc::new(candle::BgeM3Embedder::load(&dir, 256)?))
}

#[cfg(not(feature = "candle"))]
fn load_bge_m3(_settings: &Settings) -> Result<Arc<dyn Embedder>> {
    Err(Error::InvalidConfig("embedding model 'bge-m3' requires the `candle` feature".into()))
}
