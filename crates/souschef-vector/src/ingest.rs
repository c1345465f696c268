//! Ingestion: load (cache-aside) → chunk → embed in batches → upsert.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use souschef_core::chunker::Chunker;
use souschef_core::error::{Error, Result};
use souschef_core::loader::DocumentLoader;
use souschef_core::traits::EmbeddingProvider;
use souschef_core::types::Document;

use crate::index::{Upsert, VectorIndex};

const DEFAULT_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub documents: usize,
    pub chunks: usize,
    pub replaced: usize,
}

pub struct Ingestor {
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    loader: DocumentLoader,
    chunker: Chunker,
    batch_size: usize,
    show_progress: bool,
}

impl Ingestor {
    pub fn new(index: Arc<VectorIndex>, provider: Arc<dyn EmbeddingProvider>, loader: DocumentLoader, chunker: Chunker) -> Self {
        Self { index, provider, loader, chunker, batch_size: DEFAULT_BATCH_SIZE, show_progress: false }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn ingest_path(&self, collection: &str, path: &Path) -> Result<IngestReport> {
        let documents = self.loader.load(path)?;
        info!(collection, path = %path.display(), documents = documents.len(), "ingesting");
        self.ingest_documents(collection, &documents).await
    }

    /// Create `collection` if needed and index every chunk of `documents`.
    ///
    /// All chunks are embedded before anything is written, so a failed call
    /// leaves the collection as it was.
    pub async fn ingest_documents(&self, collection: &str, documents: &[Document]) -> Result<IngestReport> {
        let mut ids = HashSet::new();
        if let Some(dup) = documents.iter().find(|d| !ids.insert(d.id.as_str())) {
            return Err(Error::InvalidArgument(format!("document id '{}' appears more than once", dup.id)));
        }
        self.index.create_collection(collection, self.provider.dimension())?;
        let chunks = self.chunker.chunk_all(documents);
        let pb = self.progress_bar(chunks.len());

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.provider.embed_batch(&texts).await?;
            if embedded.len() != batch.len() {
                return Err(Error::embedding(
                    self.provider.provider_id(),
                    format!("expected {} vectors, got {}", batch.len(), embedded.len()),
                ));
            }
            vectors.extend(embedded);
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();

        let entries = chunks.iter().cloned().zip(vectors).collect();
        let replaced = self
            .index
            .upsert_many(collection, entries)?
            .into_iter()
            .filter(|u| *u == Upsert::Replaced)
            .count();

        let report = IngestReport {
            collection: collection.to_string(),
            documents: documents.len(),
            chunks: chunks.len(),
            replaced,
        };
        info!(collection, documents = report.documents, chunks = report.chunks, replaced, "ingest complete");
        Ok(report)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }
}
