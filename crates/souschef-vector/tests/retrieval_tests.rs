use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use souschef_core::chunker::Chunker;
use souschef_core::error::{Error, Result};
use souschef_core::loader::DocumentLoader;
use souschef_core::traits::EmbeddingProvider;
use souschef_core::types::Document;
use souschef_embed::{HashEmbedder, LocalProvider};
use souschef_vector::{Ingestor, Retriever, RetrieverConfig, VectorIndex};
use tempfile::TempDir;

const DICTIONARY: &str = "\
Agar is a jelly made from seaweed, used to set sweets.

Aloo is a word for potato in South Asian cuisine.

Brine: salted water used for pickling vegetables and curing meat.

Chutney, a relish of fruit, spices and vinegar.";

fn hash_provider() -> Arc<dyn EmbeddingProvider> {
    Arc::new(LocalProvider::new(Arc::new(HashEmbedder::new(1024)), "hash-1024"))
}

fn write_source(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[tokio::test]
async fn aloo_sentence_is_top_hit() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(&tmp, "dictionary.txt", DICTIONARY);
    let index = Arc::new(VectorIndex::new());
    let provider = hash_provider();

    let report = Ingestor::new(index.clone(), provider.clone(), DocumentLoader::new(), Chunker::default())
        .ingest_path("dictionary", &source)
        .await
        .expect("ingest");
    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks, 4);

    let retriever = Retriever::new(index, provider, RetrieverConfig::default()).unwrap();
    let results = retriever.query("dictionary", "What is aloo?").await.expect("query");
    assert_eq!(results.len(), 3, "default top_k is 3");
    assert_eq!(results[0].chunk.text, "Aloo is a word for potato in South Asian cuisine.");
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn reingesting_replaces_chunks() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(&tmp, "dictionary.txt", DICTIONARY);
    let index = Arc::new(VectorIndex::new());
    let ingestor = Ingestor::new(index.clone(), hash_provider(), DocumentLoader::new(), Chunker::default()).with_batch_size(3);

    ingestor.ingest_path("dictionary", &source).await.unwrap();
    let again = ingestor.ingest_path("dictionary", &source).await.unwrap();
    assert_eq!(again.replaced, 4);
    assert_eq!(index.len("dictionary").unwrap(), 4);
}

#[tokio::test]
async fn same_stem_sources_keep_separate_chunks() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("old")).unwrap();
    fs::create_dir(tmp.path().join("new")).unwrap();
    write_source(&tmp, "old/potatoes.txt", "Boil old potatoes in their skins.");
    write_source(&tmp, "new/potatoes.md", "Steam new potatoes with mint.");
    let index = Arc::new(VectorIndex::new());

    let report = Ingestor::new(index.clone(), hash_provider(), DocumentLoader::new(), Chunker::default())
        .ingest_path("cookbook", tmp.path())
        .await
        .expect("ingest");
    assert_eq!((report.documents, report.chunks, report.replaced), (2, 2, 0));
    assert_eq!(index.len("cookbook").unwrap(), 2);

    let (old, _) = index.get("cookbook", "old/potatoes.txt:0").unwrap().expect("old chunk stored");
    let (new, _) = index.get("cookbook", "new/potatoes.md:0").unwrap().expect("new chunk stored");
    assert_eq!(old.text, "Boil old potatoes in their skins.");
    assert_eq!(new.document_id, "new/potatoes.md");
}

#[tokio::test]
async fn duplicate_document_ids_are_rejected() {
    let index = Arc::new(VectorIndex::new());
    let ingestor = Ingestor::new(index.clone(), hash_provider(), DocumentLoader::new(), Chunker::default());
    let doc = |text: &str| Document { id: "potatoes".into(), source_path: "potatoes.txt".into(), raw_text: text.into() };

    let err = ingestor.ingest_documents("cookbook", &[doc("Boil them."), doc("Roast them.")]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
    assert!(!index.contains("cookbook"), "nothing created on rejected input");
}

#[tokio::test]
async fn failed_embedding_batch_writes_nothing() {
    let index = Arc::new(VectorIndex::new());
    let provider = Arc::new(FailsAfterFirstBatch { calls: AtomicUsize::new(0) });
    let doc = Document {
        id: "cookbook.txt".into(),
        source_path: "cookbook.txt".into(),
        raw_text: "Boil the potatoes.\n\nRoast the joint.\n\nStrain the gravy.".into(),
    };
    let ingestor = Ingestor::new(index.clone(), provider.clone(), DocumentLoader::new(), Chunker::default()).with_batch_size(1);

    let err = ingestor.ingest_documents("cookbook", &[doc]).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingUnavailable { .. }), "{err}");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    assert_eq!(index.len("cookbook").unwrap(), 0);
}

#[tokio::test]
async fn missing_source_is_not_found() {
    let index = Arc::new(VectorIndex::new());
    let ingestor = Ingestor::new(index, hash_provider(), DocumentLoader::new(), Chunker::default());
    let err = ingestor.ingest_path("cookbook", PathBuf::from("/no/such/cookbook.txt").as_path()).await.unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
}

#[tokio::test]
async fn unknown_collection_fails_without_embedding() {
    let retriever = Retriever::new(Arc::new(VectorIndex::new()), Arc::new(Unavailable), RetrieverConfig::default()).unwrap();
    let err = retriever.query("cookbook", "roast").await.unwrap_err();
    assert!(matches!(err, Error::CollectionNotFound(_)), "{err}");
}

#[tokio::test]
async fn embedding_failure_propagates() {
    let index = Arc::new(VectorIndex::new());
    index.create_collection("cookbook", 4).unwrap();
    let retriever = Retriever::new(index, Arc::new(Unavailable), RetrieverConfig::default()).unwrap();
    let err = retriever.query("cookbook", "roast").await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingUnavailable { .. }), "{err}");
}

#[tokio::test(start_paused = true)]
async fn slow_embedding_times_out() {
    let index = Arc::new(VectorIndex::new());
    index.create_collection("cookbook", 4).unwrap();
    let config = RetrieverConfig { top_k: 3, embed_timeout: Some(Duration::from_millis(50)) };
    let retriever = Retriever::new(index, Arc::new(Slow), config).unwrap();
    let err = retriever.query("cookbook", "roast").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "{err}");
}

#[test]
fn zero_top_k_is_invalid_config() {
    let config = RetrieverConfig { top_k: 0, embed_timeout: None };
    assert!(Retriever::new(Arc::new(VectorIndex::new()), hash_provider(), config).is_err());
}

struct Unavailable;

#[async_trait]
impl EmbeddingProvider for Unavailable {
    fn provider_id(&self) -> &str {
        "unavailable"
    }
    fn dimension(&self) -> usize {
        4
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::embedding("unavailable", "connection refused"))
    }
}

struct Slow;

#[async_trait]
impl EmbeddingProvider for Slow {
    fn provider_id(&self) -> &str {
        "slow"
    }
    fn dimension(&self) -> usize {
        4
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(texts.iter().map(|_| vec![1.0; 4]).collect())
    }
}

struct FailsAfterFirstBatch {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FailsAfterFirstBatch {
    fn provider_id(&self) -> &str {
        "flaky"
    }
    fn dimension(&self) -> usize {
        4
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(Error::embedding("flaky", "connection reset"));
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
    }
}
