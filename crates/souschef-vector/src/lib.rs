//! Vector index, retriever and ingestion pipeline.

pub mod index;
pub mod ingest;
pub mod retriever;

pub use index::{Upsert, VectorIndex};
pub use ingest::{IngestReport, Ingestor};
pub use retriever::{Retriever, RetrieverConfig, DEFAULT_TOP_K};
