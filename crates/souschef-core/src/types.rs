//! Domain types shared by the loader, the vector index and the agent.

use serde::{Deserialize, Serialize};

pub type DocumentId = String;
pub type ChunkId = String;

/// A source text as it was read at ingestion time.
///
/// - `id`: stable document identity (file stem)
/// - `source_path`: original path to the source file
/// - `raw_text`: full extracted text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub source_path: String,
    pub raw_text: String,
}

/// A bounded span of a [`Document`], the unit of retrieval.
///
/// The embedding vector is not part of the chunk: the vector index stores it
/// next to the chunk when the chunk is upserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub source_path: String,
    pub text: String,
    pub position: usize,
}

/// A retrieved chunk with its cosine similarity to the query (higher is better).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Up to `k` chunks, sorted by descending score.
pub type RetrievalResult = Vec<ScoredChunk>;
