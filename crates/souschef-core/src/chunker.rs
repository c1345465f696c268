use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Splitting policy for turning documents into chunks.
///
/// Paragraphs (separated by a blank line) become one chunk each. A paragraph
/// estimated above `max_tokens` is cut into windows of `words_per_chunk`
/// words that overlap by `overlap_percent` of a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub words_per_chunk: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, words_per_chunk: 300, overlap_percent: 0.2 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 || self.words_per_chunk == 0 {
            return Err(Error::InvalidConfig("chunking sizes must be greater than zero".into()));
        }
        if !(0.0..1.0).contains(&self.overlap_percent) {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap_percent must be in [0, 1), got {}",
                self.overlap_percent
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for paragraph in document.raw_text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if estimate_tokens(paragraph) <= self.config.max_tokens {
                chunks.push(make_chunk(document, chunks.len(), paragraph.to_string()));
            } else {
                for window in self.split_with_overlap(paragraph) {
                    chunks.push(make_chunk(document, chunks.len(), window));
                }
            }
        }
        chunks
    }

    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.chunk(d)).collect()
    }

    fn split_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let window = self.config.words_per_chunk;
        // A window always advances by at least one word.
        let overlap = ((window as f32 * self.config.overlap_percent) as usize).min(window - 1);
        let mut out = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + window).min(words.len());
            out.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap;
        }
        out
    }
}

/// Rough token estimate: about 0.75 words per token.
pub fn estimate_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f32 / 0.75) as usize
}

fn make_chunk(document: &Document, position: usize, text: String) -> Chunk {
    Chunk {
        id: format!("{}:{}", document.id, position),
        document_id: document.id.clone(),
        source_path: document.source_path.clone(),
        text,
        position,
    }
}
