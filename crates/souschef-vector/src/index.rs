//! In-memory cosine-similarity index over named collections.
//!
//! Each collection sits behind its own read/write lock: searches run
//! concurrently, upserts into one collection are serialised and never block
//! searches on another.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use souschef_core::error::{Error, Result};
use souschef_core::types::{Chunk, ChunkId, RetrievalResult, ScoredChunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

#[derive(Debug)]
struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
    norm: f32,
}

#[derive(Debug)]
struct Collection {
    dimension: usize,
    // Insertion order; replacing a chunk keeps its slot.
    entries: Vec<Entry>,
    slots: HashMap<ChunkId, usize>,
}

impl Collection {
    fn check_dimension(&self, name: &str, actual: usize) -> Result<()> {
        if actual != self.dimension {
            return Err(Error::DimensionMismatch { collection: name.to_string(), expected: self.dimension, actual });
        }
        Ok(())
    }

    fn insert_or_replace(&mut self, chunk: Chunk, vector: Vec<f32>) -> Upsert {
        let norm = l2_norm(&vector);
        if let Some(&slot) = self.slots.get(&chunk.id) {
            self.entries[slot] = Entry { chunk, vector, norm };
            return Upsert::Replaced;
        }
        self.slots.insert(chunk.id.clone(), self.entries.len());
        self.entries.push(Entry { chunk, vector, norm });
        Upsert::Inserted
    }
}

#[derive(Debug, Default)]
pub struct VectorIndex {
    collections: RwLock<HashMap<String, Arc<RwLock<Collection>>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a collection of `dimension`-wide vectors. Declaring an existing
    /// collection again with the same dimension is a no-op.
    pub fn create_collection(&self, name: &str, dimension: usize) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("collection name must not be empty".into()));
        }
        if dimension == 0 {
            return Err(Error::InvalidArgument("collection dimension must be at least 1".into()));
        }
        let mut collections = self.collections.write();
        if let Some(existing) = collections.get(name) {
            return existing.read().check_dimension(name, dimension);
        }
        collections.insert(
            name.to_string(),
            Arc::new(RwLock::new(Collection { dimension, entries: Vec::new(), slots: HashMap::new() })),
        );
        debug!(collection = name, dimension, "created collection");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.read().contains_key(name)
    }

    /// Collection names, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn dimension(&self, name: &str) -> Result<usize> {
        Ok(self.collection(name)?.read().dimension)
    }

    pub fn len(&self, name: &str) -> Result<usize> {
        Ok(self.collection(name)?.read().entries.len())
    }

    pub fn is_empty(&self, name: &str) -> Result<bool> {
        self.len(name).map(|n| n == 0)
    }

    /// The stored chunk and vector for `id`, if present.
    pub fn get(&self, name: &str, id: &str) -> Result<Option<(Chunk, Vec<f32>)>> {
        let handle = self.collection(name)?;
        let collection = handle.read();
        Ok(collection.slots.get(id).map(|&slot| {
            let entry = &collection.entries[slot];
            (entry.chunk.clone(), entry.vector.clone())
        }))
    }

    /// Insert `chunk` or replace the vector and text of an existing chunk with the same id.
    pub fn upsert(&self, name: &str, chunk: Chunk, vector: Vec<f32>) -> Result<Upsert> {
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidArgument(format!("vector for chunk '{}' has non-finite components", chunk.id)));
        }
        let handle = self.collection(name)?;
        let mut collection = handle.write();
        collection.check_dimension(name, vector.len())?;
        Ok(collection.insert_or_replace(chunk, vector))
    }

    /// Upsert every entry or none of them.
    ///
    /// All vectors are checked before the first write, and the collection's
    /// write lock is held for the whole batch.
    pub fn upsert_many(&self, name: &str, entries: Vec<(Chunk, Vec<f32>)>) -> Result<Vec<Upsert>> {
        let handle = self.collection(name)?;
        let mut collection = handle.write();
        for (chunk, vector) in &entries {
            collection.check_dimension(name, vector.len())?;
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::InvalidArgument(format!("vector for chunk '{}' has non-finite components", chunk.id)));
            }
        }
        Ok(entries.into_iter().map(|(chunk, vector)| collection.insert_or_replace(chunk, vector)).collect())
    }

    /// The `k` chunks most similar to `query`, best first.
    ///
    /// `k` larger than the collection is clamped. Equal scores keep
    /// insertion order.
    pub fn search(&self, name: &str, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".into()));
        }
        let handle = self.collection(name)?;
        let collection = handle.read();
        collection.check_dimension(name, query.len())?;
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidArgument("query vector has non-finite components".into()));
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(usize, f32)> = collection
            .entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| (slot, cosine(query, query_norm, &entry.vector, entry.norm)))
            .collect();
        // Stable sort: ties stay in slot order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(slot, score)| ScoredChunk { chunk: collection.entries[slot].chunk.clone(), score })
            .collect())
    }

    fn collection(&self, name: &str) -> Result<Arc<RwLock<Collection>>> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with precomputed norms; 0.0 when either side is the zero vector.
fn cosine(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}
