//! JSON-file document cache.
//!
//! One file per key under the cache directory. Entries are an envelope holding
//! the key, the save time and the documents.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::DocumentCache;
use crate::types::Document;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    key: String,
    saved_at: DateTime<Utc>,
    documents: Vec<Document>,
}

#[derive(Debug, Clone)]
pub struct JsonDocumentCache {
    dir: PathBuf,
}

impl JsonDocumentCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl DocumentCache for JsonDocumentCache {
    fn load(&self, key: &str) -> Result<Option<Vec<Document>>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let envelope: CacheEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Cache(format!("{}: {e}", path.display())))?;
        if envelope.key != key {
            return Err(Error::Cache(format!("{}: entry belongs to key {}", path.display(), envelope.key)));
        }
        debug!(key, saved_at = %envelope.saved_at, documents = envelope.documents.len(), "read cache entry");
        Ok(Some(envelope.documents))
    }

    fn save(&self, key: &str, documents: &[Document]) -> Result<()> {
        let envelope = CacheEnvelope { key: key.to_string(), saved_at: Utc::now(), documents: documents.to_vec() };
        let json = serde_json::to_vec(&envelope).map_err(|e| Error::Cache(e.to_string()))?;
        // Write then rename so a crash never leaves a half-written entry.
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.entry_path(key))?;
        Ok(())
    }
}
