//! Plain-text document loading with an optional cache-aside layer.
//!
//! PDF extraction happens upstream; sources here are `.txt`/`.md` files or
//! directories of them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::DocumentCache;
use crate::types::Document;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Clone, Default)]
pub struct DocumentLoader {
    cache: Option<Arc<dyn DocumentCache>>,
}

impl DocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: Arc<dyn DocumentCache>) -> Self {
        Self { cache: Some(cache) }
    }

    /// Load every document under `path`, consulting the cache first.
    ///
    /// Cache failures are logged and otherwise ignored.
    pub fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let files = list_source_files(path)?;
        let Some(cache) = &self.cache else {
            return read_documents(path, &files);
        };

        let key = cache_key(&files)?;
        match cache.load(&key) {
            Ok(Some(documents)) => {
                debug!(path = %path.display(), key = %key, "document cache hit");
                return Ok(documents);
            }
            Ok(None) => debug!(path = %path.display(), key = %key, "document cache miss"),
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable cache entry"),
        }

        let documents = read_documents(path, &files)?;
        if let Err(e) = cache.save(&key, &documents) {
            warn!(path = %path.display(), error = %e, "failed to write document cache");
        }
        Ok(documents)
    }
}

fn read_documents(root: &Path, files: &[PathBuf]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        documents.push(Document {
            id: document_id(root, path),
            source_path: path.to_string_lossy().to_string(),
            raw_text: read_text(path)?,
        });
    }
    info!(files = files.len(), "loaded source documents");
    Ok(documents)
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// `path` relative to the loaded root, extension kept, `/`-separated.
///
/// A single-file root is identified by its file name.
pub fn document_id(root: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path.file_name().map_or(path, Path::new),
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_text_file(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext))
}

/// The source files behind `path` in sorted order.
pub fn list_source_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_text_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// Cache key covering path, size and modification time of every source file,
/// so editing a source invalidates its entry.
pub fn cache_key(files: &[PathBuf]) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for path in files {
        let meta = fs::metadata(path)?;
        let mtime = meta.modified().ok().and_then(|t| t.duration_since(UNIX_EPOCH).ok()).map_or(0, |d| d.as_nanos());
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(&meta.len().to_le_bytes());
        hasher.update(&mtime.to_le_bytes());
    }
    Ok(hasher.finalize().to_hex().to_string())
}
