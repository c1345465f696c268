use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Tool '{0}' is already registered")]
    DuplicateName(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Vector dimension mismatch in '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch { collection: String, expected: usize, actual: usize },

    #[error("Embedding provider unavailable ({provider}): {message}")]
    EmbeddingUnavailable { provider: String, message: String },

    #[error("Tool '{tool}' failed: {source}")]
    ToolExecution {
        tool: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Language model error ({model}): {message}")]
    LanguageModel { model: String, message: String },

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout { operation: String, after: Duration },

    #[error("Document cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the two "not found" flavours (missing collection or source file).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::CollectionNotFound(_) | Error::FileNotFound(_))
    }

    pub fn embedding(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::EmbeddingUnavailable { provider: provider.into(), message: message.to_string() }
    }

    pub fn model(model: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::LanguageModel { model: model.into(), message: message.to_string() }
    }

    pub fn tool(tool: impl Into<String>, source: Error) -> Self {
        Error::ToolExecution { tool: tool.into(), source: Box::new(source) }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
