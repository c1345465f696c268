//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `souschef.toml` + `souschef.<env>.toml` +
//! `SOUSCHEF_*` env vars (nested keys separated by `__`). The merged
//! configuration is extracted once into an immutable [`Settings`] value that
//! is passed to constructors.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunker::ChunkingConfig;
use crate::error::Error;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(dir, &env_name)
    }

    pub fn load_for_env(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("souschef.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("souschef.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("souschef.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("souschef.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("SOUSCHEF_").split("__"));
        Ok(Self { figment, base_dir: dir.to_path_buf() })
    }

    pub fn from_figment(figment: Figment, base_dir: &Path) -> Self {
        Self { figment, base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed settings. Relative source and cache
    /// paths are resolved against the configuration directory.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        for source in &mut settings.sources {
            source.path = resolve_with_base(&self.base_dir, source.path.to_string_lossy());
        }
        if let Some(dir) = settings.cache_dir.take() {
            settings.cache_dir = Some(resolve_with_base(&self.base_dir, dir.to_string_lossy()));
        }
        settings.validate()?;
        Ok(settings)
    }
}

/// Process-wide settings, immutable after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding_model_name: String,
    pub language_model_name: String,
    pub top_k: usize,
    pub collection_names: Vec<String>,
    pub allow_parallel_tool_calls: bool,
    /// Upper bound on tools invoked in one selection round when parallel calls are allowed.
    pub max_tool_calls: usize,
    pub max_selection_rounds: usize,
    pub chunking: ChunkingConfig,
    pub timeouts: TimeoutConfig,
    pub cache_dir: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub sources: Vec<SourceConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding_model_name: "hash-512".to_string(),
            language_model_name: "extractive".to_string(),
            top_k: 3,
            collection_names: vec!["cookbook".to_string(), "dictionary".to_string()],
            allow_parallel_tool_calls: false,
            max_tool_calls: 2,
            max_selection_rounds: 1,
            chunking: ChunkingConfig::default(),
            timeouts: TimeoutConfig::default(),
            cache_dir: None,
            model_dir: None,
            sources: Vec::new(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be at least 1".into()));
        }
        if self.max_tool_calls == 0 || self.max_selection_rounds == 0 {
            return Err(Error::InvalidConfig("max_tool_calls and max_selection_rounds must be at least 1".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for name in &self.collection_names {
            if name.trim().is_empty() {
                return Err(Error::InvalidConfig("collection names must not be empty".into()));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::InvalidConfig(format!("collection '{name}' is listed twice")));
            }
        }
        for source in &self.sources {
            if !seen.contains(source.collection.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "source '{}' targets unknown collection '{}'",
                    source.tool_name, source.collection
                )));
            }
        }
        self.chunking.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub embed_ms: Option<u64>,
    pub generate_ms: Option<u64>,
}

impl TimeoutConfig {
    pub fn embed(&self) -> Option<Duration> {
        self.embed_ms.map(Duration::from_millis)
    }

    pub fn generate(&self) -> Option<Duration> {
        self.generate_ms.map(Duration::from_millis)
    }
}

/// One source text, the collection it is ingested into, and the tool exposing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub collection: String,
    pub path: PathBuf,
    pub tool_name: String,
    pub description: String,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
