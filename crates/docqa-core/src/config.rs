//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + the conventional `OPENAI_*` variables + `APP_*` env vars (`__` nests, so
//! `APP_CHUNKING__OVERLAP=64` sets `chunking.overlap`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub documents_dir: String,
    pub storage_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { documents_dir: "data/documents".to_string(), storage_dir: "storage".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub batch_size: usize,
    pub max_in_flight: usize,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            batch_size: 96,
            max_in_flight: 4,
            timeout_secs: 60,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_top_k: usize,
    /// Keep the loaded index in memory between queries (reloaded on re-ingestion).
    pub cache: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { default_top_k: 5, cache: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000 }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".into()));
        }
        if self.embedding.max_in_flight == 0 {
            return Err(Error::InvalidConfig("embedding.max_in_flight must be positive".into()));
        }
        if self.retrieval.default_top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.default_top_k must be positive".into()));
        }
        Ok(())
    }

    pub fn documents_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.data.documents_dir)
    }

    pub fn storage_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.data.storage_dir)
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let figment = Self::figment_for_env(&env_name);
        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    fn figment_for_env(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment
            .merge(Env::raw().only(&["OPENAI_API_KEY"]).map(|_| "embedding.api_key".into()))
            .merge(Env::raw().only(&["OPENAI_API_KEY"]).map(|_| "generation.api_key".into()))
            .merge(Env::raw().only(&["OPENAI_EMBED_MODEL"]).map(|_| "embedding.model".into()))
            .merge(Env::raw().only(&["OPENAI_MODEL"]).map(|_| "generation.model".into()))
            .merge(Env::prefixed("APP_").split("__"))
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to load settings: {}", e)))
    }
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
