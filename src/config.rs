//! TOML configuration.
//!
//! Every section and field is optional; [`Config::minimal`] gives the
//! defaults used when no config file exists.
//!
//! ```toml
//! [index]
//! path = "artifacts/index.json"
//!
//! [chunking]
//! chunk_token_size = 130
//! overlap_tokens = 30
//!
//! [retrieval]
//! top_k = 5
//!
//! [ingest]
//! include_globs = ["**/*.md", "**/*.txt"]
//!
//! [server]
//! bind = "127.0.0.1:7860"
//!
//! [patterns]
//! injection = ["ignore previous instructions", "system prompt"]
//! ```

use anyhow::{bail, Context, Result};
use grounded_qa_core::answer::AnswerSynthesizer;
use grounded_qa_core::chunk::ChunkParams;
use grounded_qa_core::patterns::PatternSet;
use grounded_qa_core::pipeline::Pipeline;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub patterns: PatternSet,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("artifacts/index.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_token_size")]
    pub chunk_token_size: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_token_size: default_chunk_token_size(),
            overlap_tokens: default_overlap_tokens(),
        }
    }
}

fn default_chunk_token_size() -> usize {
    130
}
fn default_overlap_tokens() -> usize {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.rst".to_string(),
        "**/*.log".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
            limit: default_history_limit(),
        }
    }
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("artifacts/sessions")
}
fn default_history_limit() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upload_dir: default_upload_dir(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7860".to_string()
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("artifacts/uploads")
}

impl Config {
    /// Built-in defaults, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams {
            chunk_token_size: self.chunking.chunk_token_size,
            overlap_tokens: self.chunking.overlap_tokens,
        }
    }

    /// An empty pipeline wired with this config's chunking and patterns.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.chunk_params(),
            AnswerSynthesizer::new(self.patterns.clone()),
        )
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.chunk_token_size == 0 {
            bail!("chunking.chunk_token_size must be > 0");
        }
        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        for (name, list) in [
            ("injection", &self.patterns.injection),
            ("sensitive", &self.patterns.sensitive),
            ("numeric", &self.patterns.numeric),
        ] {
            if list.iter().all(|p| p.trim().is_empty()) {
                bail!("patterns.{} must contain at least one non-empty phrase", name);
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}
