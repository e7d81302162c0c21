use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Spreadsheet locations. A missing path simply leaves that table empty.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TablesConfig {
    #[serde(default)]
    pub district_path: Option<PathBuf>,
    #[serde(default)]
    pub taluka_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// SQLite file holding chunks and their vectors. `None` keeps the index in memory.
    #[serde(default = "default_index_path")]
    pub path: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> Option<PathBuf> {
    Some(PathBuf::from("./data/neerniti.sqlite"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub ingest_on_startup: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            ingest_on_startup: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string(), "**/*.pdf".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            overlap: default_overlap(),
            min_chunk_chars: default_min_chunk_chars(),
        }
    }
}

fn default_target_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}
fn default_min_chunk_chars() -> usize {
    100
}

/// Which retrieval channels feed the prompt.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Tables,
    Documents,
    #[default]
    Hybrid,
}

impl RetrievalMode {
    pub fn uses_tables(self) -> bool {
        matches!(self, RetrievalMode::Tables | RetrievalMode::Hybrid)
    }

    pub fn uses_documents(self) -> bool {
        matches!(self, RetrievalMode::Documents | RetrievalMode::Hybrid)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub mode: RetrievalMode,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_table_match_limit")]
    pub table_match_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            top_k: default_top_k(),
            table_match_limit: default_table_match_limit(),
        }
    }
}

fn default_top_k() -> usize {
    8
}
fn default_table_match_limit() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Overrides the provider's public endpoint (proxies, tests).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            batch_size: 96,
            max_retries: 2,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    96
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: default_generation_model(),
            url: None,
            timeout_secs: 30,
            temperature: None,
            max_output_tokens: None,
            top_p: None,
            top_k: None,
        }
    }
}

fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// All defaults, in-memory index, every provider disabled.
    pub fn minimal() -> Self {
        Self {
            index: IndexConfig { path: None },
            ..Self::default()
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let chunking = &config.chunking;
    if chunking.target_size == 0 {
        anyhow::bail!("chunking.target_size must be > 0");
    }
    if chunking.overlap >= chunking.target_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.target_size ({})",
            chunking.overlap,
            chunking.target_size
        );
    }
    if chunking.min_chunk_chars == 0 {
        anyhow::bail!("chunking.min_chunk_chars must be > 0");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.table_match_limit < 1 {
        anyhow::bail!("retrieval.table_match_limit must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "cohere" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, cohere, or openai.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    match config.generation.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }
    if config.generation.timeout_secs == 0 {
        anyhow::bail!("generation.timeout_secs must be > 0");
    }

    Ok(())
}
