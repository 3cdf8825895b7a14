use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::sources::{self, SourceDescriptor};
use crate::upload::DEFAULT_MAX_FILE_BYTES;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Optional JSON file holding `{ "data_sources": [...] }`.
    #[serde(default)]
    pub sources_file: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "quickstart".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama host or an OpenAI-compatible endpoint).
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
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
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
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_completion_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_retries: default_completion_retries(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

fn default_temperature() -> f32 {
    0.1
}
fn default_completion_retries() -> u32 {
    3
}
fn default_completion_timeout() -> u64 {
    120
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
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            data_dir: default_data_dir(),
            allowed_extensions: default_allowed_extensions(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/sources")
}
fn default_allowed_extensions() -> Vec<String> {
    vec![".pdf".to_string(), ".docx".to_string(), ".txt".to_string()]
}
fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Config {
    /// Inline `[[sources]]` followed by the entries of `sources_file`, in that order.
    pub fn all_sources(&self) -> Result<Vec<SourceDescriptor>, ConfigError> {
        let mut all = self.sources.clone();
        if let Some(ref file) = self.sources_file {
            all.extend(sources::load_sources_file(file)?);
        }
        Ok(all)
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.index.collection.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "index.collection must not be empty".to_string(),
        ));
    }

    if config.retrieval.top_k < 1 {
        return Err(ConfigError::Invalid(
            "retrieval.top_k must be >= 1".to_string(),
        ));
    }

    if config.upload.max_file_bytes == 0 {
        return Err(ConfigError::Invalid(
            "upload.max_file_bytes must be > 0".to_string(),
        ));
    }

    let embedding = &config.embedding;
    if embedding.batch_size == 0 {
        return Err(ConfigError::Invalid(
            "embedding.batch_size must be > 0".to_string(),
        ));
    }

    match embedding.provider.as_str() {
        "disabled" | "local" => {}
        "hash" => {
            if embedding.dims == Some(0) {
                return Err(ConfigError::Invalid(
                    "embedding.dims must be > 0".to_string(),
                ));
            }
        }
        "openai" | "ollama" => {
            if embedding.dims.unwrap_or(0) == 0 {
                return Err(ConfigError::Invalid(format!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    embedding.provider
                )));
            }
            if embedding.model.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "embedding.model must be specified when provider is '{}'",
                    embedding.provider
                )));
            }
        }
        other => {
            return Err(ConfigError::Invalid(format!(
                "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
                other
            )))
        }
    }

    match config.completion.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if config.completion.model.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "completion.model must be specified when provider is '{}'",
                    config.completion.provider
                )));
            }
        }
        other => {
            return Err(ConfigError::Invalid(format!(
                "Unknown completion provider: '{}'. Must be disabled, openai, or ollama.",
                other
            )))
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("docq.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[db]\npath = \"./data/vectors.sqlite\"\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.index.collection, "quickstart");
        assert_eq!(cfg.retrieval.top_k, 4);
        assert_eq!(cfg.upload.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.upload.allowed_extensions, vec![".pdf", ".docx", ".txt"]);
        assert!(!cfg.embedding.is_enabled());
        assert!(cfg.sources.is_empty());
    }

    #[test]
    fn inline_sources_are_parsed_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[db]
path = "v.sqlite"

[[sources]]
type = "txt"
path = "notes.txt"

[[sources]]
type = "csv"
path = "rows.csv"
text_column = "body"
metadata_columns = ["id"]
"#,
        );
        let cfg = load_config(&path).unwrap();
        let sources = cfg.all_sources().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].kind, "txt");
        assert_eq!(sources[1].text_column.as_deref(), Some("body"));
    }

    #[test]
    fn openai_without_model_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "[db]\npath = \"v.sqlite\"\n[embedding]\nprovider = \"openai\"\ndims = 1536\n",
        );
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_completion_provider_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "[db]\npath = \"v.sqlite\"\n[completion]\nprovider = \"palm\"\n",
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("palm"));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[db]\npath = \"v.sqlite\"\n[retrieval]\ntop_k = 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/docq.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
