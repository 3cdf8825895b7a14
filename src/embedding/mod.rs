//! Embedding capability: text → fixed-length vectors.
//!
//! Defines the [`Embedder`] trait and its implementations:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`HashEmbedder`]**: deterministic feature hashing, offline, no model download.
//! - **[`OpenAiEmbedder`]**: calls an OpenAI-compatible `/embeddings` endpoint.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalEmbedder`**: runs bge/MiniLM models in-process via fastembed
//!   (`local-embeddings` feature).
//!
//! Every embedder carries an [`EmbeddingProfile`]. A collection records the
//! profile it was built with, and both the index builder and the query engine
//! compare it against the active embedder before touching any vectors.
//!
//! Also provides the vector utilities the stores use:
//! - [`cosine_similarity`]
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` BLOB encoding
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use docquery::config::EmbeddingConfig;
//! # use docquery::embedding::{create_embedder, Embedder};
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.profile().model, "disabled");
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::EmbeddingConfig;
use crate::error::ConfigError;
use crate::models::EmbeddingProfile;
use crate::retry::{post_json, HttpFailure, RetryPolicy};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOCAL_MODEL: &str = "bge-small-en-v1.5";
pub const HASH_MODEL: &str = "feature-hash";
pub const DEFAULT_HASH_DIMS: usize = 384;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider is disabled")]
    Disabled,

    #[error(transparent)]
    Http(#[from] HttpFailure),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("local embedding failed: {0}")]
    Local(String),
}

/// Turns texts into vectors of `profile().dims` floats, one per input, in order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn profile(&self) -> &EmbeddingProfile;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Embeds a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, EmbedError> {
    embedder
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| EmbedError::InvalidResponse("empty embedding response".to_string()))
}

// ============ Disabled ============

pub struct DisabledEmbedder {
    profile: EmbeddingProfile,
}

impl Default for DisabledEmbedder {
    fn default() -> Self {
        Self {
            profile: EmbeddingProfile::new("disabled", 0),
        }
    }
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn profile(&self) -> &EmbeddingProfile {
        &self.profile
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Disabled)
    }
}

// ============ Feature hashing ============

/// Signed feature hashing over lowercased alphanumeric tokens, L2-normalized.
///
/// Texts sharing vocabulary land close together; identical texts embed
/// identically. Suited to tests and offline smoke runs, not to semantic search.
pub struct HashEmbedder {
    profile: EmbeddingProfile,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            profile: EmbeddingProfile::new(HASH_MODEL, dims),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let dims = self.profile.dims;
        let mut v = vec![0.0f32; dims];
        if dims == 0 {
            return v;
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut idx = [0u8; 8];
            idx.copy_from_slice(&digest[..8]);
            let slot = (u64::from_le_bytes(idx) % dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[slot] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn profile(&self) -> &EmbeddingProfile {
        &self.profile
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ============ OpenAI ============

/// Calls `POST {url}/embeddings`. Requires `OPENAI_API_KEY`.
pub struct OpenAiEmbedder {
    profile: EmbeddingProfile,
    api_key: String,
    url: String,
    policy: RetryPolicy,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ConfigError::Invalid("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        let profile = required_profile(config)?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
        Self::with_key(
            profile,
            api_key,
            url,
            RetryPolicy::new(config.max_retries, config.timeout_secs),
        )
    }

    pub fn with_key(
        profile: EmbeddingProfile,
        api_key: String,
        url: String,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        let client = policy
            .client()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            profile,
            api_key,
            url: url.trim_end_matches('/').to_string(),
            policy,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn profile(&self) -> &EmbeddingProfile {
        &self.profile
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = json!({ "model": self.profile.model, "input": texts });
        let resp = post_json(
            &self.client,
            &self.policy,
            "OpenAI",
            &format!("{}/embeddings", self.url),
            Some(&self.api_key),
            &body,
        )
        .await?;
        parse_openai_response(&resp)
    }
}

/// Extracts `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbedError::InvalidResponse("missing data array".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| EmbedError::InvalidResponse("missing embedding".to_string()))?;
        indexed.push((index, to_vector(embedding)?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Calls `POST {url}/api/embed` on an Ollama instance.
pub struct OllamaEmbedder {
    profile: EmbeddingProfile,
    url: String,
    policy: RetryPolicy,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let profile = required_profile(config)?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let policy = RetryPolicy::new(config.max_retries, config.timeout_secs);
        Self::with_url(profile, url, policy)
    }

    pub fn with_url(
        profile: EmbeddingProfile,
        url: String,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        let client = policy
            .client()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            profile,
            url: url.trim_end_matches('/').to_string(),
            policy,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn profile(&self) -> &EmbeddingProfile {
        &self.profile
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = json!({ "model": self.profile.model, "input": texts });
        let resp = post_json(
            &self.client,
            &self.policy,
            "Ollama",
            &format!("{}/api/embed", self.url),
            None,
            &body,
        )
        .await?;

        resp.get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EmbedError::InvalidResponse("missing embeddings array".to_string()))?
            .iter()
            .map(to_vector)
            .collect()
    }
}

fn to_vector(value: &Value) -> Result<Vec<f32>, EmbedError> {
    value
        .as_array()
        .ok_or_else(|| EmbedError::InvalidResponse("embedding is not an array".to_string()))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbedError::InvalidResponse("non-numeric component".to_string()))
        })
        .collect()
}

fn required_profile(config: &EmbeddingConfig) -> Result<EmbeddingProfile, ConfigError> {
    let model = config.model.clone().ok_or_else(|| {
        ConfigError::Invalid(format!("embedding.model required for {}", config.provider))
    })?;
    let dims = config.dims.filter(|d| *d > 0).ok_or_else(|| {
        ConfigError::Invalid(format!("embedding.dims required for {}", config.provider))
    })?;
    Ok(EmbeddingProfile::new(model, dims))
}

// ============ Local (fastembed) ============

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;

    use super::{EmbedError, Embedder, DEFAULT_LOCAL_MODEL};
    use crate::config::EmbeddingConfig;
    use crate::error::ConfigError;
    use crate::models::EmbeddingProfile;

    /// In-process inference. The model is downloaded and loaded on first use.
    pub struct LocalEmbedder {
        profile: EmbeddingProfile,
        model: fastembed::EmbeddingModel,
        batch_size: usize,
        loaded: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
    }

    impl LocalEmbedder {
        pub fn new(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
            let name = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
            let (model, native_dims) = resolve_model(&name)?;
            if let Some(dims) = config.dims {
                if dims != native_dims {
                    return Err(ConfigError::Invalid(format!(
                        "{} produces {}-dimensional vectors, embedding.dims is {}",
                        name, native_dims, dims
                    )));
                }
            }
            Ok(Self {
                profile: EmbeddingProfile::new(name, native_dims),
                model,
                batch_size: config.batch_size,
                loaded: Arc::new(Mutex::new(None)),
            })
        }
    }

    fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize), ConfigError> {
        use fastembed::EmbeddingModel as M;
        match name {
            "all-minilm-l6-v2" => Ok((M::AllMiniLML6V2, 384)),
            "bge-small-en-v1.5" => Ok((M::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((M::BGEBaseENV15, 768)),
            "bge-large-en-v1.5" => Ok((M::BGELargeENV15, 1024)),
            "nomic-embed-text-v1.5" => Ok((M::NomicEmbedTextV15, 768)),
            "multilingual-e5-small" => Ok((M::MultilingualE5Small, 384)),
            other => Err(ConfigError::Invalid(format!(
                "unknown local embedding model '{}'. Supported: all-minilm-l6-v2, \
                 bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5, multilingual-e5-small",
                other
            ))),
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn profile(&self) -> &EmbeddingProfile {
            &self.profile
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            let loaded = self.loaded.clone();
            let model = self.model.clone();
            let batch_size = self.batch_size;
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut guard = loaded.lock().unwrap_or_else(PoisonError::into_inner);
                if guard.is_none() {
                    tracing::info!(?model, "loading local embedding model");
                    let init = fastembed::InitOptions::new(model).with_show_download_progress(false);
                    let te = fastembed::TextEmbedding::try_new(init)
                        .map_err(|e| EmbedError::Local(e.to_string()))?;
                    *guard = Some(te);
                }
                match guard.as_mut() {
                    Some(te) => te
                        .embed(texts, Some(batch_size))
                        .map_err(|e| EmbedError::Local(e.to_string())),
                    None => Err(EmbedError::Local("model not loaded".to_string())),
                }
            })
            .await
            .map_err(|e| EmbedError::Local(e.to_string()))?
        }
    }
}

/// Creates the embedder named by `embedding.provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"hash"` | [`HashEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (`local-embeddings` feature) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, ConfigError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder::default())),
        "hash" => Ok(Arc::new(HashEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASH_DIMS),
        ))),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(ConfigError::Invalid(
            "local embedding provider requires --features local-embeddings".to_string(),
        )),
        other => Err(ConfigError::Invalid(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Encodes a float vector as little-endian `f32` bytes.
///
/// ```rust
/// use docquery::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, zero, or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
