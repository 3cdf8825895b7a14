//! Completion capability: (query, retrieved documents) → answer text.
//!
//! - **[`DisabledCompleter`]**: always fails; queries then surface an upstream error.
//! - **[`OpenAiCompleter`]**: `POST {url}/chat/completions`, requires `OPENAI_API_KEY`.
//! - **[`OllamaCompleter`]**: `POST {url}/api/generate` with `stream: false`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::CompletionConfig;
use crate::embedding::{DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_URL};
use crate::error::ConfigError;
use crate::models::Document;
use crate::prompt::build_prompt;
use crate::retry::{post_json, HttpFailure, RetryPolicy};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion provider is disabled")]
    Disabled,

    #[error(transparent)]
    Http(#[from] HttpFailure),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait Completer: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, query: &str, context: &[Document]) -> Result<String, CompletionError>;
}

pub struct DisabledCompleter;

#[async_trait]
impl Completer for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _query: &str, _context: &[Document]) -> Result<String, CompletionError> {
        Err(CompletionError::Disabled)
    }
}

pub struct OpenAiCompleter {
    model: String,
    api_key: String,
    url: String,
    temperature: f32,
    policy: RetryPolicy,
    client: reqwest::Client,
}

impl OpenAiCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ConfigError::Invalid("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        let model = required_model(config)?;
        let policy = RetryPolicy::new(config.max_retries, config.timeout_secs);
        let client = policy
            .client()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            model,
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: config.temperature,
            policy,
            client,
        })
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, query: &str, context: &[Document]) -> Result<String, CompletionError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": build_prompt(query, context) }],
        });
        let resp = post_json(
            &self.client,
            &self.policy,
            "OpenAI",
            &format!("{}/chat/completions", self.url),
            Some(&self.api_key),
            &body,
        )
        .await?;

        resp.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| CompletionError::InvalidResponse("missing choices[0].message.content".to_string()))
    }
}

pub struct OllamaCompleter {
    model: String,
    url: String,
    temperature: f32,
    policy: RetryPolicy,
    client: reqwest::Client,
}

impl OllamaCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self, ConfigError> {
        let model = required_model(config)?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        Self::with_url(
            model,
            url,
            config.temperature,
            RetryPolicy::new(config.max_retries, config.timeout_secs),
        )
    }

    pub fn with_url(
        model: String,
        url: String,
        temperature: f32,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        let client = policy
            .client()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            model,
            url: url.trim_end_matches('/').to_string(),
            temperature,
            policy,
            client,
        })
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, query: &str, context: &[Document]) -> Result<String, CompletionError> {
        let body = json!({
            "model": self.model,
            "prompt": build_prompt(query, context),
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let resp = post_json(
            &self.client,
            &self.policy,
            "Ollama",
            &format!("{}/api/generate", self.url),
            None,
            &body,
        )
        .await?;

        resp.get("response")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| CompletionError::InvalidResponse("missing 'response' field".to_string()))
    }
}

fn required_model(config: &CompletionConfig) -> Result<String, ConfigError> {
    config.model.clone().ok_or_else(|| {
        ConfigError::Invalid(format!("completion.model required for {}", config.provider))
    })
}

pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn Completer>, ConfigError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompleter)),
        "openai" => Ok(Arc::new(OpenAiCompleter::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaCompleter::new(config)?)),
        other => Err(ConfigError::Invalid(format!(
            "unknown completion provider: {}",
            other
        ))),
    }
}
