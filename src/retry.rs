//! JSON-over-HTTP calls with exponential backoff, shared by the embedding
//! and completion providers.
//!
//! - HTTP 429 and 5xx → retry
//! - other non-success statuses → fail immediately
//! - transport errors (connect, timeout) → retry
//! - backoff doubles from `base_delay`, capped at 2^5 × `base_delay`

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpFailure {
    #[error("{service} API error {status}: {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request failed after {attempts} attempts: {last}")]
    Exhausted {
        service: &'static str,
        attempts: u32,
        last: String,
    },

    #[error("invalid {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub timeout: Duration,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, timeout_secs: u64) -> Self {
        Self {
            max_retries,
            timeout: Duration::from_secs(timeout_secs),
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(5))
    }

    pub fn client(&self) -> Result<reqwest::Client, HttpFailure> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| HttpFailure::Client(e.to_string()))
    }
}

/// POSTs `body` as JSON and returns the decoded JSON response.
pub async fn post_json(
    client: &reqwest::Client,
    policy: &RetryPolicy,
    service: &'static str,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
) -> Result<Value, HttpFailure> {
    let mut last = String::from("no attempt made");

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            tokio::time::sleep(policy.delay(attempt)).await;
            tracing::debug!(service, attempt, "retrying request");
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                last = format!("connection error ({}): {}", url, e);
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| HttpFailure::Decode {
                service,
                message: e.to_string(),
            });
        }

        let text = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            tracing::warn!(service, status = status.as_u16(), "transient API error");
            last = format!("HTTP {}: {}", status, text);
            continue;
        }

        return Err(HttpFailure::Rejected {
            service,
            status: status.as_u16(),
            body: text,
        });
    }

    Err(HttpFailure::Exhausted {
        service,
        attempts: policy.max_retries + 1,
        last,
    })
}
