//! Health Prober (§4.I).
//!
//! Probes a backend endpoint for liveness and loaded models, with a 5 s
//! context timeout. Grounded in the teacher's HTTP client construction
//! style (`client.rs`'s `reqwest::Client` with a short timeout), split
//! into a trait so different backend "flavours" (Ollama-style, OpenAI-
//! style, or a generic GET) can share the same `HealthStatus` shape.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ErrorKind;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of probing one backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub available: bool,
    pub response_time: Duration,
    pub models_loaded: Vec<String>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub server_version: Option<String>,
}

impl HealthStatus {
    fn unavailable(error: impl Into<String>, response_time: Duration) -> Self {
        HealthStatus {
            available: false,
            response_time,
            models_loaded: Vec::new(),
            error: Some(error.into()),
            checked_at: Utc::now(),
            server_version: None,
        }
    }

    fn available(response_time: Duration, models_loaded: Vec<String>, server_version: Option<String>) -> Self {
        HealthStatus {
            available: true,
            response_time,
            models_loaded,
            error: None,
            checked_at: Utc::now(),
            server_version,
        }
    }

    /// Classify the stored error the same way the Recovery Analyzer does,
    /// so callers never re-match the phrase themselves.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_deref().map(classify_probe_error)
    }
}

fn classify_probe_error(msg: &str) -> ErrorKind {
    let lower = msg.to_lowercase();
    if lower.contains("connection refused") {
        ErrorKind::Other
    } else if lower.contains("context deadline exceeded") || lower.contains("timed out") || lower.contains("timeout") {
        ErrorKind::TimeoutLike
    } else {
        ErrorKind::Other
    }
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, ctx: CancellationToken) -> HealthStatus;
}

/// Probes an Ollama-style backend: `/api/tags` (loaded/pulled models) and
/// `/api/ps` (currently running models).
pub struct OllamaHealthProbe {
    client: Client,
    base_url: String,
}

impl OllamaHealthProbe {
    pub fn new(base_url: impl Into<String>) -> Self {
        OllamaHealthProbe {
            client: Client::builder().timeout(PROBE_TIMEOUT).build().expect("reqwest client"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for OllamaHealthProbe {
    async fn probe(&self, ctx: CancellationToken) -> HealthStatus {
        let start = Instant::now();
        let request = self.client.get(format!("{}/api/tags", self.base_url)).send();

        let response = tokio::select! {
            _ = ctx.cancelled() => return HealthStatus::unavailable("cancelled", start.elapsed()),
            result = tokio::time::timeout(PROBE_TIMEOUT, request) => result,
        };

        match response {
            Ok(Ok(resp)) if resp.status().is_success() => {
                let models = resp
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("models").cloned())
                    .and_then(|v| v.as_array().cloned())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|m| m.get("name").and_then(|n| n.as_str()).map(String::from))
                            .collect()
                    })
                    .unwrap_or_default();
                HealthStatus::available(start.elapsed(), models, None)
            }
            Ok(Ok(resp)) => HealthStatus::unavailable(
                format!("unexpected status {}", resp.status()),
                start.elapsed(),
            ),
            Ok(Err(e)) => HealthStatus::unavailable(e.to_string(), start.elapsed()),
            Err(_) => HealthStatus::unavailable("context deadline exceeded", start.elapsed()),
        }
    }
}

/// Probes an OpenAI-compatible backend via `/v1/models`.
pub struct OpenAiStyleHealthProbe {
    client: Client,
    base_url: String,
    api_key: Option<secrecy::SecretString>,
}

impl OpenAiStyleHealthProbe {
    pub fn new(base_url: impl Into<String>, api_key: Option<secrecy::SecretString>) -> Self {
        OpenAiStyleHealthProbe {
            client: Client::builder().timeout(PROBE_TIMEOUT).build().expect("reqwest client"),
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl HealthProbe for OpenAiStyleHealthProbe {
    async fn probe(&self, ctx: CancellationToken) -> HealthStatus {
        use secrecy::ExposeSecret;
        let start = Instant::now();
        let mut request = self.client.get(format!("{}/v1/models", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = tokio::select! {
            _ = ctx.cancelled() => return HealthStatus::unavailable("cancelled", start.elapsed()),
            result = tokio::time::timeout(PROBE_TIMEOUT, request.send()) => result,
        };

        match response {
            Ok(Ok(resp)) if resp.status().is_success() => {
                let models = resp
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("data").cloned())
                    .and_then(|v| v.as_array().cloned())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|m| m.get("id").and_then(|n| n.as_str()).map(String::from))
                            .collect()
                    })
                    .unwrap_or_default();
                HealthStatus::available(start.elapsed(), models, None)
            }
            Ok(Ok(resp)) => HealthStatus::unavailable(
                format!("unexpected status {}", resp.status()),
                start.elapsed(),
            ),
            Ok(Err(e)) => HealthStatus::unavailable(e.to_string(), start.elapsed()),
            Err(_) => HealthStatus::unavailable("context deadline exceeded", start.elapsed()),
        }
    }
}

/// Falls back to a bare GET against the base URL for backends with no
/// dedicated health endpoint.
pub struct GenericGetHealthProbe {
    client: Client,
    url: String,
}

impl GenericGetHealthProbe {
    pub fn new(url: impl Into<String>) -> Self {
        GenericGetHealthProbe {
            client: Client::builder().timeout(PROBE_TIMEOUT).build().expect("reqwest client"),
            url: url.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for GenericGetHealthProbe {
    async fn probe(&self, ctx: CancellationToken) -> HealthStatus {
        let start = Instant::now();
        let request = self.client.get(&self.url).send();

        let response = tokio::select! {
            _ = ctx.cancelled() => return HealthStatus::unavailable("cancelled", start.elapsed()),
            result = tokio::time::timeout(PROBE_TIMEOUT, request) => result,
        };

        match response {
            Ok(Ok(resp)) if resp.status().is_success() => {
                HealthStatus::available(start.elapsed(), Vec::new(), None)
            }
            Ok(Ok(resp)) => HealthStatus::unavailable(
                format!("unexpected status {}", resp.status()),
                start.elapsed(),
            ),
            Ok(Err(e)) => HealthStatus::unavailable(e.to_string(), start.elapsed()),
            Err(_) => HealthStatus::unavailable("context deadline exceeded", start.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_refused_classifies_as_other() {
        let status = HealthStatus::unavailable("connection refused", Duration::from_millis(5));
        assert_eq!(status.error_kind(), Some(ErrorKind::Other));
    }

    #[test]
    fn deadline_exceeded_classifies_as_timeout_like() {
        let status = HealthStatus::unavailable("context deadline exceeded", Duration::from_secs(5));
        assert_eq!(status.error_kind(), Some(ErrorKind::TimeoutLike));
    }

    #[test]
    fn available_status_has_no_error_kind() {
        let status = HealthStatus::available(Duration::from_millis(20), vec!["llama3".to_string()], None);
        assert!(status.error_kind().is_none());
    }
}
