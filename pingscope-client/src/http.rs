use std::time::Duration;

use pingscope_core::{
    Config, InferenceQuery, InferenceSource, NetworkFailure, QueryError, SchemaViolation,
    Subscriber,
};
use reqwest::blocking::Client;
use tracing::debug;

/// Blocking client for the inference service. One request per call; no
/// retries, no cancellation.
pub struct HttpInferenceSource {
    client: Client,
    base_url: String,
}

impl HttpInferenceSource {
    pub fn new(cfg: &Config) -> Result<Self, NetworkFailure> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| NetworkFailure::Transport {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, NetworkFailure> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, ?query, "GET");
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| NetworkFailure::Transport {
                reason: e.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(NetworkFailure::Status {
                status: status.as_u16(),
                url,
            });
        }
        resp.text().map_err(|e| NetworkFailure::Transport {
            reason: format!("failed to read response body: {e}"),
        })
    }

    /// Subscriber lookup by name substring; `None` lists everyone.
    pub fn subscribers(&self, name: Option<&str>) -> Result<Vec<Subscriber>, QueryError> {
        let query: Vec<(&str, String)> = name
            .filter(|n| !n.trim().is_empty())
            .map(|n| vec![("name", n.trim().to_string())])
            .unwrap_or_default();
        let body = self.get("/api/subscribers/", &query)?;
        let subscribers = serde_json::from_str(&body).map_err(|e| SchemaViolation::Body {
            reason: e.to_string(),
        })?;
        Ok(subscribers)
    }
}

impl InferenceSource for HttpInferenceSource {
    fn fetch(&self, query: &InferenceQuery) -> Result<String, NetworkFailure> {
        self.get(&query.path(), &query.query_pairs())
    }
}
