//! Client side of `POST /sync`.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{ReconciliationResult, SyncRequest};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::wire;

/// Moves one sync request to the comparator and brings back its result
#[allow(async_fn_in_trait)]
pub trait SyncTransport {
    /// Any failure here aborts the round before the replica is touched
    async fn reconcile(&self, request: &SyncRequest) -> Result<ReconciliationResult>;
}

/// HTTP transport posting JSON to `{base_url}/sync`
#[derive(Clone)]
pub struct HttpSyncTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSyncTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = format!("{}/sync", normalize_base_url(base_url.into())?);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, client })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::InvalidInput("sync server URL is not configured".into()))?;
        Self::new(base_url, config.request_timeout)
    }

    /// Full URL requests are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SyncTransport for HttpSyncTransport {
    async fn reconcile(&self, request: &SyncRequest) -> Result<ReconciliationResult> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }

        let payload = serde_json::from_str(&body).map_err(|error| {
            Error::DataAnomaly(format!("sync response is not valid JSON: {error}"))
        })?;
        let (result, rejected) = wire::decode_reconciliation(payload)?;
        if rejected > 0 {
            tracing::warn!(rejected, "Sync response contained malformed entries");
        }
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed
    }
}

/// Validate and trim a server base URL
pub fn normalize_base_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("server URL must not be empty".to_string()))?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "server URL must include http:// or https://".to_string(),
        ))
    }
}
