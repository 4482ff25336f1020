//! Downstream data API client.
//!
//! One POST per fulfillment: `{ action, params, user_token? }` with the API key
//! sent both as a bearer token and as `apikey`. The reply is expected to be a
//! `{ success, data?, error? }` envelope.

use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::DownstreamCredentials;
use crate::normalize::{ActionKind, NormalizedRequest};

const UNKNOWN_ERROR: &str = "Unknown error from downstream API";

/// Client for the downstream data API.
#[derive(Clone)]
pub struct DownstreamClient {
    url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
    retry_backoff: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    #[error("Downstream request failed: {status} - {body}")]
    Http { status: u16, body: String },
    #[error("{0}")]
    Business(String),
    #[error("Network error calling downstream API: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid response from downstream API: {0}")]
    InvalidResponse(String),
    #[error("Downstream call abandoned after request deadline of {}s", .0.as_secs_f64())]
    DeadlineExceeded(Duration),
}

impl DownstreamError {
    /// True for errors reported by the API itself (`success: false`), false for transport failures.
    pub fn is_business(&self) -> bool {
        matches!(self, DownstreamError::Business(_))
    }
}

#[derive(Debug, Serialize)]
struct DownstreamRequest<'a> {
    action: ActionKind,
    params: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_token: Option<&'a str>,
}

impl DownstreamClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(credentials: &DownstreamCredentials, timeout: Duration) -> Result<Self, DownstreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: credentials.url.clone(),
            api_key: credentials.api_key.clone(),
            client,
            max_retries: 0,
            retry_backoff: Duration::from_millis(250),
        })
    }

    /// Retry connect errors and timeouts up to `max_retries` times, doubling `backoff` each time.
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the normalized request and return the envelope's `data` on success.
    pub async fn call(
        &self,
        request: &NormalizedRequest,
        user_token: Option<&str>,
    ) -> Result<Value, DownstreamError> {
        let body = DownstreamRequest {
            action: request.action,
            params: &request.params,
            user_token,
        };
        log::debug!(
            "calling downstream with action {} and params {}",
            request.action,
            Value::Object(request.params.clone())
        );
        let res = self.send_with_retry(&body).await?;
        let status = res.status();
        if status != reqwest::StatusCode::OK {
            let body = match res.text().await {
                Ok(body) => body,
                Err(e) => {
                    log::warn!("reading downstream error body for status {} failed: {}", status, e);
                    format!("<unreadable body: {}>", e)
                }
            };
            return Err(DownstreamError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let text = res.text().await?;
        let envelope: Value = serde_json::from_str(&text)
            .map_err(|e| DownstreamError::InvalidResponse(e.to_string()))?;
        interpret_envelope(envelope)
    }

    /// Diagnostics probe: a company overview request with no params.
    pub async fn probe(&self) -> Result<Value, DownstreamError> {
        self.call(
            &NormalizedRequest::new(ActionKind::CompanyOverview, Map::new()),
            None,
        )
        .await
    }

    async fn send_with_retry(
        &self,
        body: &DownstreamRequest<'_>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut attempt: u32 = 0;
        loop {
            let result = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .header("apikey", &self.api_key)
                .json(body)
                .send()
                .await;
            match result {
                Ok(res) => return Ok(res),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    let delay = self
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    log::warn!(
                        "downstream attempt {} failed ({}); retrying in {:?}",
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}

/// Unwrap a `{ success, data?, error? }` envelope.
pub fn interpret_envelope(envelope: Value) -> Result<Value, DownstreamError> {
    let Value::Object(obj) = envelope else {
        return Err(DownstreamError::InvalidResponse(
            "response is not a JSON object".to_string(),
        ));
    };
    if obj.get("success").and_then(|v| v.as_bool()) == Some(true) {
        return Ok(match obj.get("data") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(data) => data.clone(),
        });
    }
    let message = match obj.get("error") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | None => UNKNOWN_ERROR.to_string(),
        Some(Value::String(_)) => UNKNOWN_ERROR.to_string(),
        Some(other) => other.to_string(),
    };
    Err(DownstreamError::Business(message))
}
