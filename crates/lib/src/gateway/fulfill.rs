//! Fulfillment pipeline: classify, normalize, call downstream, enrich, shape.
//!
//! Nothing is retried here and no state survives a request. Status codes:
//! malformed body, unsupported tag and unmatched tool parameters are 400;
//! missing credentials are 500; downstream transport failures are 200 for
//! webhook calls (so the conversation keeps flowing) and 500 for tool calls;
//! downstream business errors are 200 with an `error` field.

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::ServiceSettings;
use crate::downstream::{DownstreamClient, DownstreamError};
use crate::enrich::enrich;
use crate::gateway::reply::{self, Reply, WebhookResponse};
use crate::normalize::{self, InboundRequest, NameExtractor, NormalizeError, PatternExtractor};

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("Unable to retrieve downstream credentials")]
    CredentialUnavailable,
    #[error(transparent)]
    Downstream(#[from] DownstreamError),
}

impl FulfillmentError {
    /// HTTP status for this error on the given request kind.
    pub fn status(&self, webhook: bool) -> StatusCode {
        match self {
            FulfillmentError::Normalize(_) => StatusCode::BAD_REQUEST,
            FulfillmentError::CredentialUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            FulfillmentError::Downstream(e) if e.is_business() || webhook => StatusCode::OK,
            FulfillmentError::Downstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Runs the fulfillment pipeline against one downstream client.
pub struct Fulfiller {
    settings: Arc<ServiceSettings>,
    client: Option<DownstreamClient>,
    extractor: Arc<dyn NameExtractor>,
}

impl Fulfiller {
    /// Build from resolved settings. Without credentials every request fails with a 500.
    pub fn new(settings: Arc<ServiceSettings>) -> Result<Self, DownstreamError> {
        let client = match &settings.credentials {
            Some(creds) => Some(
                DownstreamClient::new(creds, settings.downstream_timeout)?
                    .with_retries(settings.max_retries, settings.retry_backoff),
            ),
            None => None,
        };
        Ok(Self {
            settings,
            client,
            extractor: Arc::new(PatternExtractor),
        })
    }

    /// Replace the free-text extractor used for webhook calls.
    pub fn with_extractor(mut self, extractor: Arc<dyn NameExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Handle one raw request body and return the status and reply to send.
    pub async fn handle(&self, request_id: &str, body: &[u8]) -> (StatusCode, Reply) {
        let request = match normalize::classify(body) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("[{}] rejecting request: {}", request_id, e);
                return (
                    StatusCode::BAD_REQUEST,
                    Reply::Webhook(WebhookResponse::text(reply::MALFORMED_TEXT)),
                );
            }
        };
        match &request {
            InboundRequest::WebhookCall { tag, .. } => {
                log::info!("[{}] webhook call with tag {:?}", request_id, tag)
            }
            InboundRequest::ToolCall { parameters, .. } => log::info!(
                "[{}] tool call {} with {} parameter(s)",
                request_id,
                request.short_tool_name(),
                parameters.len()
            ),
        }

        match self.fulfill(request_id, &request).await {
            Ok(output) => (StatusCode::OK, reply::shape(&request, output)),
            Err(e) => {
                let status = e.status(request.is_webhook());
                log::warn!("[{}] fulfillment failed ({}): {}", request_id, status, e);
                let output = json!({ "error": e.to_string() });
                (status, reply::shape(&request, output))
            }
        }
    }

    async fn fulfill(
        &self,
        request_id: &str,
        request: &InboundRequest,
    ) -> Result<Value, FulfillmentError> {
        let normalized = normalize::normalize(request, self.extractor.as_ref())?;
        log::info!("[{}] resolved action {}", request_id, normalized.action);
        let client = self
            .client
            .as_ref()
            .ok_or(FulfillmentError::CredentialUnavailable)?;

        let call = client.call(&normalized, request.user_token());
        let mut data = match self.settings.request_deadline {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| DownstreamError::DeadlineExceeded(deadline))??,
            None => call.await?,
        };
        enrich(
            normalized.action,
            &mut data,
            self.settings.platform_url.as_deref(),
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownstreamCredentials;
    use std::time::Duration;

    #[test]
    fn status_mapping() {
        let unsupported = FulfillmentError::from(NormalizeError::UnsupportedTag("foo".to_string()));
        assert_eq!(unsupported.status(true), StatusCode::BAD_REQUEST);

        let creds = FulfillmentError::CredentialUnavailable;
        assert_eq!(creds.status(true), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(creds.status(false), StatusCode::INTERNAL_SERVER_ERROR);

        let business = FulfillmentError::from(DownstreamError::Business("nope".to_string()));
        assert_eq!(business.status(true), StatusCode::OK);
        assert_eq!(business.status(false), StatusCode::OK);

        let http = FulfillmentError::from(DownstreamError::Http {
            status: 502,
            body: String::new(),
        });
        assert_eq!(http.status(true), StatusCode::OK);
        assert_eq!(http.status(false), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn malformed_body_is_400_webhook_message() {
        let fulfiller = Fulfiller::new(Arc::new(ServiceSettings::default())).unwrap();
        let (status, reply) = fulfiller.handle("t", b"not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({ "fulfillmentResponse": { "messages": [ { "text": { "text": [reply::MALFORMED_TEXT] } } ] } })
        );
    }

    #[tokio::test]
    async fn empty_object_is_400_webhook_message() {
        let fulfiller = Fulfiller::new(Arc::new(ServiceSettings::default())).unwrap();
        let (status, reply) = fulfiller.handle("t", b"{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(&reply).unwrap()["fulfillmentResponse"]["messages"][0]["text"]["text"][0],
            json!(reply::MALFORMED_TEXT)
        );
    }

    /// Accepts connections and holds them open without ever answering.
    async fn silent_listener() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn request_deadline_abandons_downstream_call() {
        let url = silent_listener().await;
        let settings = ServiceSettings {
            credentials: Some(DownstreamCredentials {
                url,
                api_key: "k".to_string(),
            }),
            request_deadline: Some(Duration::from_millis(200)),
            ..ServiceSettings::default()
        };
        let fulfiller = Fulfiller::new(Arc::new(settings)).unwrap();

        let webhook = br#"{"fulfillmentInfo":{"tag":"company_overview"},"text":"hola"}"#;
        let started = std::time::Instant::now();
        let (status, reply) = fulfiller.handle("t", webhook).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(status, StatusCode::OK);
        let text = serde_json::to_value(&reply).unwrap()["fulfillmentResponse"]["messages"][0]["text"]["text"][0]
            .as_str()
            .unwrap()
            .to_string();
        assert!(
            text.starts_with("Lo siento, hubo un error: Downstream call abandoned after request deadline"),
            "{}",
            text
        );

        let tool = br#"{"tool":"t/overview","tool_parameters":{"action":"company_overview"}}"#;
        let (status, reply) = fulfiller.handle("t", tool).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let v = serde_json::to_value(&reply).unwrap();
        assert!(v["tool_output"][0]["output"]["error"]
            .as_str()
            .unwrap()
            .starts_with("Downstream call abandoned"));
    }

    #[tokio::test]
    async fn unsupported_tag_is_400_before_credentials_are_checked() {
        let fulfiller = Fulfiller::new(Arc::new(ServiceSettings::default())).unwrap();
        let body = br#"{"fulfillmentInfo":{"tag":"foo"},"text":"hola"}"#;
        let (status, reply) = fulfiller.handle("t", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(&reply).unwrap()["fulfillmentResponse"]["messages"][0]["text"]["text"][0],
            json!("Lo siento, hubo un error: Unsupported tag: foo")
        );
    }

    #[tokio::test]
    async fn no_matching_action_is_400_tool_output() {
        let fulfiller = Fulfiller::new(Arc::new(ServiceSettings::default())).unwrap();
        let body = br#"{"tool":"t/x","tool_parameters":{"foo":1}}"#;
        let (status, reply) = fulfiller.handle("t", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v["tool_output"][0]["tool"], json!("t/x"));
        assert!(v["tool_output"][0]["output"]["error"]
            .as_str()
            .unwrap()
            .starts_with("No valid action found for tool parameters"));
    }

    #[tokio::test]
    async fn missing_credentials_is_500() {
        let fulfiller = Fulfiller::new(Arc::new(ServiceSettings::default())).unwrap();
        let body = br#"{"tool":"t/x","tool_parameters":{"query":"q"}}"#;
        let (status, reply) = fulfiller.handle("t", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            serde_json::to_value(&reply).unwrap()["tool_output"][0]["output"]["error"],
            json!("Unable to retrieve downstream credentials")
        );
    }
}
