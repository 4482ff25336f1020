//! Response shapes for the two request kinds.

use serde::Serialize;
use serde_json::Value;

use crate::normalize::InboundRequest;

/// Reply text when the output carries neither a summary nor an error.
pub const DEFAULT_WEBHOOK_TEXT: &str = "Datos obtenidos correctamente de Stratix.";

/// Reply text for an absent or unparseable body.
pub const MALFORMED_TEXT: &str = "Error: No se recibieron datos";

/// Webhook response: `{ "fulfillmentResponse": { "messages": [ { "text": { "text": [..] } } ] } }`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub fulfillment_response: FulfillmentResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentResponse {
    pub messages: Vec<ResponseMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMessage {
    pub text: MessageText,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageText {
    pub text: Vec<String>,
}

/// Tool-call response: `{ "tool_output": [ { "tool", "output" } ] }`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub tool_output: Vec<ToolOutput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub tool: String,
    pub output: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Webhook(WebhookResponse),
    Tool(ToolResponse),
}

impl WebhookResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            fulfillment_response: FulfillmentResponse {
                messages: vec![ResponseMessage {
                    text: MessageText {
                        text: vec![text.into()],
                    },
                }],
            },
        }
    }
}

impl ToolResponse {
    pub fn single(tool: impl Into<String>, output: Value) -> Self {
        Self {
            tool_output: vec![ToolOutput {
                tool: tool.into(),
                output,
            }],
        }
    }
}

/// Conversational text for a webhook reply: the error when there is one, else the summary, else a default.
pub fn webhook_text(output: &Value) -> String {
    if let Some(err) = output.get("error") {
        let err = match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return format!("Lo siento, hubo un error: {}", err);
    }
    output
        .get("resumen")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_WEBHOOK_TEXT)
        .to_string()
}

/// Shape an output object for the protocol the request arrived on.
pub fn shape(request: &InboundRequest, output: Value) -> Reply {
    if request.is_webhook() {
        Reply::Webhook(WebhookResponse::text(webhook_text(&output)))
    } else {
        Reply::Tool(ToolResponse::single(request.tool_name(), output))
    }
}
