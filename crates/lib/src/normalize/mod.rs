//! Request normalization: turn an inbound webhook or tool-call body into one
//! `(action, params)` pair for the downstream data API.
//!
//! Two request shapes arrive on the same endpoint. A body carrying a
//! `fulfillmentInfo` key is a tag-based webhook call; anything else is a tool
//! call with a flat parameter mapping. Classification and mapping are pure
//! functions of the body; nothing here performs I/O.

pub mod extract;
mod tool_call;
mod webhook;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use extract::{NameExtractor, PatternExtractor};
pub use tool_call::map_parameters;
pub use webhook::map_tag;

/// Closed set of operations forwarded to the downstream data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "get_company_overview")]
    CompanyOverview,
    #[serde(rename = "get_initiative_status")]
    InitiativeStatus,
    #[serde(rename = "get_area_kpis")]
    AreaKpis,
    #[serde(rename = "get_user_initiatives")]
    UserInitiatives,
    #[serde(rename = "search_initiatives")]
    SearchInitiatives,
    #[serde(rename = "get_initiative_suggestions")]
    InitiativeSuggestions,
}

impl ActionKind {
    /// Wire name sent as `action` in the downstream request body.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CompanyOverview => "get_company_overview",
            ActionKind::InitiativeStatus => "get_initiative_status",
            ActionKind::AreaKpis => "get_area_kpis",
            ActionKind::UserInitiatives => "get_user_initiatives",
            ActionKind::SearchInitiatives => "search_initiatives",
            ActionKind::InitiativeSuggestions => "get_initiative_suggestions",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound call, discriminated by the presence of `fulfillmentInfo`.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundRequest {
    /// Tag-based webhook call: `{ fulfillmentInfo: { tag }, sessionInfo: { parameters }, text }`.
    WebhookCall {
        tag: String,
        session_parameters: Map<String, Value>,
        raw_text: String,
    },
    /// Agent tool invocation: `{ tool, tool_parameters }`.
    ToolCall {
        tool_name: String,
        parameters: Map<String, Value>,
    },
}

impl InboundRequest {
    pub fn is_webhook(&self) -> bool {
        matches!(self, InboundRequest::WebhookCall { .. })
    }

    /// Full tool name as sent by the platform (empty for webhook calls).
    pub fn tool_name(&self) -> &str {
        match self {
            InboundRequest::WebhookCall { .. } => "",
            InboundRequest::ToolCall { tool_name, .. } => tool_name,
        }
    }

    /// Last `/`-separated segment of the tool name, e.g. `area_kpis` for `projects/x/tools/area_kpis`.
    pub fn short_tool_name(&self) -> &str {
        let full = self.tool_name();
        full.rsplit('/').next().unwrap_or(full)
    }

    /// Caller token forwarded to the downstream API when present in the request parameters.
    pub fn user_token(&self) -> Option<&str> {
        let params = match self {
            InboundRequest::WebhookCall {
                session_parameters, ..
            } => session_parameters,
            InboundRequest::ToolCall { parameters, .. } => parameters,
        };
        params.get("user_token").and_then(|v| v.as_str())
    }
}

/// Normalized request: a closed-set action plus the params object for that action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRequest {
    pub action: ActionKind,
    pub params: Map<String, Value>,
}

impl NormalizedRequest {
    pub fn new(action: ActionKind, params: Map<String, Value>) -> Self {
        Self { action, params }
    }
}

/// Caller errors raised while classifying or normalizing a request.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("Unsupported tag: {0}")]
    UnsupportedTag(String),
    #[error("No valid action found for tool parameters: {}", Value::Object(.0.clone()))]
    NoMatchingAction(Map<String, Value>),
}

/// Classify a raw request body as a webhook call or a tool call.
///
/// Empty bodies, non-JSON, non-objects and the empty object `{}` are rejected
/// as malformed; the caller must answer with a client error and stop.
pub fn classify(body: &[u8]) -> Result<InboundRequest, NormalizeError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(NormalizeError::MalformedRequest("empty body".to_string()));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| NormalizeError::MalformedRequest(format!("invalid JSON: {}", e)))?;
    let Value::Object(root) = value else {
        return Err(NormalizeError::MalformedRequest(
            "body is not a JSON object".to_string(),
        ));
    };
    if root.is_empty() {
        return Err(NormalizeError::MalformedRequest("empty JSON object".to_string()));
    }

    if let Some(fulfillment) = root.get("fulfillmentInfo") {
        let tag = fulfillment
            .get("tag")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let session_parameters = root
            .get("sessionInfo")
            .and_then(|s| s.get("parameters"))
            .and_then(|p| p.as_object())
            .cloned()
            .unwrap_or_default();
        let raw_text = root
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        return Ok(InboundRequest::WebhookCall {
            tag,
            session_parameters,
            raw_text,
        });
    }

    let tool_name = root
        .get("tool")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let parameters = root
        .get("tool_parameters")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();
    Ok(InboundRequest::ToolCall {
        tool_name,
        parameters,
    })
}

/// Map a classified request to its normalized `(action, params)` pair.
pub fn normalize(
    request: &InboundRequest,
    extractor: &dyn NameExtractor,
) -> Result<NormalizedRequest, NormalizeError> {
    match request {
        InboundRequest::WebhookCall { tag, raw_text, .. } => map_tag(tag, raw_text, extractor),
        InboundRequest::ToolCall { parameters, .. } => map_parameters(parameters),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    #[test]
    fn fulfillment_info_marks_webhook_call() {
        let req = classify(&body(json!({
            "fulfillmentInfo": { "tag": "area_kpis" },
            "sessionInfo": { "parameters": { "user_token": "t-1" } },
            "text": "kpis del área de finanzas"
        })))
        .unwrap();
        assert_eq!(
            req,
            InboundRequest::WebhookCall {
                tag: "area_kpis".to_string(),
                session_parameters: json!({ "user_token": "t-1" }).as_object().unwrap().clone(),
                raw_text: "kpis del área de finanzas".to_string(),
            }
        );
        assert_eq!(req.user_token(), Some("t-1"));
    }

    #[test]
    fn missing_fulfillment_info_is_tool_call() {
        let req = classify(&body(json!({
            "tool": "projects/p/agents/a/tools/area_kpis",
            "tool_parameters": { "nombre_area": "Finanzas" }
        })))
        .unwrap();
        assert!(!req.is_webhook());
        assert_eq!(req.tool_name(), "projects/p/agents/a/tools/area_kpis");
        assert_eq!(req.short_tool_name(), "area_kpis");
        assert_eq!(req.user_token(), None);
    }

    #[test]
    fn empty_fulfillment_info_still_webhook_with_empty_tag() {
        let req = classify(&body(json!({ "fulfillmentInfo": {} }))).unwrap();
        let err = normalize(&req, &PatternExtractor).unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedTag(ref t) if t.is_empty()));
    }

    #[test]
    fn empty_and_invalid_bodies_are_malformed() {
        let cases: [&[u8]; 8] = [b"", b"   ", b"{not json", b"[1,2]", b"\"text\"", b"null", b"{}", b" { } "];
        for raw in cases {
            let err = classify(raw).unwrap_err();
            assert!(
                matches!(err, NormalizeError::MalformedRequest(_)),
                "expected malformed for {:?}",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[test]
    fn non_object_tool_parameters_become_empty() {
        let req = classify(&body(json!({ "tool": "x", "tool_parameters": [1, 2] }))).unwrap();
        let err = normalize(&req, &PatternExtractor).unwrap_err();
        assert!(matches!(err, NormalizeError::NoMatchingAction(ref m) if m.is_empty()));
    }

    #[test]
    fn webhook_scenario_extracts_initiative_name() {
        let req = classify(&body(json!({
            "fulfillmentInfo": { "tag": "initiative_status" },
            "text": "¿Cómo va la Iniciativa de Migración de Datos?"
        })))
        .unwrap();
        let normalized = normalize(&req, &PatternExtractor).unwrap();
        assert_eq!(normalized.action, ActionKind::InitiativeStatus);
        assert_eq!(
            normalized.params.get("nombre_iniciativa"),
            Some(&json!("Migración De Datos"))
        );
    }

    #[test]
    fn action_kind_serializes_to_wire_name() {
        for action in [
            ActionKind::CompanyOverview,
            ActionKind::InitiativeStatus,
            ActionKind::AreaKpis,
            ActionKind::UserInitiatives,
            ActionKind::SearchInitiatives,
            ActionKind::InitiativeSuggestions,
        ] {
            assert_eq!(serde_json::to_value(action).unwrap(), json!(action.as_str()));
        }
    }
}
