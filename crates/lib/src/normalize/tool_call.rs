//! Tool-call parameter mapper.
//!
//! Predicates are checked in a fixed order and the first match wins, so a call
//! carrying both `nombre_iniciativa` and `user_id` is an initiative status lookup.
//! Selected values are passed through verbatim (an absent key becomes null);
//! only `limit` gets a default, and only when the key is missing.

use serde_json::{Map, Value};

use super::{ActionKind, NormalizeError, NormalizedRequest};

const USER_INITIATIVES_LIMIT: u64 = 10;
const SEARCH_LIMIT: u64 = 20;

/// Map a flat tool parameter object to a normalized request.
pub fn map_parameters(params: &Map<String, Value>) -> Result<NormalizedRequest, NormalizeError> {
    let has = |key: &str| params.contains_key(key);
    let pick = |key: &str| params.get(key).cloned().unwrap_or(Value::Null);
    let limit_or = |default: u64| {
        params
            .get("limit")
            .cloned()
            .unwrap_or_else(|| Value::from(default))
    };

    let (action, out) = if has("nombre_iniciativa") || has("initiative_id") {
        (
            ActionKind::InitiativeStatus,
            object([
                ("nombre_iniciativa", pick("nombre_iniciativa")),
                ("initiative_id", pick("initiative_id")),
            ]),
        )
    } else if has("nombre_area") || has("area_id") {
        (
            ActionKind::AreaKpis,
            object([
                ("nombre_area", pick("nombre_area")),
                ("area_id", pick("area_id")),
            ]),
        )
    } else if has("user_id") {
        (
            ActionKind::UserInitiatives,
            object([
                ("user_id", pick("user_id")),
                ("limit", limit_or(USER_INITIATIVES_LIMIT)),
            ]),
        )
    } else if has("query") {
        (
            ActionKind::SearchInitiatives,
            object([("query", pick("query")), ("limit", limit_or(SEARCH_LIMIT))]),
        )
    } else {
        match params.get("action").and_then(|v| v.as_str()) {
            Some("company_overview") => (ActionKind::CompanyOverview, Map::new()),
            Some("suggestions") => (
                ActionKind::InitiativeSuggestions,
                object([("area_id", pick("area_id")), ("user_role", pick("user_role"))]),
            ),
            _ => return Err(NormalizeError::NoMatchingAction(params.clone())),
        }
    };
    Ok(NormalizedRequest::new(action, out))
}

fn object<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
