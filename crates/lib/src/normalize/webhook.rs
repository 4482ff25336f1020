//! Webhook tag mapper: fixed tag table, exact match, no fallback.

use serde_json::{Map, Value};

use super::extract::NameExtractor;
use super::{ActionKind, NormalizeError, NormalizedRequest};

/// Map a webhook tag plus the raw utterance to a normalized request.
///
/// Entity names come only from the utterance. When extraction finds nothing the
/// key is left out of `params` rather than sent as null.
pub fn map_tag(
    tag: &str,
    raw_text: &str,
    extractor: &dyn NameExtractor,
) -> Result<NormalizedRequest, NormalizeError> {
    let mut params = Map::new();
    let action = match tag {
        "company_overview" => ActionKind::CompanyOverview,
        "initiative_status" => {
            if let Some(name) = extractor.initiative_name(raw_text) {
                params.insert("nombre_iniciativa".to_string(), Value::String(name));
            }
            ActionKind::InitiativeStatus
        }
        "area_kpis" => {
            if let Some(name) = extractor.area_name(raw_text) {
                params.insert("nombre_area".to_string(), Value::String(name));
            }
            ActionKind::AreaKpis
        }
        other => return Err(NormalizeError::UnsupportedTag(other.to_string())),
    };
    log::debug!("webhook tag {:?} mapped to {} with params {:?}", tag, action, params);
    Ok(NormalizedRequest::new(action, params))
}
