//! Response enrichment: a Spanish summary (`resumen`) and, when the platform
//! URL is known, a deep link (`link`) added to the downstream data.

use serde_json::{Map, Value};

use crate::normalize::ActionKind;

/// Add `resumen` and `link` to `data` for the actions that have templates.
///
/// Only non-empty objects are touched. Without a platform URL the `link` key
/// is left out entirely.
pub fn enrich(action: ActionKind, data: &mut Value, platform_url: Option<&str>) {
    let Value::Object(obj) = data else {
        return;
    };
    if obj.is_empty() {
        return;
    }
    let base = platform_url
        .map(|u| u.trim_end_matches('/'))
        .filter(|u| !u.is_empty());

    match action {
        ActionKind::InitiativeStatus => {
            if let (Some(base), Some(id)) = (base, present(obj, "id")) {
                let link = format!("{}/initiatives/{}", base, render(id));
                obj.insert("link".to_string(), Value::String(link));
            }
            let summary = format!(
                "La iniciativa '{}' tiene un progreso del {}% y está en estado '{}'.",
                text_or(obj, "title", ""),
                text_or(obj, "progress", "0"),
                text_or(obj, "status", ""),
            );
            obj.insert("resumen".to_string(), Value::String(summary));
        }
        ActionKind::AreaKpis => {
            if let (Some(base), Some(id)) = (base, present(obj, "area_id")) {
                let link = format!("{}/areas/{}", base, render(id));
                obj.insert("link".to_string(), Value::String(link));
            }
            let summary = format!(
                "El área '{}' tiene {} iniciativas con un progreso promedio del {}%.",
                text_or(obj, "area_name", ""),
                text_or(obj, "total_initiatives", "0"),
                text_or(obj, "avg_progress", "0"),
            );
            obj.insert("resumen".to_string(), Value::String(summary));
        }
        ActionKind::CompanyOverview => {
            let metrics = match obj.get("company_metrics") {
                Some(Value::Object(m)) => m,
                _ => &*obj,
            };
            let summary = format!(
                "La empresa tiene {} iniciativas, {} completadas y un progreso general del {}%.",
                text_or(metrics, "total_initiatives", "0"),
                text_or(metrics, "completed_initiatives", "0"),
                text_or(metrics, "overall_progress", "0"),
            );
            obj.insert("resumen".to_string(), Value::String(summary));
            if let Some(base) = base {
                obj.insert("link".to_string(), Value::String(format!("{}/dashboard", base)));
            }
        }
        ActionKind::UserInitiatives
        | ActionKind::SearchInitiatives
        | ActionKind::InitiativeSuggestions => {}
    }
}

/// Field value unless missing, null, false or an empty string.
fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    match obj.get(key)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        v => Some(v),
    }
}

/// Strings render bare, everything else as JSON (so `42` and `42.5` stay as written).
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_or(obj: &Map<String, Value>, key: &str, default: &str) -> String {
    match obj.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(v) => render(v),
    }
}
