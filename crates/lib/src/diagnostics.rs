//! Startup diagnostics: what the service resolved and whether the downstream API answers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::config::ServiceSettings;
use crate::downstream::DownstreamClient;

/// Report printed by `stratix-bff diagnose`. Never carries secret values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub checked_at: DateTime<Utc>,
    pub project_id: Option<String>,
    pub downstream_url: Option<String>,
    pub key_length: Option<usize>,
    pub key_format_valid: Option<bool>,
    pub platform_url_configured: bool,
    pub probe: ProbeResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ProbeResult {
    /// No credentials, nothing to probe.
    Skipped,
    Ok {
        #[serde(rename = "elapsedMs")]
        elapsed_ms: u64,
    },
    Failed { error: String },
}

/// Whether a key has the shape of a JWT: `eyJ` prefix and exactly two dots.
pub fn looks_like_jwt(key: &str) -> bool {
    key.starts_with("eyJ") && key.matches('.').count() == 2
}

impl DiagnosticsReport {
    /// Everything that can be reported without touching the network.
    pub fn from_settings(settings: &ServiceSettings) -> Self {
        let creds = settings.credentials.as_ref();
        Self {
            checked_at: Utc::now(),
            project_id: settings.project_id.clone(),
            downstream_url: creds.map(|c| c.url.clone()),
            key_length: creds.map(|c| c.api_key.len()),
            key_format_valid: creds.map(|c| looks_like_jwt(&c.api_key)),
            platform_url_configured: settings.platform_url.is_some(),
            probe: ProbeResult::Skipped,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.probe, ProbeResult::Ok { .. })
    }
}

/// Build the report and probe the downstream API with a company overview request.
pub async fn run_diagnostics(settings: &ServiceSettings) -> DiagnosticsReport {
    let mut report = DiagnosticsReport::from_settings(settings);
    let Some(creds) = settings.credentials.as_ref() else {
        log::warn!("downstream credentials unavailable; skipping probe");
        return report;
    };
    if report.key_format_valid == Some(false) {
        log::warn!("downstream key does not look like a JWT");
    }
    let client = match DownstreamClient::new(creds, settings.downstream_timeout) {
        Ok(c) => c,
        Err(e) => {
            report.probe = ProbeResult::Failed {
                error: e.to_string(),
            };
            return report;
        }
    };
    log::info!("probing downstream API at {}", client.url());
    let started = std::time::Instant::now();
    report.probe = match client.probe().await {
        Ok(_) => ProbeResult::Ok {
            elapsed_ms: duration_ms(started.elapsed()),
        },
        Err(e) => ProbeResult::Failed {
            error: e.to_string(),
        },
    };
    report
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
