//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.stratix-bff/config.json`) and the
//! environment, then resolved once at startup into [`ServiceSettings`], which the
//! gateway shares read-only for the lifetime of the process.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::secrets::SecretSource;

/// Environment variables checked, in order, for the cloud project id.
pub const PROJECT_ID_VARS: [&str; 3] = ["GCP_PROJECT", "GOOGLE_CLOUD_PROJECT", "PROJECT_ID"];

/// Environment variable holding the platform base URL used for deep links.
pub const PLATFORM_URL_VAR: &str = "STRATIX_PLATFORM_URL";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Downstream data API endpoint, credentials and call bounds.
    #[serde(default)]
    pub downstream: DownstreamConfig,

    /// Platform settings (deep-link base URL).
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Secret names and the optional mounted-secrets directory.
    #[serde(default)]
    pub secrets: SecretsConfig,
}

/// Gateway bind, port and request deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8080). Overridden by the PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Platform-level deadline for one fulfillment call. When it expires the
    /// in-flight downstream call is dropped and an error is returned.
    #[serde(default)]
    pub request_deadline_secs: Option<u64>,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            request_deadline_secs: None,
        }
    }
}

/// Downstream data API settings. `url` and `apiKey` are only used when the
/// corresponding secrets are not available.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownstreamConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Per-request timeout (default 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for connect errors and timeouts only (default 0).
    #[serde(default)]
    pub max_retries: u32,
    /// Base backoff between retries; doubles on each attempt (default 250).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    /// Base URL for deep links. Lowest precedence after STRATIX_PLATFORM_URL and the secret.
    pub base_url: Option<String>,
}

/// Secret names and where mounted secret files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsConfig {
    /// Directory with one file per secret (e.g. a secret volume mount). Omit to use env only.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_downstream_url_secret")]
    pub downstream_url_secret: String,
    #[serde(default = "default_downstream_key_secret")]
    pub downstream_key_secret: String,
    #[serde(default = "default_platform_url_secret")]
    pub platform_url_secret: String,
}

fn default_downstream_url_secret() -> String {
    "supabase-edge-function-url".to_string()
}

fn default_downstream_key_secret() -> String {
    "supabase-anon-key".to_string()
}

fn default_platform_url_secret() -> String {
    "stratix-platform-url".to_string()
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            downstream_url_secret: default_downstream_url_secret(),
            downstream_key_secret: default_downstream_key_secret(),
            platform_url_secret: default_platform_url_secret(),
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("STRATIX_BFF_CONFIG").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".stratix-bff").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, STRATIX_BFF_CONFIG, or the default. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// First variable in `names` with a non-empty (trimmed) value.
pub fn first_non_empty<F>(names: &[&str], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolve the cloud project id from GCP_PROJECT, GOOGLE_CLOUD_PROJECT or PROJECT_ID.
pub fn resolve_project_id() -> Option<String> {
    first_non_empty(&PROJECT_ID_VARS, env_var)
}

/// Credentials for the downstream data API.
#[derive(Clone)]
pub struct DownstreamCredentials {
    pub url: String,
    pub api_key: String,
}

impl std::fmt::Debug for DownstreamCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownstreamCredentials")
            .field("url", &self.url)
            .field("api_key", &format_args!("<{} chars>", self.api_key.len()))
            .finish()
    }
}

/// Process-wide settings, resolved once at startup and never refreshed.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub bind: String,
    pub port: u16,
    pub request_deadline: Option<Duration>,
    pub project_id: Option<String>,
    /// None when the url or key could not be resolved; requests then fail with a credential error.
    pub credentials: Option<DownstreamCredentials>,
    /// None when no platform URL is configured; responses then carry no links.
    pub platform_url: Option<String>,
    pub downstream_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ServiceSettings {
    /// Settings taken from the config file alone (no env, no secrets).
    pub fn from_config(config: &Config) -> Self {
        let credentials = match (&config.downstream.url, &config.downstream.api_key) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Some(DownstreamCredentials {
                    url: url.trim().to_string(),
                    api_key: key.trim().to_string(),
                })
            }
            _ => None,
        };
        Self {
            bind: config.gateway.bind.trim().to_string(),
            port: config.gateway.port,
            request_deadline: config.gateway.request_deadline_secs.map(Duration::from_secs),
            project_id: None,
            credentials,
            platform_url: normalize_base_url(config.platform.base_url.as_deref()),
            downstream_timeout: Duration::from_secs(config.downstream.timeout_secs),
            max_retries: config.downstream.max_retries,
            retry_backoff: Duration::from_millis(config.downstream.retry_backoff_ms),
        }
    }

    /// Resolve settings from config, the process environment and a secret source.
    pub fn resolve(config: &Config, secrets: &dyn SecretSource) -> Self {
        Self::resolve_with(config, secrets, env_var)
    }

    /// Same as [`ServiceSettings::resolve`] with an explicit environment lookup.
    pub fn resolve_with<F>(config: &Config, secrets: &dyn SecretSource, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::from_config(config);
        if let Some(port) = env("PORT").and_then(|p| p.trim().parse().ok()) {
            settings.port = port;
        }
        settings.project_id = first_non_empty(&PROJECT_ID_VARS, &env);
        match &settings.project_id {
            Some(id) => log::info!("using project id {}", id),
            None => log::debug!("no project id found in {:?}", PROJECT_ID_VARS),
        }

        let url = lookup_secret(secrets, &config.secrets.downstream_url_secret)
            .or_else(|| settings.credentials.as_ref().map(|c| c.url.clone()));
        let key = lookup_secret(secrets, &config.secrets.downstream_key_secret)
            .or_else(|| settings.credentials.as_ref().map(|c| c.api_key.clone()));
        settings.credentials = match (url, key) {
            (Some(url), Some(api_key)) => Some(DownstreamCredentials { url, api_key }),
            (url, key) => {
                log::warn!(
                    "downstream credentials unavailable (url: {}, key: {})",
                    if url.is_some() { "found" } else { "missing" },
                    if key.is_some() { "found" } else { "missing" },
                );
                None
            }
        };

        let platform = first_non_empty(&[PLATFORM_URL_VAR], &env)
            .or_else(|| lookup_secret(secrets, &config.secrets.platform_url_secret));
        if let Some(url) = normalize_base_url(platform.as_deref()) {
            settings.platform_url = Some(url);
        }
        if settings.platform_url.is_none() {
            log::info!("platform URL not configured; responses will not include links");
        }
        settings
    }
}

fn lookup_secret(secrets: &dyn SecretSource, name: &str) -> Option<String> {
    match secrets.get(name) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("secret {} unavailable: {}", name, e);
            None
        }
    }
}

/// Trim whitespace and trailing slashes; empty => None.
fn normalize_base_url(url: Option<&str>) -> Option<String> {
    url.map(|u| u.trim().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
}
