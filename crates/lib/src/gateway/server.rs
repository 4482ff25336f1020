//! HTTP server: health probes and the fulfillment endpoint on a single port.

use crate::config::ServiceSettings;
use crate::gateway::fulfill::Fulfiller;
use crate::gateway::reply::Reply;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "stratix-bff";

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub settings: Arc<ServiceSettings>,
    pub fulfiller: Arc<Fulfiller>,
}

impl GatewayState {
    pub fn new(settings: ServiceSettings) -> Result<Self> {
        let settings = Arc::new(settings);
        let fulfiller = Fulfiller::new(settings.clone()).context("building downstream client")?;
        Ok(Self {
            settings,
            fulfiller: Arc::new(fulfiller),
        })
    }
}

/// Routes served by the gateway: health on `GET /` and `GET /health`, fulfillment on `POST /`.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http).post(fulfill_http))
        .route("/health", get(health_http))
        .with_state(state)
}

pub async fn run_gateway(settings: ServiceSettings) -> Result<()> {
    let bind_addr = format!("{}:{}", settings.bind.trim(), settings.port);
    match &settings.credentials {
        Some(creds) => log::info!("downstream API at {}", creds.url),
        None => log::warn!("downstream credentials unavailable; fulfillment requests will fail"),
    }

    let app = router(GatewayState::new(settings)?);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// In-flight requests are drained by axum before `run_gateway` returns.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining in-flight requests");
}

/// POST / takes the raw body so that malformed JSON gets the webhook-shaped 400 instead of axum's rejection.
async fn fulfill_http(
    State(state): State<GatewayState>,
    body: Bytes,
) -> (StatusCode, Json<Reply>) {
    let request_id = uuid::Uuid::new_v4().to_string();
    let (status, reply) = state.fulfiller.handle(&request_id, &body).await;
    log::info!("[{}] responded {}", request_id, status.as_u16());
    (status, Json(reply))
}

/// GET / and GET /health return a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "port": state.settings.port,
    }))
}
