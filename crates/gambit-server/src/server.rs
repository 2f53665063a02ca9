use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use gambit_engine::SessionRegistry;
use gambit_telemetry::{MetricsRecorder, MetricsSummary};

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub bot_username: String,
    pub registry: Arc<SessionRegistry>,
    pub metrics: Arc<MetricsRecorder>,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    bot: String,
    active_sessions: usize,
    metrics: MetricsSummary,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn start(
    config: ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "status server started");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "status server failed");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        server,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub port: u16,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Wait for the server task to finish after shutdown.
    pub async fn stopped(self) {
        if let Err(e) = self.server.await {
            tracing::warn!(error = %e, "status server task ended abnormally");
        }
    }
}

async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    format!(
        "Lichess bot {} is running. See /health for status.",
        state.bot_username
    )
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthReport {
        status: "healthy",
        bot: state.bot_username.clone(),
        active_sessions: state.registry.len(),
        metrics: state.metrics.summary(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_core::ids::SessionId;

    fn state() -> AppState {
        let metrics = Arc::new(MetricsRecorder::new());
        AppState {
            bot_username: "GambitBot".into(),
            registry: Arc::new(SessionRegistry::new(metrics.clone())),
            metrics,
        }
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let state = state();
        let registry = state.registry.clone();
        let _g1 = registry.try_register(&SessionId::from_raw("g1")).unwrap();
        let _g2 = registry.try_register(&SessionId::from_raw("g2")).unwrap();
        state.metrics.counter_inc("sessions_started", &[], 2);

        let shutdown = CancellationToken::new();
        let handle = start(ServerConfig { port: 0 }, state, shutdown.clone())
            .await
            .unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["bot"], "GambitBot");
        assert_eq!(body["active_sessions"], 2);
        let samples = body["metrics"]["samples"].as_array().unwrap();
        assert!(samples
            .iter()
            .any(|s| s["name"] == "sessions_started" && s["value"] == 2.0));

        shutdown.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn root_names_the_bot() {
        let shutdown = CancellationToken::new();
        let handle = start(ServerConfig { port: 0 }, state(), shutdown.clone())
            .await
            .unwrap();

        let url = format!("http://127.0.0.1:{}/", handle.port);
        let text = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert!(text.contains("GambitBot"));

        shutdown.cancel();
        handle.stopped().await;
    }

    #[test]
    fn build_router_creates_routes() {
        let _router = build_router(state());
    }
}
