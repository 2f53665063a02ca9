mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use gambit_core::transport::Transport;
use gambit_engine::Engine;
use gambit_lichess::LichessClient;
use gambit_oracle::OpenRouterOracle;
use gambit_server::{AppState, ServerConfig};
use gambit_telemetry::init_telemetry;

use crate::config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Process environment wins over .env
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let telemetry = init_telemetry(args.telemetry());
    let metrics = telemetry.metrics();

    tracing::info!(
        model = %args.openrouter_model,
        lichess = %args.lichess_url,
        "starting gambit"
    );

    let transport: Arc<dyn Transport> =
        Arc::new(LichessClient::new(args.lichess()).context("building Lichess client")?);
    let oracle = Arc::new(OpenRouterOracle::new(args.oracle()).context("building move oracle")?);

    let identity = transport
        .fetch_identity()
        .await
        .context("fetching bot account")?;
    tracing::info!(id = %identity.id, username = %identity.username, "authenticated");

    let engine = Engine::new(
        transport,
        oracle,
        &identity,
        Arc::clone(&metrics),
        args.engine(),
    )
    .context("invalid engine configuration")?;

    let shutdown = CancellationToken::new();
    let state = AppState {
        bot_username: identity.username.clone(),
        registry: engine.registry(),
        metrics,
    };
    let server = gambit_server::start(ServerConfig { port: args.port }, state, shutdown.clone())
        .await
        .with_context(|| format!("binding status server on port {}", args.port))?;
    let engine_task = engine.spawn(shutdown.clone());

    tracing::info!(port = server.port, "gambit ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl+c")?;

    tracing::info!("shutting down");
    shutdown.cancel();
    if let Err(e) = engine_task.await {
        tracing::warn!(error = %e, "engine task ended abnormally");
    }
    server.stopped().await;
    tracing::info!("stopped");
    Ok(())
}
