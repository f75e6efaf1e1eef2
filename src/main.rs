// =============================================================================
// Vertex Signal Engine — Main Entry Point
// =============================================================================
//
// Backend-authoritative indicator and signal pipeline: candle history is
// refreshed on a timer, live ticks stream over a websocket, and every
// computed value is pushed to dashboard clients as a typed event.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod audit;
mod engine;
mod events;
mod feed;
mod indicators;
mod live_state;
mod market_data;
mod runtime_config;
mod signals;
mod trend;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::feed::HistoryClient;
use crate::runtime_config::RuntimeConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Vertex signal engine starting up");

    let mut config = RuntimeConfig::load("runtime_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("VERTEX_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if config.symbols.is_empty() {
        config.symbols = vec!["BTCUSD".into(), "ETHUSD".into()];
    }
    if let Ok(addr) = std::env::var("VERTEX_BIND_ADDR") {
        config.bind_addr = addr;
    }

    info!(symbols = ?config.symbols, timeframes = config.timeframes.len(), "configured universe");

    // ── 2. Build shared state ────────────────────────────────────────────
    let history = HistoryClient::new(config.history_url.clone())?;
    let state = Arc::new(AppState::new(config));

    // ── 3. Spawn ticker streams ──────────────────────────────────────────
    let symbols = state.runtime_config.read().symbols.clone();
    for symbol in &symbols {
        tokio::spawn(feed::ticker::supervise_ticker(
            state.clone(),
            symbol.clone(),
        ));
    }
    info!(count = symbols.len(), "ticker streams launched");

    // ── 4. Indicator refresh loop ────────────────────────────────────────
    tokio::spawn(engine::run_refresh_loop(state.clone(), history));

    // ── 5. Snapshot loop (rate-of-change baseline) ───────────────────────
    tokio::spawn(engine::run_snapshot_loop(state.clone()));

    // ── 6. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = state.runtime_config.read().bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("failed to bind API server");
        info!(addr = %bind_addr, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    info!("all subsystems running, press Ctrl+C to stop");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping");

    if let Err(e) = state.runtime_config.read().save("runtime_config.json") {
        error!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("Vertex signal engine shut down complete");
    Ok(())
}
