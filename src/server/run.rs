//! Router assembly and the server entry point.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{routing::get, Router};

use super::http;
use super::state::AppState;
use super::ws;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::health_handler))
        .route("/ws", get(ws::ws_handler))
        .route(
            "/api/webhooks",
            get(http::get_webhooks_handler)
                .post(http::add_webhook_handler)
                .delete(http::delete_webhook_handler),
        )
        .route("/api/games", get(http::list_games_handler))
        .route("/api/games/:mode/:id", get(http::game_history_handler))
        .with_state(state)
}

pub async fn run_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "checkers server listening");
    axum::serve(listener, app)
        .await
        .context("server terminated")?;
    Ok(())
}
