//! WebSocket endpoint: upgrade and hand the socket to a session.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

use super::session;
use super::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::handle_socket(socket, state))
}
