//! JSON HTTP API: webhook management and finished-game history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{Game, Ply};
use crate::store::Mode;

use super::state::AppState;

fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    let message: String = message.into();
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}

pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct GamesQuery {
    pub mode: String,
}

pub async fn get_webhooks_handler(State(state): State<AppState>) -> axum::response::Response {
    match state.store.webhooks().await {
        Ok(urls) => Json(urls).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to list webhooks");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to list webhooks")
        }
    }
}

pub async fn add_webhook_handler(
    State(state): State<AppState>,
    Json(body): Json<WebhookBody>,
) -> axum::response::Response {
    let parsed = match url::Url::parse(&body.url) {
        Ok(parsed) => parsed,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid url"),
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return json_error(StatusCode::BAD_REQUEST, "url must be http or https");
    }
    match state.store.add_webhook(&body.url).await {
        Ok(urls) => Json(urls).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to add webhook");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to add webhook")
        }
    }
}

pub async fn delete_webhook_handler(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
) -> axum::response::Response {
    match state.store.remove_webhook(&query.url).await {
        Ok(urls) => Json(urls).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to delete webhook");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to delete webhook")
        }
    }
}

pub async fn list_games_handler(
    State(state): State<AppState>,
    Query(query): Query<GamesQuery>,
) -> axum::response::Response {
    let mode: Mode = match query.mode.parse() {
        Ok(mode) => mode,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    match state.store.game_ids(mode).await {
        Ok(ids) => Json(ids).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to list games");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to list games")
        }
    }
}

/// One step of a replayed game: the position and the ply played from it
/// (`null` for the final position).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayState {
    board: String,
    ply_done: Option<Ply>,
}

pub async fn game_history_handler(
    State(state): State<AppState>,
    Path((mode, id)): Path<(String, Uuid)>,
) -> axum::response::Response {
    let mode: Mode = match mode.parse() {
        Ok(mode) => mode,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let plies = match state.store.load_history(mode, id).await {
        Ok(Some(plies)) => plies,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "game not found"),
        Err(e) => {
            tracing::error!(error = %e, "failed to load game history");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to load game history",
            );
        }
    };

    match replay(&plies) {
        Ok(states) => Json(states).into_response(),
        Err(()) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "stored history does not replay",
        ),
    }
}

/// Walk the stored plies through a fresh engine, producing the board before
/// each ply plus the final position.
fn replay(plies: &[Ply]) -> Result<Vec<ReplayState>, ()> {
    let mut game = Game::new();
    let mut states = Vec::with_capacity(plies.len() + 1);
    for ply in plies {
        states.push(ReplayState {
            board: game.board().serialize(),
            ply_done: Some(ply.clone()),
        });
        game.do_ply(ply).map_err(|_| ())?;
    }
    states.push(ReplayState {
        board: game.board().serialize(),
        ply_done: None,
    });
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_walks_the_history() {
        let mut game = Game::new();
        let mut plies = Vec::new();
        for _ in 0..4 {
            let ply = game.legal_plies()[0].clone();
            game.do_ply(&ply).unwrap();
            plies.push(ply);
        }

        let states = replay(&plies).unwrap();
        assert_eq!(states.len(), 5);
        assert!(states.last().unwrap().ply_done.is_none());
        assert_eq!(states.last().unwrap().board, game.board().serialize());
    }

    #[test]
    fn corrupt_history_does_not_replay() {
        let game = Game::new();
        let ply = game.legal_plies()[0].clone();
        // The same ply twice cannot be legal back to back.
        assert!(replay(&[ply.clone(), ply]).is_err());
    }
}
