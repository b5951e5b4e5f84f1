//! Fire-and-forget end-of-game webhook delivery.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::engine::GameResult;
use crate::server::concurrent::GameState;
use crate::store::{Mode, Store};

#[derive(Debug, Serialize)]
struct WebhookBody {
    mode: Mode,
    id: Uuid,
    result: GameResult,
    timestamp: u64,
}

/// Notify every registered webhook that a game ended. Failures are logged;
/// nothing is retried and nothing is reported back to sessions.
pub async fn notify_game_ended(
    store: &dyn Store,
    http: &reqwest::Client,
    mode: Mode,
    id: Uuid,
    state: &GameState,
) {
    let urls = match store.webhooks().await {
        Ok(urls) => urls,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load webhook urls");
            return;
        }
    };
    if urls.is_empty() {
        return;
    }

    let body = WebhookBody {
        mode,
        id,
        result: state.result,
        timestamp: unix_millis(),
    };
    let payload = match serde_json::to_value(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize webhook body");
            return;
        }
    };

    for url in urls {
        let http = http.clone();
        let payload = payload.clone();
        tokio::spawn(async move {
            match http.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(%url, "webhook delivered");
                }
                Ok(resp) => {
                    tracing::warn!(%url, status = %resp.status(), "webhook rejected");
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "webhook send failed");
                }
            }
        });
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
