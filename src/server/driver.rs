//! Drives the machine role of a [`MachineGame`].
//!
//! The loop is just another snapshot subscriber: whenever the machine is to
//! play it computes a ply from a deep copy of the engine and submits it with
//! the snapshot's version. The version guard on `apply_given` makes the
//! submission at-most-once per turn, so the extra one-shot turn the hub
//! schedules for an opening machine move is harmless.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::server::concurrent::{ApplyError, GameState};
use crate::server::games::MachineGame;

/// Consume the game's snapshot stream until it closes.
pub async fn run(mg: Arc<MachineGame>, mut snapshots: mpsc::Receiver<GameState>) {
    while let Some(snapshot) = snapshots.recv().await {
        if snapshot.to_play == mg.machine_color && !snapshot.result.is_terminal() {
            take_turn(&mg, snapshot.version).await;
        }
    }
    tracing::debug!(id = %mg.id, "machine driver stopped");
}

/// Compute and submit one machine ply against `version`.
///
/// The search runs on a blocking thread over an independent engine copy; no
/// game lock is held anywhere near it.
pub async fn take_turn(mg: &MachineGame, version: u32) {
    let engine = mg.game.engine_copy();
    let searcher = mg.searcher.clone();
    let chosen = tokio::task::spawn_blocking(move || searcher.search(&engine)).await;

    let ply = match chosen {
        Ok(Some(ply)) => ply,
        Ok(None) => {
            tracing::warn!(id = %mg.id, version, "searcher found no ply");
            return;
        }
        Err(e) => {
            tracing::error!(id = %mg.id, error = %e, "search task failed");
            return;
        }
    };

    match mg.game.apply_given(mg.machine_color, version, &ply) {
        Ok(_) => {}
        // Duplicate submissions for an already-advanced turn surface as
        // stale (same turn re-raced) or out-of-turn (turn already flipped);
        // both are expected and dropped.
        Err(e @ (ApplyError::StaleVersion { .. } | ApplyError::NotYourTurn)) => {
            tracing::debug!(id = %mg.id, version, reason = %e, "dropping duplicate machine ply");
        }
        Err(e) => {
            tracing::warn!(id = %mg.id, version, error = %e, "machine ply rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Color;
    use crate::search::Heuristic;
    use std::time::Duration;

    fn machine_game(human: Color) -> Arc<MachineGame> {
        Arc::new(MachineGame::new(
            human,
            Heuristic::WeightedCount,
            Duration::from_millis(20),
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn responds_to_each_human_ply_exactly_once() {
        // Human is white and opens; the driver must answer as black.
        let mg = machine_game(Color::White);
        let (_sub, rx) = mg.game.subscribe();
        let (_obs, mut observer) = mg.game.subscribe();
        let handle = tokio::spawn(run(mg.clone(), rx));

        mg.game.apply_indexed(Color::White, 1, 0).unwrap();
        assert_eq!(observer.recv().await.unwrap().version, 2);
        let s3 = tokio::time::timeout(Duration::from_secs(5), observer.recv())
            .await
            .expect("machine never answered")
            .expect("stream closed");
        assert_eq!(s3.version, 3);
        assert_eq!(s3.to_play, Color::White);

        mg.game.detach_all();
        let _ = handle.await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn duplicate_turns_are_dropped_silently() {
        let mg = machine_game(Color::White);
        // White to play: a machine submission is rejected without mutating.
        take_turn(&mg, 1).await;
        assert_eq!(mg.game.snapshot().version, 1);

        mg.game.apply_indexed(Color::White, 1, 0).unwrap();
        // Black (the machine) to play at version 2: a submission against
        // the old version is stale and dropped.
        take_turn(&mg, 1).await;
        assert_eq!(mg.game.snapshot().version, 2);

        // The real turn advances the game; replaying it does not.
        take_turn(&mg, 2).await;
        assert_eq!(mg.game.snapshot().version, 3);
        take_turn(&mg, 2).await;
        assert_eq!(mg.game.snapshot().version, 3);
    }
}
