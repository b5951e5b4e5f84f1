//! Game registries and their per-game inactivity sweepers.
//!
//! Each hub owns a map from game id to the game wrapper. Registering a game
//! spawns its sweeper; for machine games it also starts the machine-turn
//! driver. The sweeper evicts a game once its snapshot stream has been idle
//! for the configured timeout (or has closed because the game finished),
//! then, for human games, keeps the broadcast channels alive until both
//! players have gone offline so a just-delivered terminal snapshot still
//! reaches them. Finalization persists the ply history and notifies
//! webhooks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use uuid::Uuid;

use crate::engine::Color;
use crate::store::{Mode, Store};
use crate::webhooks;

use super::concurrent::{now_unix_secs, ConcurrentGame};
use super::driver;
use super::games::{HumanGame, MachineGame};
use super::presence::PresenceCounter;

pub struct HumanHub {
    games: Mutex<HashMap<Uuid, Arc<HumanGame>>>,
    inactivity_timeout: Duration,
    store: Arc<dyn Store>,
    http: reqwest::Client,
}

impl HumanHub {
    pub fn new(inactivity_timeout: Duration, store: Arc<dyn Store>) -> HumanHub {
        HumanHub {
            games: Mutex::new(HashMap::new()),
            inactivity_timeout,
            store,
            http: reqwest::Client::new(),
        }
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<HumanGame>>> {
        self.games.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(self: &Arc<Self>, hg: Arc<HumanGame>) {
        self.locked().insert(hg.id, hg.clone());
        let hub = self.clone();
        tokio::spawn(async move {
            hub.sweep(hg).await;
        });
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<HumanGame>> {
        self.locked().get(&id).cloned()
    }

    pub fn unregister(&self, id: Uuid) {
        self.locked().remove(&id);
    }

    async fn sweep(&self, hg: Arc<HumanGame>) {
        watch_liveness(&hg.game, self.inactivity_timeout).await;
        self.unregister(hg.id);

        drain_players(
            [hg.presence(Color::White), hg.presence(Color::Black)],
            self.inactivity_timeout,
        )
        .await;

        hg.game.detach_all();
        hg.presence(Color::White).detach_all();
        hg.presence(Color::Black).detach_all();
        finalize(&*self.store, &self.http, Mode::Human, hg.id, &hg.game).await;
    }
}

pub struct MachineHub {
    games: Mutex<HashMap<Uuid, Arc<MachineGame>>>,
    inactivity_timeout: Duration,
    store: Arc<dyn Store>,
    http: reqwest::Client,
}

impl MachineHub {
    pub fn new(inactivity_timeout: Duration, store: Arc<dyn Store>) -> MachineHub {
        MachineHub {
            games: Mutex::new(HashMap::new()),
            inactivity_timeout,
            store,
            http: reqwest::Client::new(),
        }
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<MachineGame>>> {
        self.games.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert the game, start its machine driver (scheduling an immediate
    /// turn when the machine holds the opening move) and its sweeper.
    pub fn register(self: &Arc<Self>, mg: Arc<MachineGame>) {
        self.locked().insert(mg.id, mg.clone());

        // Subscribe before looking at the snapshot so no update can fall
        // between the two.
        let (_sub, rx) = mg.game.subscribe();
        let snapshot = mg.game.snapshot();
        tokio::spawn(driver::run(mg.clone(), rx));
        if snapshot.to_play == mg.machine_color && !snapshot.result.is_terminal() {
            let mg_first = mg.clone();
            let version = snapshot.version;
            tokio::spawn(async move {
                driver::take_turn(&mg_first, version).await;
            });
        }

        let hub = self.clone();
        tokio::spawn(async move {
            hub.sweep(mg).await;
        });
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<MachineGame>> {
        self.locked().get(&id).cloned()
    }

    pub fn unregister(&self, id: Uuid) {
        self.locked().remove(&id);
    }

    /// Machine games skip the presence drain: the lone human subscriber has
    /// the terminal snapshot buffered by the time liveness ends.
    async fn sweep(&self, mg: Arc<MachineGame>) {
        watch_liveness(&mg.game, self.inactivity_timeout).await;
        self.unregister(mg.id);
        mg.game.detach_all();
        mg.presence.detach_all();
        finalize(&*self.store, &self.http, Mode::Machine, mg.id, &mg.game).await;
    }
}

/// Phase 1: follow the game's snapshot stream until it closes (the game
/// finished) or no activity lands inside the timeout.
async fn watch_liveness(game: &ConcurrentGame, timeout: Duration) {
    let (sub, mut rx) = game.subscribe();
    loop {
        let idle = Duration::from_secs(now_unix_secs().saturating_sub(game.last_activity_secs()));
        let wait = timeout.saturating_sub(idle);
        tokio::select! {
            received = rx.recv() => {
                if received.is_none() {
                    break;
                }
                // Activity: the next iteration re-arms from last_activity.
            }
            _ = tokio::time::sleep(wait) => {
                // Re-check against the clock: a ply may have landed while
                // the timer was falling due.
                let idle = now_unix_secs().saturating_sub(game.last_activity_secs());
                if idle >= timeout.as_secs() {
                    break;
                }
            }
        }
    }
    game.detach(sub);
}

/// Phase 2: wait until every listed presence counter reports offline, or
/// force the issue after one more transition-free timeout.
async fn drain_players(counters: [&PresenceCounter; 2], timeout: Duration) {
    let (id_a, mut rx_a) = counters[0].subscribe();
    let (id_b, mut rx_b) = counters[1].subscribe();
    let mut online = [counters[0].is_online(), counters[1].is_online()];

    while online[0] || online[1] {
        tokio::select! {
            status = rx_a.recv() => online[0] = status.unwrap_or(false),
            status = rx_b.recv() => online[1] = status.unwrap_or(false),
            _ = tokio::time::sleep(timeout) => {
                // Someone stayed online past a whole extra timeout window;
                // disconnect forcefully.
                break;
            }
        }
    }

    counters[0].detach(id_a);
    counters[1].detach(id_b);
}

/// Hand the finished (or abandoned) game to the persistence and webhook
/// shims. Safe to call once per game; every step is best-effort.
async fn finalize(
    store: &dyn Store,
    http: &reqwest::Client,
    mode: Mode,
    id: Uuid,
    game: &ConcurrentGame,
) {
    let snapshot = game.snapshot();
    let history = game.history();
    tracing::info!(%id, mode = %mode, result = ?snapshot.result, plies = history.len(), "retiring game");
    if let Err(e) = store.save_history(mode, id, &history).await {
        tracing::warn!(%id, error = %e, "failed to persist game history");
    }
    webhooks::notify_game_ended(store, http, mode, id, &snapshot).await;
}
