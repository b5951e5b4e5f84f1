//! The per-game concurrency wrapper.
//!
//! A [`ConcurrentGame`] owns the rules engine exclusively, serializes all
//! mutation through one lock, and fans every new snapshot out to subscriber
//! channels. Subscribers receive snapshots in strictly increasing version
//! order; a subscriber whose buffer is full is treated as disconnected and
//! detached. After a terminal snapshot has been handed to every subscriber
//! the game closes all streams.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::engine::{Board, Color, Game, GameResult, Ply};

/// Per-subscriber buffer; overflowing it detaches the subscriber.
pub const SUBSCRIPTION_BUFFER: usize = 32;

/// Immutable game snapshot. `legal_plies` is shared, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct GameState {
    pub version: u32,
    pub board: Board,
    pub to_play: Color,
    pub result: GameResult,
    pub legal_plies: Arc<[Ply]>,
}

impl GameState {
    fn from_engine(version: u32, engine: &Game) -> GameState {
        GameState {
            version,
            board: *engine.board(),
            to_play: engine.to_play(),
            result: engine.result(),
            legal_plies: engine.legal_plies().to_vec().into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn from_raw(raw: u64) -> SubscriptionId {
        SubscriptionId(raw)
    }

    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("game is over")]
    GameOver,
    #[error("not your turn")]
    NotYourTurn,
    #[error("stale version, game is at version {current}")]
    StaleVersion { current: u32 },
    #[error("ply index {index} out of range")]
    OutOfRange { index: usize },
    #[error("ply rejected by the rules engine")]
    EngineRejected,
}

struct Inner {
    engine: Game,
    current: GameState,
    history: Vec<Ply>,
    subscribers: Vec<(u64, mpsc::Sender<GameState>)>,
    next_sub: u64,
}

pub struct ConcurrentGame {
    inner: Mutex<Inner>,
    last_activity: AtomicU64,
}

impl Default for ConcurrentGame {
    fn default() -> Self {
        ConcurrentGame::new()
    }
}

impl ConcurrentGame {
    pub fn new() -> ConcurrentGame {
        let engine = Game::new();
        let current = GameState::from_engine(1, &engine);
        ConcurrentGame {
            inner: Mutex::new(Inner {
                engine,
                current,
                history: Vec::new(),
                subscribers: Vec::new(),
                next_sub: 0,
            }),
            last_activity: AtomicU64::new(now_unix_secs()),
        }
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means another thread panicked mid-apply;
        // the state itself is still consistent enough to tear down with.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> GameState {
        self.locked().current.clone()
    }

    /// Independent deep copy of the engine, for the searcher.
    pub fn engine_copy(&self) -> Game {
        self.locked().engine.clone()
    }

    /// The plies applied so far, oldest first.
    pub fn history(&self) -> Vec<Ply> {
        self.locked().history.clone()
    }

    /// Unix seconds of the last successful apply (or creation).
    pub fn last_activity_secs(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    /// Attach a new subscriber. The current snapshot is not replayed; read
    /// [`ConcurrentGame::snapshot`] first if you need it. On a finished game
    /// the returned stream is already closed.
    pub fn subscribe(&self) -> (SubscriptionId, mpsc::Receiver<GameState>) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut inner = self.locked();
        let id = inner.next_sub;
        inner.next_sub += 1;
        if !inner.current.result.is_terminal() {
            inner.subscribers.push((id, tx));
        }
        (SubscriptionId(id), rx)
    }

    /// Remove one subscriber and close its stream. Idempotent.
    pub fn detach(&self, id: SubscriptionId) {
        self.locked().subscribers.retain(|(sid, _)| *sid != id.0);
    }

    /// Close every subscriber stream.
    pub fn detach_all(&self) {
        self.locked().subscribers.clear();
    }

    /// Apply the ply at `index` into the current legal plies.
    pub fn apply_indexed(
        &self,
        actor: Color,
        expected_version: u32,
        index: usize,
    ) -> Result<GameState, ApplyError> {
        self.apply(actor, expected_version, |inner| {
            inner
                .current
                .legal_plies
                .get(index)
                .cloned()
                .ok_or(ApplyError::OutOfRange { index })
        })
    }

    /// Apply a ply supplied directly (the machine driver's path). The ply
    /// must be legal in the current position.
    pub fn apply_given(
        &self,
        actor: Color,
        expected_version: u32,
        ply: &Ply,
    ) -> Result<GameState, ApplyError> {
        self.apply(actor, expected_version, |_| Ok(ply.clone()))
    }

    fn apply(
        &self,
        actor: Color,
        expected_version: u32,
        pick: impl FnOnce(&Inner) -> Result<Ply, ApplyError>,
    ) -> Result<GameState, ApplyError> {
        let mut inner = self.locked();

        if inner.current.result.is_terminal() {
            return Err(ApplyError::GameOver);
        }
        if actor != inner.current.to_play {
            return Err(ApplyError::NotYourTurn);
        }
        if expected_version != inner.current.version {
            return Err(ApplyError::StaleVersion {
                current: inner.current.version,
            });
        }

        let ply = pick(&inner)?;
        inner
            .engine
            .do_ply(&ply)
            .map_err(|_| ApplyError::EngineRejected)?;

        inner.history.push(ply);
        let version = inner.current.version + 1;
        inner.current = GameState::from_engine(version, &inner.engine);
        self.last_activity.store(now_unix_secs(), Ordering::Relaxed);

        let snapshot = inner.current.clone();
        inner.broadcast(&snapshot);
        if snapshot.result.is_terminal() {
            // Close every stream; buffered snapshots (the terminal one
            // included) are still drained by their receivers.
            inner.subscribers.clear();
        }
        Ok(snapshot)
    }
}

impl Inner {
    fn broadcast(&mut self, snapshot: &GameState) {
        self.subscribers.retain(|(_, tx)| {
            match tx.try_send(snapshot.clone()) {
                Ok(()) => true,
                // Full: the consumer stalled for a whole buffer's worth of
                // snapshots; treat it as disconnected.
                Err(mpsc::error::TrySendError::Full(_)) => false,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

pub(crate) fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
