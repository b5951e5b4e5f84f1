//! Presence tracking for one game role.
//!
//! Counts attached sessions and broadcasts only the online/offline
//! transitions, never intermediate count changes.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::concurrent::SubscriptionId;

const PRESENCE_BUFFER: usize = 8;

struct Inner {
    count: u32,
    subscribers: Vec<(u64, mpsc::Sender<bool>)>,
    next_sub: u64,
}

#[derive(Default)]
pub struct PresenceCounter {
    inner: Mutex<Inner>,
}

impl Default for Inner {
    fn default() -> Self {
        Inner {
            count: 0,
            subscribers: Vec::new(),
            next_sub: 0,
        }
    }
}

impl PresenceCounter {
    pub fn new() -> PresenceCounter {
        PresenceCounter::default()
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One more session holds this role. Broadcasts `true` on 0 -> 1.
    pub fn enter(&self) {
        let mut inner = self.locked();
        inner.count += 1;
        if inner.count == 1 {
            inner.broadcast(true);
        }
    }

    /// One session released this role. Broadcasts `false` on 1 -> 0; never
    /// goes below zero.
    pub fn exit(&self) {
        let mut inner = self.locked();
        if inner.count == 0 {
            return;
        }
        inner.count -= 1;
        if inner.count == 0 {
            inner.broadcast(false);
        }
    }

    pub fn is_online(&self) -> bool {
        self.locked().count > 0
    }

    /// Subscribe to future transitions. There is no replay of the current
    /// status; read [`PresenceCounter::is_online`] separately.
    pub fn subscribe(&self) -> (SubscriptionId, mpsc::Receiver<bool>) {
        let (tx, rx) = mpsc::channel(PRESENCE_BUFFER);
        let mut inner = self.locked();
        let id = inner.next_sub;
        inner.next_sub += 1;
        inner.subscribers.push((id, tx));
        (SubscriptionId::from_raw(id), rx)
    }

    pub fn detach(&self, id: SubscriptionId) {
        self.locked()
            .subscribers
            .retain(|(sid, _)| *sid != id.raw());
    }

    pub fn detach_all(&self) {
        self.locked().subscribers.clear();
    }
}

impl Inner {
    fn broadcast(&mut self, online: bool) {
        self.subscribers
            .retain(|(_, tx)| tx.try_send(online).is_ok());
    }
}
