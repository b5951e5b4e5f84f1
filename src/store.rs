//! Durable storage for finished games and the webhook URL set.
//!
//! Writes are best-effort: callers log failures and move on, game traffic
//! never waits on storage. The filesystem layout is one JSON file per game
//! under `<root>/<mode>/<id>.json` plus `<root>/webhooks.json`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex as StdMutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::Ply;

/// Which registry a game belonged to; part of storage keys and webhook
/// payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Human,
    Machine,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Human => "human",
            Mode::Machine => "machine",
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Mode> {
        match s {
            "human" => Ok(Mode::Human),
            "machine" => Ok(Mode::Machine),
            other => Err(anyhow::anyhow!("invalid game mode {other:?}")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn save_history(&self, mode: Mode, id: Uuid, plies: &[Ply]) -> Result<()>;
    async fn load_history(&self, mode: Mode, id: Uuid) -> Result<Option<Vec<Ply>>>;
    async fn game_ids(&self, mode: Mode) -> Result<Vec<Uuid>>;
    async fn add_webhook(&self, url: &str) -> Result<Vec<String>>;
    async fn remove_webhook(&self, url: &str) -> Result<Vec<String>>;
    async fn webhooks(&self) -> Result<Vec<String>>;
}

/// JSON-files-on-disk store.
pub struct FsStore {
    root: PathBuf,
    // Serializes read-modify-write cycles on webhooks.json.
    webhook_lock: Mutex<()>,
}

impl FsStore {
    /// Open (and lay out) the storage directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<FsStore> {
        let root = root.into();
        for mode in [Mode::Human, Mode::Machine] {
            let dir = root.join(mode.as_str());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating storage directory '{}'", dir.display()))?;
        }
        Ok(FsStore {
            root,
            webhook_lock: Mutex::new(()),
        })
    }

    fn history_path(&self, mode: Mode, id: Uuid) -> PathBuf {
        self.root.join(mode.as_str()).join(format!("{id}.json"))
    }

    fn webhooks_path(&self) -> PathBuf {
        self.root.join("webhooks.json")
    }

    async fn read_webhooks(&self) -> Result<Vec<String>> {
        let path = self.webhooks_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing '{}'", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("reading '{}'", path.display())),
        }
    }

    async fn write_webhooks(&self, urls: &[String]) -> Result<()> {
        let path = self.webhooks_path();
        let bytes = serde_json::to_vec_pretty(urls)?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing '{}'", path.display()))
    }
}

#[async_trait]
impl Store for FsStore {
    async fn save_history(&self, mode: Mode, id: Uuid, plies: &[Ply]) -> Result<()> {
        let path = self.history_path(mode, id);
        let bytes = serde_json::to_vec(plies)?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing '{}'", path.display()))
    }

    async fn load_history(&self, mode: Mode, id: Uuid) -> Result<Option<Vec<Ply>>> {
        let path = self.history_path(mode, id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let plies = serde_json::from_slice(&bytes)
                    .with_context(|| format!("parsing '{}'", path.display()))?;
                Ok(Some(plies))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading '{}'", path.display())),
        }
    }

    async fn game_ids(&self, mode: Mode) -> Result<Vec<Uuid>> {
        let dir = self.root.join(mode.as_str());
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("listing '{}'", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Ok(id) = Uuid::parse_str(stem) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn add_webhook(&self, url: &str) -> Result<Vec<String>> {
        let _guard = self.webhook_lock.lock().await;
        let mut urls = self.read_webhooks().await?;
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
            self.write_webhooks(&urls).await?;
        }
        Ok(urls)
    }

    async fn remove_webhook(&self, url: &str) -> Result<Vec<String>> {
        let _guard = self.webhook_lock.lock().await;
        let mut urls = self.read_webhooks().await?;
        if let Some(idx) = urls.iter().position(|u| u == url) {
            urls.remove(idx);
            self.write_webhooks(&urls).await?;
        }
        Ok(urls)
    }

    async fn webhooks(&self) -> Result<Vec<String>> {
        let _guard = self.webhook_lock.lock().await;
        self.read_webhooks().await
    }
}

/// In-memory store used by tests.
#[derive(Default)]
pub struct MemStore {
    inner: StdMutex<MemInner>,
}

#[derive(Default)]
struct MemInner {
    histories: HashMap<(Mode, Uuid), Vec<Ply>>,
    webhooks: Vec<String>,
}

impl MemStore {
    pub fn new() -> MemStore {
        MemStore::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn save_history(&self, mode: Mode, id: Uuid, plies: &[Ply]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.histories.insert((mode, id), plies.to_vec());
        Ok(())
    }

    async fn load_history(&self, mode: Mode, id: Uuid) -> Result<Option<Vec<Ply>>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.histories.get(&(mode, id)).cloned())
    }

    async fn game_ids(&self, mode: Mode) -> Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<Uuid> = inner
            .histories
            .keys()
            .filter(|(m, _)| *m == mode)
            .map(|(_, id)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn add_webhook(&self, url: &str) -> Result<Vec<String>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !inner.webhooks.iter().any(|u| u == url) {
            inner.webhooks.push(url.to_string());
        }
        Ok(inner.webhooks.clone())
    }

    async fn remove_webhook(&self, url: &str) -> Result<Vec<String>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.webhooks.retain(|u| u != url);
        Ok(inner.webhooks.clone())
    }

    async fn webhooks(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.webhooks.clone())
    }
}
