use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Server configuration persisted as TOML.
///
/// Fields:
/// - listen_addr: socket address the server binds to
/// - inactivity_timeout_secs: idle time before a game is retired
/// - handshake_timeout_secs: time a connection gets to join a game
/// - storage_dir: directory for game histories and the webhook set
/// - max_search_ms: upper bound on a machine opponent's per-move budget
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub inactivity_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    pub storage_dir: String,
    pub max_search_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "127.0.0.1:3000".into(),
            inactivity_timeout_secs: 600,
            handshake_timeout_secs: 60,
            storage_dir: "./checkers-data".into(),
            max_search_ms: 5_000,
        }
    }
}

impl Config {
    /// Load configuration from `path`. If the file does not exist, create it
    /// with defaults and return those.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file '{}'", path.display()))?;
            let cfg: Config = toml::from_str(&text)
                .with_context(|| format!("parsing TOML config '{}'", path.display()))?;
            Ok(cfg)
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("creating config directory '{}'", parent.display())
                    })?;
                }
            }
            let cfg = Config::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Write the current config back to `path` (overwrites).
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("serializing config to TOML")?;
        std::fs::write(path, text)
            .with_context(|| format!("writing config to '{}'", path.display()))
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}
