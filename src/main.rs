//! Entry point: parse the CLI, load config, wire the composition root.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use checkers_server::cli::ServerCli;
use checkers_server::config::Config;
use checkers_server::server::{run_server, AppState};
use checkers_server::store::FsStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut cfg = Config::load_or_create(&cli.config)
        .with_context(|| format!("loading or creating config '{}'", cli.config.display()))?;

    // Apply CLI overrides in-memory; persist only if asked.
    if let Some(listen) = cli.listen.clone() {
        cfg.listen_addr = listen;
    }
    if let Some(storage) = cli.storage.clone() {
        cfg.storage_dir = storage.display().to_string();
    }
    if cli.persist {
        cfg.save(&cli.config)
            .with_context(|| format!("saving updated config '{}'", cli.config.display()))?;
    }

    let addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address '{}'", cfg.listen_addr))?;

    let store = Arc::new(
        FsStore::open(&cfg.storage_dir)
            .with_context(|| format!("opening storage at '{}'", cfg.storage_dir))?,
    );

    tracing::info!(
        config = %cli.config.display(),
        storage = %cfg.storage_dir,
        "starting checkers server"
    );

    let state = AppState::new(cfg, store);
    run_server(addr, state).await
}
