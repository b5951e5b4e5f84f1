use clap::Parser;
use std::path::PathBuf;

/// Command line for the checkers server.
#[derive(Parser, Debug, Clone)]
#[command(name = "checkers-server", version, about = "Real-time checkers server")]
pub struct ServerCli {
    /// Path to config file
    #[arg(long, default_value = "checkers-server.toml")]
    pub config: PathBuf,

    /// Listen address (overrides config.listen_addr)
    #[arg(long)]
    pub listen: Option<String>,

    /// Storage directory (overrides config.storage_dir)
    #[arg(long)]
    pub storage: Option<PathBuf>,

    /// Persist CLI overrides back to the config file
    #[arg(long, default_value_t = false)]
    pub persist: bool,

    /// Enable verbose debug logging
    #[arg(long, short, default_value_t = false)]
    pub debug: bool,
}
