//! The concurrent game runtime: per-game state, registries, sessions.

pub mod concurrent;
pub mod driver;
pub mod games;
pub mod hub;
pub mod http;
pub mod presence;
pub mod run;
pub mod session;
pub mod state;
pub mod ws;

pub use run::{build_router, run_server};
pub use state::AppState;
