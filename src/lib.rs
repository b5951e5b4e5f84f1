//! A real-time multi-game checkers server.
//!
//! Clients hold a WebSocket to the server and exchange `{"type", "data"}`
//! envelopes: create or join a game, submit plies, receive authoritative
//! state snapshots. Games run either human-vs-human (token-authenticated
//! roles) or human-vs-machine (a time-limited minimax opponent). Idle games
//! are swept from their registry, persisted, and announced to webhooks.

pub mod cli;
pub mod config;
pub mod engine;
pub mod protocol;
pub mod search;
pub mod server;
pub mod store;
pub mod webhooks;
