//! Shared application state handed to every handler.
//!
//! The hubs are built once here, at the composition root, and passed around
//! by cloning the state; nothing reads globals.

use std::sync::Arc;

use crate::config::Config;
use crate::store::Store;

use super::hub::{HumanHub, MachineHub};

#[derive(Clone)]
pub struct AppState {
    pub human_hub: Arc<HumanHub>,
    pub machine_hub: Arc<MachineHub>,
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> AppState {
        let timeout = config.inactivity_timeout();
        AppState {
            human_hub: Arc::new(HumanHub::new(timeout, store.clone())),
            machine_hub: Arc::new(MachineHub::new(timeout, store.clone())),
            store,
            config: Arc::new(config),
        }
    }
}
