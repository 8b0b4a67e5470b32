use crate::core::config::Config;
use crate::store::MarketStore;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: MarketStore,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            store: MarketStore::new(),
            config,
        }
    }
}
