use std::sync::Arc;

use configs::StoreConfig;
use service::EntryStoreUpdater;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub store_config: Arc<StoreConfig>,
    pub updater: Arc<EntryStoreUpdater>,
}

impl AppState {
    pub fn new(store_config: StoreConfig, updater: EntryStoreUpdater) -> Self {
        Self { store_config: Arc::new(store_config), updater: Arc::new(updater) }
    }
}
