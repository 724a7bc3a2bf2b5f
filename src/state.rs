use crate::broadcast::BroadcastHub;
use crate::store::Store;

/// Shared application state. Built once in main and handed to the router
/// behind an Arc; the broadcast hub lives here so every component that
/// dispatches gets the same injected handle.
pub struct AppState {
    pub store: Store,
    pub hub: BroadcastHub,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            hub: BroadcastHub::new(),
        }
    }
}
