use std::sync::Arc;

use crate::config::Config;
use crate::ws::{BroadcastRouter, SessionRegistry, SyncCoordinator};

/// Process-wide services, created once at startup and handed to every
/// connection and route through axum state.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub router: BroadcastRouter,
    pub sync: SyncCoordinator,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let router = BroadcastRouter::new(registry.clone());
        let sync = SyncCoordinator::new(registry.clone(), router.clone(), config.sync_timeout());
        Arc::new(Self {
            config,
            registry,
            router,
            sync,
        })
    }
}
