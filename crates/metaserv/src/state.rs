//! Application state shared by the health endpoints.

use crate::config::AppConfig;
use crate::db::MetaStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Catalog store handle
    pub store: Arc<dyn MetaStore>,

    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn MetaStore>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    #[test]
    fn test_uptime_starts_at_zero() {
        let state = AppState::new(Arc::new(MemoryStore::default()), AppConfig::default());
        assert_eq!(state.uptime_seconds(), 0);
        assert_eq!(state.config.port, 5000);
    }
}
