use crate::config::AppConfig;
use crate::query::executor::QueryEngine;

/// Shared application state for the web server.
///
/// Deliberately small: the engine holds only configuration, and every
/// request opens its own database session, so there is no shared mutable
/// state between requests.
pub struct AppState {
    pub config: AppConfig,
    pub engine: QueryEngine,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let engine = QueryEngine::new(config.database.clone());
        Self {
            config,
            engine,
            startup_time: chrono::Utc::now(),
        }
    }
}
