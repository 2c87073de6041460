use std::sync::Arc;

use crate::config::ServerConfig;
use crate::timetable::TimetableSettings;

/// State shared by every request handler.
pub struct AppState {
    /// Upload limits and CORS origin.
    pub server: ServerConfig,
    /// Period table and calendar zone, shared with blocking import tasks.
    pub settings: Arc<TimetableSettings>,
}

impl AppState {
    pub fn new(server: ServerConfig, settings: TimetableSettings) -> Self {
        Self {
            server,
            settings: Arc::new(settings),
        }
    }
}
