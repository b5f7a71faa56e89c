use std::env;

/// Process-level settings. Calendar API credentials live in
/// [`crate::calendar::CalendarConfig`] and are only required when the
/// HTTP client is selected.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub sync_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://coursecal.db".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        // Daily by default.
        let sync_interval_secs = env::var("SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        Self {
            database_url,
            port,
            sync_interval_secs,
        }
    }
}
