use std::sync::Arc;

use sqlx::SqlitePool;

use crate::calendar::CalendarClient;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub calendar: Arc<dyn CalendarClient>,
}
