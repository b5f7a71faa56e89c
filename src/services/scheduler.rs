use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::info;

use crate::calendar::CalendarClient;
use crate::models::term_for_date;
use crate::services::sync_service::{SyncReport, SyncService};

/// Background sync loop. Once per interval (daily by default) it derives
/// the term covering the current date and runs the sync batch for it.
pub struct SyncScheduler {
    db: SqlitePool,
    calendar: Arc<dyn CalendarClient>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(db: SqlitePool, calendar: Arc<dyn CalendarClient>, interval_secs: u64) -> Self {
        Self {
            db,
            calendar,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub async fn start(self) {
        info!("Starting sync scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.run_sync().await {
                Ok(report) => {
                    info!(
                        "Scheduled sync for {} done: {}/{} courses synced, {} attendees added, {} removed",
                        report.term,
                        report.courses_synced,
                        report.courses_seen,
                        report.attendees_added,
                        report.attendees_removed
                    );
                }
                Err(e) => {
                    // The loop keeps running; the next tick retries the term.
                    tracing::warn!("Scheduled sync failed: {:?}", e);
                }
            }
        }
    }

    async fn run_sync(&self) -> Result<SyncReport, crate::error::AppError> {
        let term = term_for_date(chrono::Utc::now().date_naive());
        let service = SyncService::new(self.db.clone(), self.calendar.clone());
        service.sync_term(&term).await
    }
}
