use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::calendar::{CalendarClient, dto::CreateCalendarRequest};
use crate::db::repository;
use crate::error::AppError;
use crate::models::{CourseAggregate, CourseStatus};

pub struct SyncService {
    db: SqlitePool,
    calendar: Arc<dyn CalendarClient>,
}

/// Outcome of one term batch. Never persisted; the trigger response and
/// the scheduler log are its only consumers.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub term: String,
    pub courses_seen: usize,
    pub courses_synced: usize,
    pub courses_failed: usize,
    pub attendees_added: usize,
    pub attendees_removed: usize,
    pub calendars_created: usize,
    pub calendars_removed: usize,
    pub success: bool,
    pub errors: Vec<CourseSyncError>,
}

#[derive(Debug, Serialize)]
pub struct CourseSyncError {
    pub course_id: String,
    pub message: String,
}

struct CourseOutcome {
    added: usize,
    removed: usize,
    created_calendar: bool,
}

impl SyncService {
    pub fn new(db: SqlitePool, calendar: Arc<dyn CalendarClient>) -> Self {
        Self { db, calendar }
    }

    /// Runs the batch for one term: reconcile every pending course against
    /// the remote calendar, then clean up what was soft-deleted. A single
    /// course failing is logged and recorded, and the batch moves on.
    pub async fn sync_term(&self, term: &str) -> Result<SyncReport, AppError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::MissingParam("term"));
        }

        info!("Starting sync for term {}", term);
        let mut report = SyncReport {
            term: term.to_string(),
            courses_seen: 0,
            courses_synced: 0,
            courses_failed: 0,
            attendees_added: 0,
            attendees_removed: 0,
            calendars_created: 0,
            calendars_removed: 0,
            success: true,
            errors: Vec::new(),
        };

        info!("Step 1: Syncing pending courses");
        let pending =
            repository::fetch_courses_by_status(&self.db, term, CourseStatus::Pending).await?;
        report.courses_seen = pending.len();

        for course in pending {
            match self.sync_course(&course).await {
                Ok(outcome) => {
                    report.courses_synced += 1;
                    report.attendees_added += outcome.added;
                    report.attendees_removed += outcome.removed;
                    if outcome.created_calendar {
                        report.calendars_created += 1;
                    }
                }
                Err(e) => {
                    warn!("Sync failed for course {} ({}): {}", course.course_name, course.id, e);
                    report.courses_failed += 1;
                    report.errors.push(CourseSyncError {
                        course_id: course.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!("Step 2: Cleaning up deleted courses");
        let deleted =
            repository::fetch_courses_by_status(&self.db, term, CourseStatus::Deleted).await?;
        for course in deleted {
            match self.cleanup_course(&course).await {
                Ok(removed) => {
                    if removed {
                        report.calendars_removed += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        "Cleanup failed for course {} ({}): {}",
                        course.course_name, course.id, e
                    );
                    report.errors.push(CourseSyncError {
                        course_id: course.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report.success = report.errors.is_empty();
        info!(
            "Sync completed for term {}: {}/{} courses synced, {} attendees added, {} removed, {} errors",
            term,
            report.courses_synced,
            report.courses_seen,
            report.attendees_added,
            report.attendees_removed,
            report.errors.len()
        );
        Ok(report)
    }

    /// Reconciles one course: resolve or create its calendar binding, then
    /// bring the remote attendee set in line with the local participant set.
    async fn sync_course(&self, course: &CourseAggregate) -> Result<CourseOutcome, AppError> {
        let (calendar_id, created_calendar) =
            match repository::find_binding(&self.db, &course.id).await? {
                Some(binding) => (binding.calendar_id, false),
                None => {
                    let (start_time, end_time) = course.event_window()?;
                    let req = CreateCalendarRequest {
                        summary: format!("{} {}", course.course_name, course.display_time()),
                        description: Some(format!(
                            "{} / {} / {}",
                            course.course_code, course.section_id, course.term
                        )),
                        start_time,
                        end_time,
                    };
                    let calendar_id = self.calendar.create_calendar(req).await?;
                    repository::insert_binding(&self.db, &course.id, &course.term, &calendar_id)
                        .await?;
                    (calendar_id, true)
                }
            };

        let desired: HashSet<String> =
            repository::participants_for_course(&self.db, &course.id)
                .await?
                .into_iter()
                .map(|p| p.user_id)
                .collect();
        let current: HashSet<String> = self
            .calendar
            .list_attendees(&calendar_id)
            .await?
            .into_iter()
            .collect();

        let to_add: Vec<String> = desired.difference(&current).cloned().collect();
        let to_remove: Vec<String> = current.difference(&desired).cloned().collect();

        if !to_add.is_empty() {
            self.calendar.add_attendees(&calendar_id, &to_add).await?;
        }
        if !to_remove.is_empty() {
            self.calendar.remove_attendees(&calendar_id, &to_remove).await?;
        }

        if !repository::mark_course_processed(&self.db, &course.id).await? {
            warn!("Course {} was deleted while it was being synced", course.id);
        }

        Ok(CourseOutcome {
            added: to_add.len(),
            removed: to_remove.len(),
            created_calendar,
        })
    }

    /// Downstream cleanup for a soft-deleted course: drop the remote
    /// calendar and the binding. The course row stays at its terminal
    /// status, so a later run finds nothing left to do.
    async fn cleanup_course(&self, course: &CourseAggregate) -> Result<bool, AppError> {
        let binding = match repository::find_binding(&self.db, &course.id).await? {
            Some(b) => b,
            None => return Ok(false),
        };

        self.calendar.delete_calendar(&binding.calendar_id).await?;
        repository::delete_binding(&self.db, &course.id).await?;
        Ok(true)
    }
}

/// Sync-status bookkeeping for a term, computed from the staging rows.
#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub term: String,
    pub pending: i64,
    pub processed: i64,
    pub deleted: i64,
    pub total: i64,
    pub last_synced_at: Option<String>,
}

pub async fn sync_status(db: &SqlitePool, term: &str) -> Result<SyncStatus, AppError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(AppError::MissingParam("term"));
    }

    let (pending, processed, deleted, last_synced_at) =
        repository::term_status_counts(db, term).await?;

    Ok(SyncStatus {
        term: term.to_string(),
        pending,
        processed,
        deleted,
        total: pending + processed + deleted,
        last_synced_at,
    })
}
