use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

pub const STATUS_PROCESSED: i64 = 1;
pub const STATUS_DELETED: i64 = 2;

/// Staging marker on a course aggregate. Stored as a nullable integer
/// column: NULL = pending, 1 = processed, 2 = deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Pending,
    Processed,
    Deleted,
}

impl CourseStatus {
    pub fn code(self) -> Option<i64> {
        match self {
            CourseStatus::Pending => None,
            CourseStatus::Processed => Some(STATUS_PROCESSED),
            CourseStatus::Deleted => Some(STATUS_DELETED),
        }
    }

    /// Reads tolerate unknown non-deleted codes as processed; writes only
    /// ever emit 1 or 2.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            None => CourseStatus::Pending,
            Some(STATUS_DELETED) => CourseStatus::Deleted,
            Some(_) => CourseStatus::Processed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseAggregate {
    pub id: String,
    pub course_code: String,
    pub course_name: String,
    pub section_id: String,
    pub term: String,
    pub teach_date: String,
    pub begin_time: String,
    pub end_time: String,
    pub status: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub last_synced_at: Option<String>,
}

impl CourseAggregate {
    pub fn status(&self) -> CourseStatus {
        CourseStatus::from_code(self.status)
    }

    /// `"2026-03-02 08:00~09:40"`, used in calendar summaries and logs.
    pub fn display_time(&self) -> String {
        format!("{} {}~{}", self.teach_date, self.begin_time, self.end_time)
    }

    /// RFC3339 start/end pair for the remote calendar event body.
    pub fn event_window(&self) -> Result<(String, String), AppError> {
        let date = NaiveDate::parse_from_str(&self.teach_date, "%Y-%m-%d").map_err(|e| {
            AppError::BadRequest(format!("invalid teach_date '{}': {}", self.teach_date, e))
        })?;
        let begin = NaiveTime::parse_from_str(&self.begin_time, "%H:%M").map_err(|e| {
            AppError::BadRequest(format!("invalid begin_time '{}': {}", self.begin_time, e))
        })?;
        let end = NaiveTime::parse_from_str(&self.end_time, "%H:%M").map_err(|e| {
            AppError::BadRequest(format!("invalid end_time '{}': {}", self.end_time, e))
        })?;

        let start = Utc.from_utc_datetime(&date.and_time(begin));
        let finish = Utc.from_utc_datetime(&date.and_time(end));
        Ok((start.to_rfc3339(), finish.to_rfc3339()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub course_code: String,
    pub course_name: String,
    pub section_id: String,
    pub term: String,
    pub teach_date: String,
    pub begin_time: String,
    pub end_time: String,
}

impl NewCourseRequest {
    /// Strips stray whitespace from every field, so a padded term can't
    /// stage a course invisible to trimmed lookups.
    pub fn normalized(self) -> Self {
        let trim = |s: String| s.trim().to_string();
        Self {
            course_code: trim(self.course_code),
            course_name: trim(self.course_name),
            section_id: trim(self.section_id),
            term: trim(self.term),
            teach_date: trim(self.teach_date),
            begin_time: trim(self.begin_time),
            end_time: trim(self.end_time),
        }
    }
}

/// Academic term (xnxq) covering the given date, e.g. `2025-2026-1`.
/// The first semester runs August through January, the second February
/// through July.
pub fn term_for_date(date: NaiveDate) -> String {
    let (start_year, semester) = match date.month() {
        8..=12 => (date.year(), 1),
        1 => (date.year() - 1, 1),
        _ => (date.year() - 1, 2),
    };
    format!("{}-{}-{}", start_year, start_year + 1, semester)
}
