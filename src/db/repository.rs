use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::course::{STATUS_DELETED, STATUS_PROCESSED};
use crate::models::{
    CalendarBinding, CourseAggregate, CourseStatus, NewCourseRequest, Page, PageParams,
    Participant, Role,
};

const COURSE_COLUMNS: &str = "id, course_code, course_name, section_id, term, teach_date, \
     begin_time, end_time, status, created_at, updated_at, last_synced_at";

/// Term-scoped lookup with optional status filter, paginated.
/// Term presence is validated by the caller.
pub async fn fetch_courses_for_term(
    db: &SqlitePool,
    term: &str,
    status: Option<CourseStatus>,
    page: PageParams,
) -> Result<Page<CourseAggregate>, sqlx::Error> {
    let filter = match status {
        None => "",
        Some(CourseStatus::Pending) => " AND status IS NULL",
        Some(CourseStatus::Processed) => " AND status = 1",
        Some(CourseStatus::Deleted) => " AND status = 2",
    };

    let count_sql = format!(
        "SELECT COUNT(*) FROM course_aggregates WHERE term = ?{}",
        filter
    );
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(term)
        .fetch_one(db)
        .await?;

    let rows_sql = format!(
        "SELECT {} FROM course_aggregates WHERE term = ?{} \
         ORDER BY teach_date, begin_time, id LIMIT ? OFFSET ?",
        COURSE_COLUMNS, filter
    );
    let items = sqlx::query_as::<_, CourseAggregate>(&rows_sql)
        .bind(term)
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(db)
        .await?;

    Ok(Page {
        items,
        total,
        page: page.page(),
        page_size: page.page_size(),
    })
}

/// Unpaged variant used by the sync batch.
pub async fn fetch_courses_by_status(
    db: &SqlitePool,
    term: &str,
    status: CourseStatus,
) -> Result<Vec<CourseAggregate>, sqlx::Error> {
    match status.code() {
        None => {
            let sql = format!(
                "SELECT {} FROM course_aggregates WHERE term = ? AND status IS NULL \
                 ORDER BY teach_date, begin_time, id",
                COURSE_COLUMNS
            );
            sqlx::query_as::<_, CourseAggregate>(&sql)
                .bind(term)
                .fetch_all(db)
                .await
        }
        Some(code) => {
            let sql = format!(
                "SELECT {} FROM course_aggregates WHERE term = ? AND status = ? \
                 ORDER BY teach_date, begin_time, id",
                COURSE_COLUMNS
            );
            sqlx::query_as::<_, CourseAggregate>(&sql)
                .bind(term)
                .bind(code)
                .fetch_all(db)
                .await
        }
    }
}

pub async fn find_course_by_id(
    db: &SqlitePool,
    id: &str,
) -> Result<Option<CourseAggregate>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM course_aggregates WHERE id = ?",
        COURSE_COLUMNS
    );
    sqlx::query_as::<_, CourseAggregate>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// A course occupies a unique (section, term, date, begin) slot in staging;
/// the schema enforces it. True when `err` is that constraint firing.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

pub async fn insert_course(
    db: &SqlitePool,
    req: NewCourseRequest,
) -> Result<CourseAggregate, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO course_aggregates \
         (id, course_code, course_name, section_id, term, teach_date, begin_time, end_time, \
          status, created_at, updated_at, last_synced_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, NULL)",
    )
    .bind(&id)
    .bind(&req.course_code)
    .bind(&req.course_name)
    .bind(&req.section_id)
    .bind(&req.term)
    .bind(&req.teach_date)
    .bind(&req.begin_time)
    .bind(&req.end_time)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(CourseAggregate {
        id,
        course_code: req.course_code,
        course_name: req.course_name,
        section_id: req.section_id,
        term: req.term,
        teach_date: req.teach_date,
        begin_time: req.begin_time,
        end_time: req.end_time,
        status: None,
        created_at: now.clone(),
        updated_at: now,
        last_synced_at: None,
    })
}

/// Soft delete: stamps the terminal status code and returns the record
/// for downstream cleanup. Idempotent.
pub async fn mark_course_deleted(
    db: &SqlitePool,
    id: &str,
) -> Result<Option<CourseAggregate>, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let affected = sqlx::query(
        "UPDATE course_aggregates SET status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(STATUS_DELETED)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }
    find_course_by_id(db, id).await
}

/// Flips a pending course to processed and stamps `last_synced_at`.
/// Refuses to resurrect a deleted row; returns false when nothing matched.
pub async fn mark_course_processed(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let affected = sqlx::query(
        "UPDATE course_aggregates \
         SET status = ?, updated_at = ?, last_synced_at = ? \
         WHERE id = ? AND (status IS NULL OR status = ?)",
    )
    .bind(STATUS_PROCESSED)
    .bind(&now)
    .bind(&now)
    .bind(id)
    .bind(STATUS_PROCESSED)
    .execute(db)
    .await?
    .rows_affected();

    Ok(affected > 0)
}

/// Counts per staging status plus the latest sync stamp for a term.
pub async fn term_status_counts(
    db: &SqlitePool,
    term: &str,
) -> Result<(i64, i64, i64, Option<String>), sqlx::Error> {
    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM course_aggregates WHERE term = ? AND status IS NULL",
    )
    .bind(term)
    .fetch_one(db)
    .await?;

    let processed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM course_aggregates WHERE term = ? AND status = ?",
    )
    .bind(term)
    .bind(STATUS_PROCESSED)
    .fetch_one(db)
    .await?;

    let deleted: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM course_aggregates WHERE term = ? AND status = ?",
    )
    .bind(term)
    .bind(STATUS_DELETED)
    .fetch_one(db)
    .await?;

    let last_synced_at: Option<String> = sqlx::query_scalar(
        "SELECT MAX(last_synced_at) FROM course_aggregates WHERE term = ?",
    )
    .bind(term)
    .fetch_one(db)
    .await?;

    Ok((pending, processed, deleted, last_synced_at))
}

pub async fn upsert_user(db: &SqlitePool, user_id: &str, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (user_id, name) VALUES (?, ?) \
         ON CONFLICT(user_id) DO UPDATE SET name = excluded.name",
    )
    .bind(user_id)
    .bind(name)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn add_participant(
    db: &SqlitePool,
    course_id: &str,
    user_id: &str,
    role: Role,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO course_participants (course_id, user_id, role) VALUES (?, ?, ?) \
         ON CONFLICT(course_id, user_id) DO UPDATE SET role = excluded.role",
    )
    .bind(course_id)
    .bind(user_id)
    .bind(role.as_str())
    .execute(db)
    .await?;
    Ok(())
}

pub async fn participants_for_course(
    db: &SqlitePool,
    course_id: &str,
) -> Result<Vec<Participant>, sqlx::Error> {
    sqlx::query_as::<_, Participant>(
        "SELECT u.user_id, u.name, cp.role \
         FROM course_participants cp \
         JOIN users u ON u.user_id = cp.user_id \
         WHERE cp.course_id = ? \
         ORDER BY cp.role DESC, u.user_id",
    )
    .bind(course_id)
    .fetch_all(db)
    .await
}

pub async fn find_binding(
    db: &SqlitePool,
    course_id: &str,
) -> Result<Option<CalendarBinding>, sqlx::Error> {
    sqlx::query_as::<_, CalendarBinding>(
        "SELECT course_id, term, calendar_id, created_at \
         FROM calendar_bindings WHERE course_id = ?",
    )
    .bind(course_id)
    .fetch_optional(db)
    .await
}

pub async fn insert_binding(
    db: &SqlitePool,
    course_id: &str,
    term: &str,
    calendar_id: &str,
) -> Result<CalendarBinding, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO calendar_bindings (course_id, term, calendar_id, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(course_id)
    .bind(term)
    .bind(calendar_id)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(CalendarBinding {
        course_id: course_id.to_string(),
        term: term.to_string(),
        calendar_id: calendar_id.to_string(),
        created_at: now,
    })
}

pub async fn delete_binding(db: &SqlitePool, course_id: &str) -> Result<bool, sqlx::Error> {
    let affected = sqlx::query("DELETE FROM calendar_bindings WHERE course_id = ?")
        .bind(course_id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(affected > 0)
}
