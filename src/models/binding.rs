use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Association between a course and its remote calendar resource.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CalendarBinding {
    pub course_id: String,
    pub term: String,
    pub calendar_id: String,
    pub created_at: String,
}
