use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

/// A portal user attached to a course. Read-only for the sync glue;
/// rows come from the upstream ingestion source.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub user_id: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseParticipants {
    pub course_id: String,
    pub teachers: Vec<Participant>,
    pub students: Vec<Participant>,
}

impl CourseParticipants {
    pub fn split(course_id: String, rows: Vec<Participant>) -> Self {
        let (teachers, students): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .partition(|p| p.role == Role::Teacher.as_str());
        Self {
            course_id,
            teachers,
            students,
        }
    }
}
