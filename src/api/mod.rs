use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::routing::{delete, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{
    CourseAggregate, CourseParticipants, CourseStatus, NewCourseRequest, Page, PageParams,
};
use crate::services::sync_service;
use crate::services::{SyncReport, SyncService, SyncStatus};
use crate::state::AppState;

#[derive(Deserialize)]
struct CourseQuery {
    #[serde(default)]
    term: Option<String>,
    #[serde(default)]
    status: Option<CourseStatus>,
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    page_size: Option<i64>,
}

#[derive(Deserialize)]
struct TermQuery {
    #[serde(default)]
    term: Option<String>,
}

#[derive(Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub term: Option<String>,
}

/// `Query` that reports malformed parameters through the JSON error
/// envelope instead of axum's plain-text rejection.
struct AppQuery<T>(T);

impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
        }
    }
}

/// `Json` body with the same envelope treatment.
struct AppJson<T>(T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/{id}", delete(delete_course))
        .route("/courses/{id}/participants", get(course_participants))
        .route("/sync", post(sync_now))
        .route("/sync/status", get(sync_status))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_courses(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<CourseQuery>,
) -> Result<Json<Page<CourseAggregate>>, AppError> {
    let term = params.term.as_deref().map(str::trim).unwrap_or("");
    if term.is_empty() {
        return Err(AppError::MissingParam("term"));
    }

    let page = PageParams {
        page: params.page,
        page_size: params.page_size,
    };
    let courses = repository::fetch_courses_for_term(&state.db, term, params.status, page).await?;
    Ok(Json(courses))
}

async fn create_course(
    State(state): State<AppState>,
    AppJson(req): AppJson<NewCourseRequest>,
) -> Result<Json<CourseAggregate>, AppError> {
    let req = req.normalized();
    if req.term.is_empty() {
        return Err(AppError::MissingParam("term"));
    }

    // Slot uniqueness is enforced by the schema; a duplicate surfaces here.
    match repository::insert_course(&state.db, req).await {
        Ok(course) => Ok(Json(course)),
        Err(e) if repository::is_unique_violation(&e) => Err(AppError::Conflict(
            "course already staged for this slot".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseAggregate>, AppError> {
    let course = repository::mark_course_deleted(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn course_participants(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseParticipants>, AppError> {
    let course = repository::find_course_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    let rows = repository::participants_for_course(&state.db, &course.id).await?;
    Ok(Json(CourseParticipants::split(course.id, rows)))
}

async fn sync_now(
    State(state): State<AppState>,
    AppJson(req): AppJson<SyncRequest>,
) -> Result<Json<SyncReport>, AppError> {
    let service = SyncService::new(state.db.clone(), state.calendar.clone());
    let report = service.sync_term(req.term.as_deref().unwrap_or("")).await?;
    Ok(Json(report))
}

async fn sync_status(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<TermQuery>,
) -> Result<Json<SyncStatus>, AppError> {
    let status =
        sync_service::sync_status(&state.db, params.term.as_deref().unwrap_or("")).await?;
    Ok(Json(status))
}
