use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use coursecal::api::router;
use coursecal::calendar::NoopCalendarClient;
use coursecal::db::repository;
use coursecal::models::Role;
use coursecal::state::AppState;

async fn test_app() -> (Router, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let state = AppState {
        db: pool.clone(),
        calendar: Arc::new(NoopCalendarClient),
    };
    (router(state), pool)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not valid JSON")
}

fn course_body(name: &str, section: &str, term: &str, begin: &str) -> Value {
    json!({
        "course_code": format!("C-{}", section),
        "course_name": name,
        "section_id": section,
        "term": term,
        "teach_date": "2025-09-08",
        "begin_time": begin,
        "end_time": "09:40",
    })
}

#[tokio::test]
async fn test_health() {
    let (app, _pool) = test_app().await;
    let response = app.oneshot(get("/health")).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_courses_requires_term() {
    let (app, _pool) = test_app().await;

    for uri in ["/courses", "/courses?term=", "/courses?term=%20%20"] {
        let response = app.clone().oneshot(get(uri)).await.expect("request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {}", uri);

        let body = body_json(response).await;
        assert_eq!(body["message"], "missing required parameter: term");
        assert!(body["error"].as_str().expect("error string").contains("400"));
    }
}

#[tokio::test]
async fn test_malformed_query_gets_error_envelope() {
    let (app, _pool) = test_app().await;

    for uri in [
        "/courses?term=2025-2026-1&page=abc",
        "/courses?term=2025-2026-1&status=bogus",
    ] {
        let response = app.clone().oneshot(get(uri)).await.expect("request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {}", uri);

        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("error string").contains("400"));
        assert!(!body["message"].as_str().expect("message string").is_empty());
    }
}

#[tokio::test]
async fn test_create_and_list_courses() {
    let (app, _pool) = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/courses",
            course_body("高等数学A", "MATH-01", "2025-2026-1", "08:00"),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let created = body_json(response).await;
    assert!(created["id"].as_str().is_some());
    assert_eq!(created["course_name"], "高等数学A");
    assert!(created["status"].is_null());

    // Same slot again conflicts.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/courses",
            course_body("高等数学A", "MATH-01", "2025-2026-1", "08:00"),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(get("/courses?term=2025-2026-1"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_json(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["page"], 1);
    assert_eq!(page["page_size"], 20);
    assert_eq!(page["items"].as_array().expect("items").len(), 1);
    assert_eq!(page["items"][0]["course_name"], "高等数学A");

    // Another term sees nothing.
    let response = app
        .clone()
        .oneshot(get("/courses?term=2024-2025-2"))
        .await
        .expect("request");
    let page = body_json(response).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_create_course_trims_fields() {
    let (app, _pool) = test_app().await;

    let mut body = course_body("高等数学A", "MATH-01", "2025-2026-1", "08:00");
    body["term"] = json!("  2025-2026-1 ");
    body["course_name"] = json!(" 高等数学A ");
    let response = app
        .clone()
        .oneshot(json_request("POST", "/courses", body))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let created = body_json(response).await;
    assert_eq!(created["term"], "2025-2026-1");
    assert_eq!(created["course_name"], "高等数学A");

    // A padded term must not hide the course from trimmed lookups.
    let page = body_json(
        app.clone()
            .oneshot(get("/courses?term=2025-2026-1"))
            .await
            .expect("request"),
    )
    .await;
    assert_eq!(page["total"], 1);

    // Nor does padding dodge the slot conflict.
    let mut dup = course_body("高等数学A", "MATH-01", "2025-2026-1", "08:00");
    dup["section_id"] = json!(" MATH-01 ");
    let response = app
        .clone()
        .oneshot(json_request("POST", "/courses", dup))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_courses_status_filter_and_paging() {
    let (app, pool) = test_app().await;

    for (name, section, begin) in [
        ("高等数学A", "MATH-01", "08:00"),
        ("大学英语", "ENG-01", "10:00"),
        ("体育", "PE-01", "14:00"),
    ] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/courses",
                course_body(name, section, "2025-2026-1", begin),
            ))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let page = body_json(
        app.clone()
            .oneshot(get("/courses?term=2025-2026-1&status=pending"))
            .await
            .expect("request"),
    )
    .await;
    assert_eq!(page["total"], 3);

    // Flip one course to processed directly in the staging table.
    let first_id = page["items"][0]["id"].as_str().expect("id").to_string();
    assert!(
        repository::mark_course_processed(&pool, &first_id)
            .await
            .expect("mark processed")
    );

    let pending = body_json(
        app.clone()
            .oneshot(get("/courses?term=2025-2026-1&status=pending"))
            .await
            .expect("request"),
    )
    .await;
    assert_eq!(pending["total"], 2);

    let processed = body_json(
        app.clone()
            .oneshot(get("/courses?term=2025-2026-1&status=processed"))
            .await
            .expect("request"),
    )
    .await;
    assert_eq!(processed["total"], 1);
    assert_eq!(processed["items"][0]["id"].as_str(), Some(first_id.as_str()));

    let paged = body_json(
        app.clone()
            .oneshot(get("/courses?term=2025-2026-1&page=2&page_size=2"))
            .await
            .expect("request"),
    )
    .await;
    assert_eq!(paged["total"], 3);
    assert_eq!(paged["page"], 2);
    assert_eq!(paged["page_size"], 2);
    assert_eq!(paged["items"].as_array().expect("items").len(), 1);

    // A page number at the i64 ceiling still answers with an empty page.
    let response = app
        .clone()
        .oneshot(get("/courses?term=2025-2026-1&page=9223372036854775807"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let far = body_json(response).await;
    assert_eq!(far["total"], 3);
    assert_eq!(far["items"].as_array().expect("items").len(), 0);
}

#[tokio::test]
async fn test_delete_course() {
    let (app, _pool) = test_app().await;

    let created = body_json(
        app.clone()
            .oneshot(json_request(
                "POST",
                "/courses",
                course_body("高等数学A", "MATH-01", "2025-2026-1", "08:00"),
            ))
            .await
            .expect("request"),
    )
    .await;
    let id = created["id"].as_str().expect("id");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/courses/{}", id))
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let deleted = body_json(response).await;
    assert_eq!(deleted["id"].as_str(), Some(id));
    assert_eq!(deleted["status"], 2);

    // Deleting again is a no-op that still returns the record.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/courses/{}", id))
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let deleted = body_json(response).await;
    assert_eq!(deleted["status"], 2);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/courses/no-such-id")
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Not Found");
}

#[tokio::test]
async fn test_course_participants() {
    let (app, pool) = test_app().await;

    let created = body_json(
        app.clone()
            .oneshot(json_request(
                "POST",
                "/courses",
                course_body("高等数学A", "MATH-01", "2025-2026-1", "08:00"),
            ))
            .await
            .expect("request"),
    )
    .await;
    let id = created["id"].as_str().expect("id");

    repository::upsert_user(&pool, "t100", "王老师").await.expect("user");
    repository::upsert_user(&pool, "s200", "李明").await.expect("user");
    repository::upsert_user(&pool, "s201", "张华").await.expect("user");
    repository::add_participant(&pool, id, "t100", Role::Teacher)
        .await
        .expect("participant");
    repository::add_participant(&pool, id, "s200", Role::Student)
        .await
        .expect("participant");
    repository::add_participant(&pool, id, "s201", Role::Student)
        .await
        .expect("participant");

    let response = app
        .clone()
        .oneshot(get(&format!("/courses/{}/participants", id)))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["course_id"].as_str(), Some(id));
    assert_eq!(body["teachers"].as_array().expect("teachers").len(), 1);
    assert_eq!(body["teachers"][0]["user_id"], "t100");
    assert_eq!(body["teachers"][0]["name"], "王老师");
    assert_eq!(body["students"].as_array().expect("students").len(), 2);

    let response = app
        .clone()
        .oneshot(get("/courses/no-such-id/participants"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_endpoint_and_status() {
    let (app, _pool) = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/courses",
            course_body("高等数学A", "MATH-01", "2025-2026-1", "08:00"),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/sync", json!({"term": "2025-2026-1"})))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let report = body_json(response).await;
    assert_eq!(report["term"], "2025-2026-1");
    assert_eq!(report["courses_seen"], 1);
    assert_eq!(report["courses_synced"], 1);
    assert_eq!(report["calendars_created"], 1);
    assert_eq!(report["success"], true);
    assert_eq!(report["errors"].as_array().expect("errors").len(), 0);

    let response = app
        .clone()
        .oneshot(get("/sync/status?term=2025-2026-1"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(response).await;
    assert_eq!(status["term"], "2025-2026-1");
    assert_eq!(status["pending"], 0);
    assert_eq!(status["processed"], 1);
    assert_eq!(status["deleted"], 0);
    assert_eq!(status["total"], 1);
    assert!(status["last_synced_at"].as_str().is_some());
}

#[tokio::test]
async fn test_sync_requires_term() {
    let (app, _pool) = test_app().await;

    for body in [json!({}), json!({"term": ""})] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/sync", body))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "missing required parameter: term");
    }

    let response = app
        .clone()
        .oneshot(get("/sync/status"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_gets_error_envelope() {
    let (app, _pool) = test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .expect("Failed to build request"),
        )
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"].as_str().expect("error string").contains("400"));
    assert!(!body["message"].as_str().expect("message string").is_empty());

    // Missing content type lands in the same envelope.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync")
                .body(Body::from(r#"{"term": "2025-2026-1"}"#))
                .expect("Failed to build request"),
        )
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(!body["message"].as_str().expect("message string").is_empty());
}
