#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use learnpath_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    services::{store::InMemoryStore, AppState},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const LEARNER: &str = "learner-1";

pub const ALGEBRA_ID: &str = "11111111-1111-4111-8111-111111111111";
pub const ALGEBRA_SLUG: &str = "algebra-basics";
pub const GEOMETRY_ID: &str = "22222222-2222-4222-8222-222222222222";
pub const GEOMETRY_SLUG: &str = "geometry";
pub const CALCULUS_ID: &str = "33333333-3333-4333-8333-333333333333";

pub fn create_test_app() -> (Router, Arc<InMemoryStore>) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(InMemoryStore::new());
    let state = Arc::new(AppState::with_store(
        Config::in_memory(TEST_JWT_SECRET),
        store.clone(),
    ));

    (create_router(state), store)
}

pub fn token_for(user_id: &str) -> String {
    JwtService::new(TEST_JWT_SECRET)
        .generate_token(&JwtClaims::for_user(user_id, 3600))
        .expect("test token")
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// One course, one subject, three modules:
/// - algebra: s-a1 (l1, l2; e1: q1, q2) and s-a2 (l3; e2: q3)
/// - geometry: s-g1 (l4, no exercises)
/// - calculus: no sections
pub fn seed_curriculum(store: &InMemoryStore) {
    store.insert_rows(
        "courses",
        vec![json!({"id": "course-1", "title": "Mathematics", "description": "Core maths"})],
    );
    store.insert_rows(
        "subjects",
        vec![json!({"id": "subject-1", "title": "Foundations", "course_id": "course-1", "order_index": 1})],
    );
    store.insert_rows(
        "modules",
        vec![
            json!({"id": ALGEBRA_ID, "slug": ALGEBRA_SLUG, "title": "Algebra", "subject_id": "subject-1", "order_index": 1}),
            json!({"id": GEOMETRY_ID, "slug": GEOMETRY_SLUG, "title": "Geometry", "subject_id": "subject-1", "order_index": 2}),
            json!({"id": CALCULUS_ID, "slug": "calculus", "title": "Calculus", "subject_id": "subject-1", "order_index": 3}),
        ],
    );
    store.insert_rows(
        "sections",
        vec![
            json!({"id": "s-a1", "title": "Expressions", "module_id": ALGEBRA_ID}),
            json!({"id": "s-a2", "title": "Equations", "module_id": ALGEBRA_ID}),
            json!({"id": "s-g1", "title": "Angles", "module_id": GEOMETRY_ID}),
        ],
    );
    store.insert_rows(
        "lectures",
        vec![
            json!({"id": "l1", "section_id": "s-a1"}),
            json!({"id": "l2", "section_id": "s-a1"}),
            json!({"id": "l3", "section_id": "s-a2"}),
            json!({"id": "l4", "section_id": "s-g1"}),
        ],
    );
    store.insert_rows(
        "section_exercises",
        vec![
            json!({"id": "e1", "section_id": "s-a1"}),
            json!({"id": "e2", "section_id": "s-a2"}),
        ],
    );
    store.insert_rows(
        "section_exercise_questions",
        vec![
            json!({"id": "q1", "exercise_id": "e1"}),
            json!({"id": "q2", "exercise_id": "e1"}),
            json!({"id": "q3", "exercise_id": "e2"}),
        ],
    );
}

pub fn assign_course(store: &InMemoryStore, user_id: &str, course_id: &str) {
    store.insert_rows(
        "user_course_assignments",
        vec![json!({"user_id": user_id, "course_id": course_id})],
    );
}

pub fn watch(store: &InMemoryStore, user_id: &str, section_id: &str, lecture_id: &str) {
    store.insert_rows(
        "user_section_lecture_progress",
        vec![json!({
            "user_id": user_id,
            "section_id": section_id,
            "lecture_id": lecture_id,
            "is_watched": true,
        })],
    );
}

pub fn finish_quiz(store: &InMemoryStore, user_id: &str, section_id: &str, status: &str) {
    store.insert_rows(
        "adaptive_quiz_sessions",
        vec![json!({"user_id": user_id, "section_id": section_id, "status": status})],
    );
}

pub fn submit(
    store: &InMemoryStore,
    user_id: &str,
    section_id: &str,
    exercise_id: &str,
    question_id: &str,
    submitted_at: &str,
) {
    store.insert_rows(
        "user_section_exercise_submissions",
        vec![json!({
            "user_id": user_id,
            "section_id": section_id,
            "exercise_id": exercise_id,
            "question_id": question_id,
            "submitted_at": submitted_at,
        })],
    );
}

pub fn set_module_status(store: &InMemoryStore, user_id: &str, module_id: &str, row: Value) {
    let mut fields = json!({"user_id": user_id, "module_id": module_id});
    if let (Some(target), Value::Object(extra)) = (fields.as_object_mut(), row) {
        target.extend(extra);
    }
    store.insert_rows("user_module_status", vec![fields]);
}

/// Every gate of every algebra section satisfied for `user_id`.
pub fn complete_algebra(store: &InMemoryStore, user_id: &str) {
    watch(store, user_id, "s-a1", "l1");
    watch(store, user_id, "s-a1", "l2");
    watch(store, user_id, "s-a2", "l3");
    finish_quiz(store, user_id, "s-a1", "completed");
    finish_quiz(store, user_id, "s-a2", "stopped");
    submit(store, user_id, "s-a1", "e1", "q1", "2024-03-01T09:00:00Z");
    submit(store, user_id, "s-a1", "e1", "q2", "2024-03-01T09:05:00Z");
    submit(store, user_id, "s-a2", "e2", "q3", "2024-03-02T10:00:00Z");
}
