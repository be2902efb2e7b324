// tests/http_api.rs
// The HTTP surface end to end against an in-memory store, with no AI
// providers configured: fallback question bank, skip substitution,
// validation errors, and the report lifecycle.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use interviewiq::engine::InterviewEngine;
use interviewiq::evaluator::grammar::DisabledGrammarChecker;
use interviewiq::evaluator::SKIP_SENTINEL;
use interviewiq::llm::{ProviderGateway, ProviderRegistry};
use interviewiq::server::{router, AppState};
use interviewiq::store::{run_migrations, SqliteStore};

async fn test_app() -> Router {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();

    let gateway = Arc::new(ProviderGateway::new(
        ProviderRegistry::default(),
        Duration::from_secs(1),
        Duration::from_secs(1),
    ));
    let engine = InterviewEngine::new(
        gateway,
        Arc::new(DisabledGrammarChecker),
        Arc::new(SqliteStore::new(pool)),
    );

    router(Arc::new(AppState { engine }), Duration::from_secs(30))
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, parsed)
}

async fn started_session(app: &Router) -> (String, Vec<Value>) {
    let (status, session) = request(
        app,
        "POST",
        "/api/sessions",
        Some(json!({ "position": "Backend Engineer" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = session["id"].as_str().unwrap().to_string();

    let (status, started) = request(
        app,
        "POST",
        &format!("/api/sessions/{session_id}/start"),
        Some(json!({ "skills": ["Rust"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let questions = started["questions"].as_array().unwrap().clone();
    (session_id, questions)
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app().await;
    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn start_without_providers_serves_fallback_bank() {
    let app = test_app().await;
    let (_session_id, questions) = started_session(&app).await;

    assert!(!questions.is_empty());
    assert_eq!(questions[0]["category"], "Intro");
    assert!(questions
        .iter()
        .any(|q| q["text"].as_str().unwrap().contains("Backend Engineer")));
    assert!(questions
        .iter()
        .any(|q| q["text"].as_str().unwrap().contains("Rust")));
}

#[tokio::test]
async fn starting_twice_returns_the_same_questions() {
    let app = test_app().await;
    let (session_id, first) = started_session(&app).await;

    let (status, second) = request(
        &app,
        "POST",
        &format!("/api/sessions/{session_id}/start"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["questions"].as_array().unwrap(), &first);
}

#[tokio::test]
async fn empty_transcript_becomes_a_skip() {
    let app = test_app().await;
    let (session_id, questions) = started_session(&app).await;
    let question_id = questions[0]["id"].as_str().unwrap();

    let (status, record) = request(
        &app,
        "POST",
        &format!("/api/sessions/{session_id}/responses"),
        Some(json!({ "question_id": question_id, "transcript": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["transcript"], SKIP_SENTINEL);
    assert_eq!(record["content_quality_score"], 0);
    assert_eq!(record["critique"]["is_answer_correct"], false);
}

#[tokio::test]
async fn missing_question_id_is_a_bad_request() {
    let app = test_app().await;
    let (session_id, _questions) = started_session(&app).await;

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/sessions/{session_id}/responses"),
        Some(json!({ "transcript": "an answer" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "question_id is required");
}

#[tokio::test]
async fn unknown_question_is_not_found() {
    let app = test_app().await;
    let (session_id, _questions) = started_session(&app).await;

    let (status, _body) = request(
        &app,
        "POST",
        &format!("/api/sessions/{session_id}/responses"),
        Some(json!({
            "question_id": "00000000-0000-0000-0000-000000000000",
            "transcript": "an answer"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn string_encoded_metrics_are_accepted() {
    let app = test_app().await;
    let (session_id, questions) = started_session(&app).await;
    let question_id = questions[0]["id"].as_str().unwrap();

    let metrics = json!({
        "fluency_score": 4.0,
        "voiceMetrics": { "word_count": 9, "words_per_minute": 140 }
    });
    let (status, record) = request(
        &app,
        "POST",
        &format!("/api/sessions/{session_id}/responses"),
        Some(json!({
            "question_id": question_id,
            "transcript": "I am a backend developer who enjoys systems work.",
            "fluency_metrics": metrics.to_string()
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["fluency_score"], 4.0);
    assert_eq!(record["voice_metrics"]["words_per_minute"], 140);
}

#[tokio::test]
async fn report_lifecycle() {
    let app = test_app().await;
    let (session_id, questions) = started_session(&app).await;

    // No answers yet: a distinct client error, not an empty report.
    let (status, _body) = request(
        &app,
        "GET",
        &format!("/api/sessions/{session_id}/report"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let question_id = questions[0]["id"].as_str().unwrap();
    let (status, _record) = request(
        &app,
        "POST",
        &format!("/api/sessions/{session_id}/responses"),
        Some(json!({
            "question_id": question_id,
            "transcript": "I am a backend developer. In my role I had to improve a slow \
                           service and the result was a 40% latency reduction."
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, report) = request(
        &app,
        "GET",
        &format!("/api/sessions/{session_id}/report"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(report["overall_score"].is_u64());
    assert_eq!(report["narrative_source"], "fallback");
    assert!(report["percentile"].as_str().unwrap().contains("percentile"));

    // Unchanged records recompute to the identical report.
    let (status, refetched) = request(
        &app,
        "GET",
        &format!("/api/sessions/{session_id}/report"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refetched, report);
}

#[tokio::test]
async fn resubmitted_answer_is_reflected_in_the_next_report() {
    let app = test_app().await;
    let (session_id, questions) = started_session(&app).await;
    let question_id = questions[0]["id"].as_str().unwrap();

    let (status, _record) = request(
        &app,
        "POST",
        &format!("/api/sessions/{session_id}/responses"),
        Some(json!({
            "question_id": question_id,
            "transcript": "I worked on stuff."
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, weak_report) = request(
        &app,
        "GET",
        &format!("/api/sessions/{session_id}/report"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let weak_overall = weak_report["overall_score"].as_u64().unwrap();

    // Replace the answer with a stronger one for the same question.
    let (status, _record) = request(
        &app,
        "POST",
        &format!("/api/sessions/{session_id}/responses"),
        Some(json!({
            "question_id": question_id,
            "transcript": "When I was at my internship our checkout service was slow. \
                           I had to find the bottleneck, so I implemented request caching \
                           and tuned the database indexes. Specifically, the result was a \
                           40 percent latency reduction and the team successfully shipped \
                           the release on time. For example, the p99 dropped from 800ms \
                           to 480ms across every region we measured."
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, strong_report) = request(
        &app,
        "GET",
        &format!("/api/sessions/{session_id}/report"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let strong_overall = strong_report["overall_score"].as_u64().unwrap();

    assert!(
        strong_overall > weak_overall,
        "report must be recomputed from the replaced answer \
         (before: {weak_overall}, after: {strong_overall})"
    );
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app().await;
    let (status, _body) = request(
        &app,
        "GET",
        "/api/sessions/does-not-exist/report",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
