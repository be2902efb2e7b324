// src/server/mod.rs
// Thin HTTP boundary over the engine. Request-shape tolerance lives
// here (empty transcript becomes a skip, fluency_metrics arrives as an
// object or a JSON-encoded string); everything else is the engine's.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;

use crate::engine::{EngineError, InterviewEngine};
use crate::evaluator::SKIP_SENTINEL;
use crate::report::ReportError;

pub struct AppState {
    pub engine: InterviewEngine,
}

pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/{session_id}/start", post(start_interview_handler))
        .route("/api/sessions/{session_id}/questions", get(questions_handler))
        .route("/api/sessions/{session_id}/responses", post(submit_response_handler))
        .route("/api/sessions/{session_id}/report", get(report_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(err: EngineError) -> Response {
    let (status, message) = match &err {
        EngineError::SessionNotFound(_) | EngineError::QuestionNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        EngineError::QuestionSessionMismatch { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        EngineError::Report(ReportError::NoResponses) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        EngineError::Storage(e) => {
            warn!("storage failure: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    };
    (status, Json(json!({ "error": message }))).into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    position: String,
    #[serde(default = "default_difficulty")]
    difficulty: String,
    #[serde(default = "default_experience")]
    experience_level: String,
}

fn default_difficulty() -> String {
    "Medium".to_string()
}

fn default_experience() -> String {
    "0-2 years".to_string()
}

async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionRequest>,
) -> Response {
    match state
        .engine
        .create_session(&body.position, &body.difficulty, &body.experience_level)
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
struct StartInterviewRequest {
    #[serde(default)]
    skills: Vec<String>,
}

async fn start_interview_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<StartInterviewRequest>,
) -> Response {
    match state.engine.start_interview(&session_id, &body.skills).await {
        Ok(questions) => Json(json!({
            "status": "Interview Started",
            "total_questions": questions.len(),
            "questions": questions,
        }))
        .into_response(),
        Err(err) => error_response(err),
    }
}

async fn questions_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.engine.questions(&session_id).await {
        Ok(questions) => Json(questions).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
struct SubmitResponseRequest {
    question_id: Option<String>,
    #[serde(default)]
    transcript: String,
    /// Either a metrics object or a JSON-encoded string of one; clients
    /// sending form data serialize it themselves.
    #[serde(default)]
    fluency_metrics: Option<Value>,
}

/// Unwrap string-encoded metrics; anything unparsable becomes "absent".
fn coerce_metrics(raw: Option<Value>) -> Option<Value> {
    match raw {
        Some(Value::String(encoded)) => match serde_json::from_str(&encoded) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!("fluency_metrics string was not valid JSON, ignoring");
                None
            }
        },
        other => other,
    }
}

async fn submit_response_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<SubmitResponseRequest>,
) -> Response {
    let Some(question_id) = body.question_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "question_id is required" })),
        )
            .into_response();
    };

    // An empty or whitespace transcript means the question was skipped.
    let transcript = if body.transcript.trim().is_empty() {
        SKIP_SENTINEL.to_string()
    } else {
        body.transcript
    };

    let metrics = coerce_metrics(body.fluency_metrics);

    match state
        .engine
        .submit_response(&session_id, &question_id, &transcript, metrics.as_ref())
        .await
    {
        Ok(record) => Json(record).into_response(),
        Err(err) => error_response(err),
    }
}

async fn report_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.engine.generate_report(&session_id).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => error_response(err),
    }
}
