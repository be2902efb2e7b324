// src/engine/mod.rs
// InterviewEngine: the one entry object the HTTP layer talks to. Owns
// the gateway-backed collaborators and the store; enforces the
// session/question relationship the transport layer should not.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::evaluator::{AnswerRecord, ResponseEvaluator};
use crate::llm::ProviderGateway;
use crate::questions::QuestionPlanner;
use crate::report::{ReportAggregator, ReportError, SessionReport};
use crate::store::{SessionRecord, SessionStore, StoredQuestion};

/// How many previously asked questions feed the generation exclusion list.
const EXCLUDED_QUESTION_LIMIT: i64 = 50;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("question not found: {0}")]
    QuestionNotFound(String),

    #[error("question {question_id} does not belong to session {session_id}")]
    QuestionSessionMismatch {
        question_id: String,
        session_id: String,
    },

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub struct InterviewEngine {
    planner: QuestionPlanner,
    evaluator: ResponseEvaluator,
    aggregator: ReportAggregator,
    store: Arc<dyn SessionStore>,
}

impl InterviewEngine {
    pub fn new(
        gateway: Arc<ProviderGateway>,
        grammar: Arc<dyn crate::evaluator::grammar::GrammarChecker>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            planner: QuestionPlanner::new(Arc::clone(&gateway)),
            evaluator: ResponseEvaluator::new(Arc::clone(&gateway), grammar),
            aggregator: ReportAggregator::new(gateway),
            store,
        }
    }

    pub async fn create_session(
        &self,
        position: &str,
        difficulty: &str,
        experience_level: &str,
    ) -> Result<SessionRecord, EngineError> {
        let session = self
            .store
            .create_session(position, difficulty, experience_level)
            .await?;
        info!(session_id = %session.id, position, "session created");
        Ok(session)
    }

    /// Generate and persist the question set for a session. Idempotent:
    /// a session that already has questions gets them back unchanged.
    pub async fn start_interview(
        &self,
        session_id: &str,
        skills: &[String],
    ) -> Result<Vec<StoredQuestion>, EngineError> {
        let session = self.require_session(session_id).await?;

        let existing = self.store.questions(session_id).await?;
        if !existing.is_empty() {
            info!(session_id, count = existing.len(), "interview already started");
            return Ok(existing);
        }

        let excluded = self
            .store
            .recent_question_texts(EXCLUDED_QUESTION_LIMIT)
            .await?;

        let questions = self
            .planner
            .generate(
                &session.position,
                skills,
                &session.difficulty,
                &session.experience_level,
                &excluded,
            )
            .await;

        let stored = self.store.save_questions(session_id, &questions).await?;
        self.store.mark_started(session_id).await?;
        info!(session_id, count = stored.len(), "interview started");
        Ok(stored)
    }

    /// Evaluate one answer and persist its record, tagged with the
    /// question's category.
    pub async fn submit_response(
        &self,
        session_id: &str,
        question_id: &str,
        transcript: &str,
        raw_metrics: Option<&serde_json::Value>,
    ) -> Result<AnswerRecord, EngineError> {
        self.require_session(session_id).await?;

        let question = self
            .store
            .question(question_id)
            .await?
            .ok_or_else(|| EngineError::QuestionNotFound(question_id.to_string()))?;

        if question.session_id != session_id {
            return Err(EngineError::QuestionSessionMismatch {
                question_id: question_id.to_string(),
                session_id: session_id.to_string(),
            });
        }

        let record = self
            .evaluator
            .evaluate(&question.text, transcript, raw_metrics)
            .await
            .with_category(&question.category);

        self.store
            .save_answer(session_id, question_id, &record)
            .await?;
        info!(
            session_id,
            question_id,
            content_quality = record.content_quality_score,
            star = record.star_method_used,
            "response recorded"
        );
        Ok(record)
    }

    /// Session report, recomputed from the current answer records on
    /// every request and written back as an idempotent cache overwrite.
    /// Resubmitted answers are always reflected. A session with no
    /// answers yields `ReportError::NoResponses`, not an empty report.
    pub async fn generate_report(&self, session_id: &str) -> Result<SessionReport, EngineError> {
        self.require_session(session_id).await?;

        let records = self.store.answers_in_question_order(session_id).await?;
        let report = self.aggregator.generate_report(&records).await?;
        self.store.cache_report(session_id, &report).await?;
        info!(
            session_id,
            overall = report.overall_score,
            "report generated and cache overwritten"
        );
        Ok(report)
    }

    pub async fn questions(&self, session_id: &str) -> Result<Vec<StoredQuestion>, EngineError> {
        self.require_session(session_id).await?;
        Ok(self.store.questions(session_id).await?)
    }

    async fn require_session(&self, session_id: &str) -> Result<SessionRecord, EngineError> {
        self.store
            .session(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }
}
