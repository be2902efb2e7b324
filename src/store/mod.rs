// src/store/mod.rs
// Persistence boundary. The engine talks to `SessionStore`; the sqlx
// SQLite implementation keeps answer records as JSON blobs keyed by
// session and question order.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, SqlitePool};
use uuid::Uuid;

use crate::evaluator::AnswerRecord;
use crate::questions::Question;
use crate::report::SessionReport;

// ── Schema ──────────────────────────────────────────────────────────────

const CREATE_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    position TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    experience_level TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'created',
    overall_score INTEGER,
    report_json TEXT,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

const CREATE_QUESTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    text TEXT NOT NULL,
    category TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    ord INTEGER NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);
"#;

const CREATE_RESPONSES: &str = r#"
CREATE TABLE IF NOT EXISTS responses (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    question_id TEXT NOT NULL,
    record_json TEXT NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE,
    FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
);
"#;

const CREATE_INDICES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_questions_session ON questions(session_id, ord);
CREATE INDEX IF NOT EXISTS idx_responses_session ON responses(session_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_responses_question ON responses(question_id);
"#;

/// Idempotent, safe to run at every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    pool.execute(CREATE_SESSIONS).await?;
    pool.execute(CREATE_QUESTIONS).await?;
    pool.execute(CREATE_RESPONSES).await?;
    pool.execute(CREATE_INDICES).await?;
    Ok(())
}

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub position: String,
    pub difficulty: String,
    pub experience_level: String,
    pub status: String,
    pub overall_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredQuestion {
    pub id: String,
    pub session_id: String,
    pub text: String,
    pub category: String,
    pub difficulty: String,
    pub order: i64,
}

// ── Trait ───────────────────────────────────────────────────────────────

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        position: &str,
        difficulty: &str,
        experience_level: &str,
    ) -> Result<SessionRecord>;

    async fn session(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    async fn mark_started(&self, session_id: &str) -> Result<()>;

    /// Persist the ordered question set; returns them with assigned ids.
    async fn save_questions(
        &self,
        session_id: &str,
        questions: &[Question],
    ) -> Result<Vec<StoredQuestion>>;

    async fn questions(&self, session_id: &str) -> Result<Vec<StoredQuestion>>;

    async fn question(&self, question_id: &str) -> Result<Option<StoredQuestion>>;

    /// Recently asked question texts across all sessions, newest first.
    /// Feeds the generation prompt's exclusion list.
    async fn recent_question_texts(&self, limit: i64) -> Result<Vec<String>>;

    /// Saving twice for the same question replaces the earlier record.
    async fn save_answer(
        &self,
        session_id: &str,
        question_id: &str,
        record: &AnswerRecord,
    ) -> Result<()>;

    /// All answer records for a session, in question order.
    async fn answers_in_question_order(&self, session_id: &str) -> Result<Vec<AnswerRecord>>;

    /// Cache the generated report and its overall score on the session.
    async fn cache_report(&self, session_id: &str, report: &SessionReport) -> Result<()>;

    async fn cached_report(&self, session_id: &str) -> Result<Option<SessionReport>>;
}

// ── SQLite implementation ───────────────────────────────────────────────

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(
        &self,
        position: &str,
        difficulty: &str,
        experience_level: &str,
    ) -> Result<SessionRecord> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO sessions (id, position, difficulty, experience_level, status, created_at)
             VALUES (?, ?, ?, ?, 'created', ?)",
        )
        .bind(&id)
        .bind(position)
        .bind(difficulty)
        .bind(experience_level)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to create session")?;

        Ok(SessionRecord {
            id,
            position: position.to_string(),
            difficulty: difficulty.to_string(),
            experience_level: experience_level.to_string(),
            status: "created".to_string(),
            overall_score: None,
        })
    }

    async fn session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, (String, String, String, String, String, Option<i64>)>(
            "SELECT id, position, difficulty, experience_level, status, overall_score
             FROM sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, position, difficulty, experience_level, status, overall_score)| SessionRecord {
                id,
                position,
                difficulty,
                experience_level,
                status,
                overall_score,
            },
        ))
    }

    async fn mark_started(&self, session_id: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET status = 'started' WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_questions(
        &self,
        session_id: &str,
        questions: &[Question],
    ) -> Result<Vec<StoredQuestion>> {
        let mut stored = Vec::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            let id = Uuid::new_v4().to_string();
            let order = (index + 1) as i64;
            sqlx::query(
                "INSERT INTO questions (id, session_id, text, category, difficulty, ord, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(session_id)
            .bind(&question.text)
            .bind(&question.category)
            .bind(&question.difficulty)
            .bind(order)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("failed to save question")?;

            stored.push(StoredQuestion {
                id,
                session_id: session_id.to_string(),
                text: question.text.clone(),
                category: question.category.clone(),
                difficulty: question.difficulty.clone(),
                order,
            });
        }
        Ok(stored)
    }

    async fn questions(&self, session_id: &str) -> Result<Vec<StoredQuestion>> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, i64)>(
            "SELECT id, session_id, text, category, difficulty, ord
             FROM questions WHERE session_id = ? ORDER BY ord",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, session_id, text, category, difficulty, order)| StoredQuestion {
                    id,
                    session_id,
                    text,
                    category,
                    difficulty,
                    order,
                },
            )
            .collect())
    }

    async fn question(&self, question_id: &str) -> Result<Option<StoredQuestion>> {
        let row = sqlx::query_as::<_, (String, String, String, String, String, i64)>(
            "SELECT id, session_id, text, category, difficulty, ord
             FROM questions WHERE id = ?",
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, session_id, text, category, difficulty, order)| StoredQuestion {
                id,
                session_id,
                text,
                category,
                difficulty,
                order,
            },
        ))
    }

    async fn recent_question_texts(&self, limit: i64) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT text FROM questions ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(text,)| text).collect())
    }

    async fn save_answer(
        &self,
        session_id: &str,
        question_id: &str,
        record: &AnswerRecord,
    ) -> Result<()> {
        let record_json =
            serde_json::to_string(record).context("failed to serialize answer record")?;
        sqlx::query(
            "INSERT INTO responses (id, session_id, question_id, record_json, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(question_id) DO UPDATE SET record_json = excluded.record_json",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_id)
        .bind(question_id)
        .bind(record_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to save answer record")?;
        Ok(())
    }

    async fn answers_in_question_order(&self, session_id: &str) -> Result<Vec<AnswerRecord>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT r.record_json FROM responses r
             JOIN questions q ON q.id = r.question_id
             WHERE r.session_id = ? ORDER BY q.ord",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(json,)| {
                serde_json::from_str(&json).context("failed to deserialize answer record")
            })
            .collect()
    }

    async fn cache_report(&self, session_id: &str, report: &SessionReport) -> Result<()> {
        let report_json = serde_json::to_string(report).context("failed to serialize report")?;
        sqlx::query(
            "UPDATE sessions SET report_json = ?, overall_score = ?, status = 'completed'
             WHERE id = ?",
        )
        .bind(report_json)
        .bind(report.overall_score as i64)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cached_report(&self, session_id: &str) -> Result<Option<SessionReport>> {
        let row = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT report_json FROM sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match row.and_then(|(json,)| json) {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("failed to deserialize cached report")?,
            )),
            None => Ok(None),
        }
    }
}
