use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db;
use crate::migrate;

/// Where question and upload activity gets recorded.
///
/// Implementations must be best-effort: a logging failure is the
/// implementation's problem to swallow, never the pipeline's.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Records an incoming question with no response yet.
    async fn log_question(&self, question: &str);
    /// Completes the most recent unanswered record for this question.
    async fn log_response(&self, question: &str, response: &str);
    /// Records a successfully trained upload.
    async fn log_upload(&self, filename: &str);
}

/// Discards everything.
pub struct NoopActivityLog;

#[async_trait]
impl ActivityLog for NoopActivityLog {
    async fn log_question(&self, _question: &str) {}
    async fn log_response(&self, _question: &str, _response: &str) {}
    async fn log_upload(&self, _filename: &str) {}
}

/// Best-effort counters over the activity database.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityStats {
    pub answered_questions: i64,
    pub total_uploads: i64,
}

/// SQLite-backed log, kept in its own database apart from the index.
pub struct SqliteActivityLog {
    pool: SqlitePool,
}

impl SqliteActivityLog {
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_activity_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn stats(&self) -> ActivityStats {
        let answered_questions = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM questions WHERE response IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await
        .unwrap_or_else(|e| {
            debug!("question count failed: {}", e);
            0
        });
        let total_uploads = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM uploads")
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| {
                debug!("upload count failed: {}", e);
                0
            });

        ActivityStats {
            answered_questions,
            total_uploads,
        }
    }
}

#[async_trait]
impl ActivityLog for SqliteActivityLog {
    async fn log_question(&self, question: &str) {
        let result = sqlx::query("INSERT INTO questions (question, created_at) VALUES (?, ?)")
            .bind(question)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!("failed to log question: {}", e);
        }
    }

    async fn log_response(&self, question: &str, response: &str) {
        let result = sqlx::query(
            r#"
            UPDATE questions SET response = ?
            WHERE id = (
                SELECT id FROM questions
                WHERE question = ? AND response IS NULL
                ORDER BY id DESC LIMIT 1
            )
            "#,
        )
        .bind(response)
        .bind(question)
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            warn!("failed to log response: {}", e);
        }
    }

    async fn log_upload(&self, filename: &str) {
        let result = sqlx::query("INSERT INTO uploads (filename, uploaded_at) VALUES (?, ?)")
            .bind(filename)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!("failed to log upload: {}", e);
        }
    }
}
