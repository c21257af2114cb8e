use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::models::matching::{MatchJobRow, MatchResultRow};
use crate::models::status::MatchStatus;

#[derive(Clone)]
pub struct MatchRepo {
    pool: PgPool,
    events: EventBus,
}

impl MatchRepo {
    pub fn new(pool: PgPool, events: EventBus) -> Self {
        Self { pool, events }
    }

    /// Inserts a match job in `queued`; idempotent on primary key.
    pub async fn create_job(
        &self,
        id: Uuid,
        user_id: Uuid,
        resume_id: Uuid,
        job_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO match_jobs (id, user_id, resume_id, job_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'queued', NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(resume_id)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Writes the match-job status (with optional error message / result
    /// attachment) and then emits `match.status.changed`.
    ///
    /// `completed` is terminal: once set, redelivered or racing updates
    /// affect zero rows and emit nothing. `result_id` is only ever written
    /// together with `completed`, keeping it non-null iff completed.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: MatchStatus,
        error_message: Option<&str>,
        result_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let affected = sqlx::query(
            r#"
            UPDATE match_jobs
            SET status = $2, error_message = $3, result_id = COALESCE($4, result_id), updated_at = NOW()
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(result_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 1 {
            self.events.publish(DomainEvent::MatchStatusChanged {
                id,
                status: status.to_string(),
                ts: Utc::now(),
            });
        }
        Ok(affected == 1)
    }

    /// Persists the enriched result of a completed match computation.
    /// Idempotent on primary key.
    pub async fn insert_result(
        &self,
        id: Uuid,
        user_id: Uuid,
        resume_id: Uuid,
        job_id: Uuid,
        score: f64,
        summary: &serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO matches (id, user_id, resume_id, job_id, score, summary, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(resume_id)
        .bind(job_id)
        .bind(score)
        .bind(summary.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_job_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MatchJobRow>, AppError> {
        Ok(sqlx::query_as::<_, MatchJobRow>(
            "SELECT * FROM match_jobs WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn get_result_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MatchResultRow>, AppError> {
        Ok(sqlx::query_as::<_, MatchResultRow>(
            "SELECT * FROM matches WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<MatchJobRow>, AppError> {
        Ok(sqlx::query_as::<_, MatchJobRow>(
            "SELECT * FROM match_jobs WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
