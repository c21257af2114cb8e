use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::models::job::{JobRow, NewRequirement, NewSoftSkill, RequirementRow, SoftSkillRow};
use crate::models::status::DocumentStatus;

/// Parameters for creating a job-description row. Exactly one of
/// `storage_key` / `raw_text` is set, matching `source`.
pub struct NewJob<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: &'a str,
    pub source: &'a str,
    pub filename: Option<&'a str>,
    pub mime_type: &'a str,
    pub storage_key: Option<&'a str>,
    pub raw_text: Option<&'a str>,
}

#[derive(Clone)]
pub struct JobRepo {
    pool: PgPool,
    events: EventBus,
}

impl JobRepo {
    pub fn new(pool: PgPool, events: EventBus) -> Self {
        Self { pool, events }
    }

    /// Inserts a job-description row in `queued`; idempotent on primary key.
    pub async fn create(&self, job: NewJob<'_>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO job_descriptions
                (id, user_id, title, source, filename, mime_type, storage_key, raw_text, status, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'queued', FALSE, NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(job.id)
        .bind(job.user_id)
        .bind(job.title)
        .bind(job.source)
        .bind(job.filename)
        .bind(job.mime_type)
        .bind(job.storage_key)
        .bind(job.raw_text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// See `ResumeRepo::update_status`; identical contract for
    /// `job.status.changed`.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        parsed_summary: Option<&serde_json::Value>,
    ) -> Result<bool, AppError> {
        let summary_text = parsed_summary.map(|v| v.to_string());
        let affected = sqlx::query(
            r#"
            UPDATE job_descriptions
            SET status = $2, parsed_summary = COALESCE($3, parsed_summary), updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE AND status <> 'ready'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(summary_text)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 1 {
            self.events.publish(DomainEvent::JobStatusChanged {
                id,
                status: status.to_string(),
                ts: Utc::now(),
            });
        }
        Ok(affected == 1)
    }

    pub async fn get_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<(JobRow, Vec<RequirementRow>, Vec<SoftSkillRow>)>, AppError> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM job_descriptions WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let requirements = sqlx::query_as::<_, RequirementRow>(
            "SELECT * FROM requirements WHERE job_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let soft_skills = sqlx::query_as::<_, SoftSkillRow>(
            "SELECT * FROM job_soft_skills WHERE job_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some((row, requirements, soft_skills)))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<JobRow>, AppError> {
        Ok(sqlx::query_as::<_, JobRow>(
            "SELECT * FROM job_descriptions WHERE user_id = $1 AND is_deleted = FALSE ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let affected = sqlx::query(
            r#"
            UPDATE job_descriptions
            SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    /// Replaces both derived child families (delete-then-insert, payload
    /// order). Same non-transactional contract as the résumé children.
    pub async fn replace_children(
        &self,
        job_id: Uuid,
        requirements: &[NewRequirement],
        soft_skills: &[NewSoftSkill],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM requirements WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM job_soft_skills WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        for req in requirements {
            sqlx::query(
                "INSERT INTO requirements (job_id, skill, importance, inferred) VALUES ($1, $2, $3, $4)",
            )
            .bind(job_id)
            .bind(&req.skill)
            .bind(req.importance)
            .bind(req.inferred)
            .execute(&self.pool)
            .await?;
        }

        for soft in soft_skills {
            sqlx::query("INSERT INTO job_soft_skills (job_id, skill, value) VALUES ($1, $2, $3)")
                .bind(job_id)
                .bind(&soft.skill)
                .bind(soft.value)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}
