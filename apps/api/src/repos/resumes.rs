use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::models::resume::{CandidateSkillRow, NewCandidateSkill, ResumeRow};
use crate::models::status::DocumentStatus;

#[derive(Clone)]
pub struct ResumeRepo {
    pool: PgPool,
    events: EventBus,
}

impl ResumeRepo {
    pub fn new(pool: PgPool, events: EventBus) -> Self {
        Self { pool, events }
    }

    /// Inserts a new résumé row in `queued`. Idempotent on the primary key:
    /// a re-submit with the same id is a no-op and the original row survives.
    pub async fn create(
        &self,
        id: Uuid,
        user_id: Uuid,
        filename: &str,
        mime_type: &str,
        storage_key: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO resumes (id, user_id, filename, mime_type, storage_key, status, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'queued', FALSE, NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(filename)
        .bind(mime_type)
        .bind(storage_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Writes the authoritative status row and then emits
    /// `resume.status.changed`, so subscribers only observe committed state.
    ///
    /// Soft-deleted rows and rows already `ready` are left untouched (zero
    /// rows affected, no event); that is how concurrent deletes and queue
    /// redelivery stay harmless. Returns whether a row was written.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        parsed_summary: Option<&serde_json::Value>,
    ) -> Result<bool, AppError> {
        let summary_text = parsed_summary.map(|v| v.to_string());
        let affected = sqlx::query(
            r#"
            UPDATE resumes
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
            self.events.publish(DomainEvent::ResumeStatusChanged {
                id,
                status: status.to_string(),
                ts: Utc::now(),
            });
        }
        Ok(affected == 1)
    }

    /// Row plus derived skills; `None` if missing, soft-deleted, or owned by
    /// someone else.
    pub async fn get_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<(ResumeRow, Vec<CandidateSkillRow>)>, AppError> {
        let row = sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let skills = sqlx::query_as::<_, CandidateSkillRow>(
            "SELECT * FROM candidate_skills WHERE resume_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some((row, skills)))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ResumeRow>, AppError> {
        Ok(sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE user_id = $1 AND is_deleted = FALSE ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Hides the row from every subsequent read. Irreversible. Returns
    /// whether a row was actually deleted (false → not found / not owned).
    pub async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let affected = sqlx::query(
            r#"
            UPDATE resumes
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

    /// Replaces the derived skill set: delete then insert, in payload order.
    /// Not transactional: readers between the two statements may see an
    /// empty set, which is safe because consumers gate on `status = ready`.
    pub async fn replace_children(
        &self,
        resume_id: Uuid,
        skills: &[NewCandidateSkill],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM candidate_skills WHERE resume_id = $1")
            .bind(resume_id)
            .execute(&self.pool)
            .await?;

        for skill in skills {
            sqlx::query(
                r#"
                INSERT INTO candidate_skills (resume_id, skill, experience_years, proficiency)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(resume_id)
            .bind(&skill.skill)
            .bind(skill.experience_years)
            .bind(&skill.proficiency)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
