//! Identity store: external subject → internal user row, plus the per-user
//! annual usage counters behind the match quota.

use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::quota::window_expired;

/// Default annual match allowance for a newly provisioned user.
pub const DEFAULT_ANNUAL_LIMIT: i32 = 100;

/// Counters returned by a usage increment.
#[derive(Debug, Clone, Copy)]
pub struct UsageCounters {
    pub new_count: i32,
    pub limit: i32,
}

#[derive(Clone)]
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the user for `external_subject`, creating it with defaults on
    /// first sight. Idempotent under concurrent calls: the insert ignores
    /// unique-key collisions and the row is re-read.
    pub async fn ensure_user(
        &self,
        external_subject: &str,
        email: Option<&str>,
    ) -> Result<UserRow, AppError> {
        if external_subject.trim().is_empty() {
            return Err(AppError::InvalidInput("subject_required"));
        }

        if let Some(user) = self.by_subject(external_subject).await? {
            return Ok(user);
        }

        sqlx::query(
            r#"
            INSERT INTO users (id, external_subject, email, annual_limit, annual_usage_count, annual_period_start, created_at)
            VALUES ($1, $2, $3, $4, 0, NULL, NOW())
            ON CONFLICT (external_subject) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(external_subject)
        .bind(email)
        .bind(DEFAULT_ANNUAL_LIMIT)
        .execute(&self.pool)
        .await?;

        info!(subject = external_subject, "provisioned user");

        self.by_subject(external_subject)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user vanished after insert")))
    }

    /// Read-only subject lookup; never creates.
    pub async fn get_user_id(&self, external_subject: &str) -> Result<Option<Uuid>, AppError> {
        let id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM users WHERE external_subject = $1")
                .bind(external_subject)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    pub async fn get_by_id(&self, user_id: Uuid) -> Result<Option<UserRow>, AppError> {
        Ok(sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Bumps the annual usage counter, resetting the rolling window first if
    /// it has expired (or was never started).
    ///
    /// Read-modify-write without a row lock: under contention at most one
    /// over-increment by 1 is tolerated.
    pub async fn increment_annual_usage(&self, user_id: Uuid) -> Result<UsageCounters, AppError> {
        let user = self
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("user_not_found"))?;

        let now = Utc::now();
        let new_count = if window_expired(user.annual_period_start, now) {
            sqlx::query(
                "UPDATE users SET annual_usage_count = 1, annual_period_start = $2 WHERE id = $1",
            )
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await?;
            1
        } else {
            sqlx::query("UPDATE users SET annual_usage_count = annual_usage_count + 1 WHERE id = $1")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            user.annual_usage_count + 1
        };

        Ok(UsageCounters {
            new_count,
            limit: user.annual_limit,
        })
    }

    async fn by_subject(&self, external_subject: &str) -> Result<Option<UserRow>, AppError> {
        Ok(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE external_subject = $1")
                .bind(external_subject)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}
