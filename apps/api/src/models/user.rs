use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row in `users`. Created lazily on the first authenticated request for
/// a given external subject; never destroyed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub external_subject: String,
    pub email: Option<String>,
    pub annual_limit: i32,
    pub annual_usage_count: i32,
    pub annual_period_start: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
