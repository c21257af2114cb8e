use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row in `job_descriptions`. `source` is `"file"` or `"text"`; file-backed
/// jobs carry a `storage_key`, text-backed jobs carry `raw_text`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub source: String,
    pub filename: Option<String>,
    pub mime_type: String,
    pub storage_key: Option<String>,
    pub raw_text: Option<String>,
    pub status: String,
    pub parsed_summary: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    pub fn parsed_data(&self) -> Option<serde_json::Value> {
        self.parsed_summary
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
    }
}

/// Derived child of a job description. `importance` is normalized to [0,1]
/// before it is written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RequirementRow {
    pub id: i64,
    pub job_id: Uuid,
    pub skill: String,
    pub importance: f64,
    pub inferred: bool,
}

/// Derived child of a job description, present only when the NLP service
/// reports soft skills.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SoftSkillRow {
    pub id: i64,
    pub job_id: Uuid,
    pub skill: String,
    pub value: f64,
}

/// Requirement as produced by a parse, importance already normalized.
#[derive(Debug, Clone)]
pub struct NewRequirement {
    pub skill: String,
    pub importance: f64,
    pub inferred: bool,
}

#[derive(Debug, Clone)]
pub struct NewSoftSkill {
    pub skill: String,
    pub value: f64,
}
