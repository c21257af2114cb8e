use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row in `match_jobs`. `result_id` is non-null iff `status = completed`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchJobRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub error_message: Option<String>,
    pub result_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row in `matches`: the persisted outcome of a completed match job.
/// `summary` is the enriched match summary JSON stored as TEXT.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchResultRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub score: f64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl MatchResultRow {
    pub fn summary_data(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.summary).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_data_parses_stored_blob() {
        let row = MatchResultRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            resume_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            score: 0.72,
            summary: r#"{"overall_match_score":0.72,"strengths":[]}"#.to_string(),
            created_at: Utc::now(),
        };
        let data = row.summary_data().unwrap();
        assert_eq!(data["overall_match_score"], 0.72);
    }
}
