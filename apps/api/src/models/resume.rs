use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row in `resumes`. `parsed_summary` is an opaque JSON blob stored as
/// TEXT and parsed at read time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub storage_key: String,
    pub status: String,
    pub parsed_summary: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRow {
    /// Parses the stored summary blob, tolerating rows written before a parse
    /// completed (or with malformed contents) as `None`.
    pub fn parsed_data(&self) -> Option<serde_json::Value> {
        self.parsed_summary
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
    }
}

/// Derived child of a résumé; wholly replaced by each successful parse.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateSkillRow {
    pub id: i64,
    pub resume_id: Uuid,
    pub skill: String,
    pub experience_years: Option<f64>,
    pub proficiency: Option<String>,
}

/// Candidate skill as produced by a parse, before it has a row id.
#[derive(Debug, Clone)]
pub struct NewCandidateSkill {
    pub skill: String,
    pub experience_years: Option<f64>,
    pub proficiency: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(parsed_summary: Option<&str>) -> ResumeRow {
        ResumeRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            filename: "resume.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            storage_key: "resumes/x.pdf".to_string(),
            status: "ready".to_string(),
            parsed_summary: parsed_summary.map(String::from),
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parsed_data_round_trips_stored_json() {
        let r = row(Some(r#"{"profile":{"name":"Ada"},"sections":{}}"#));
        let data = r.parsed_data().unwrap();
        assert_eq!(data["profile"]["name"], "Ada");
    }

    #[test]
    fn test_parsed_data_is_none_before_parse() {
        assert!(row(None).parsed_data().is_none());
    }

    #[test]
    fn test_parsed_data_tolerates_malformed_blob() {
        assert!(row(Some("not-json")).parsed_data().is_none());
    }
}
