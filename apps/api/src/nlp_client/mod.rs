//! NLP client: the single point of entry for all calls to the external
//! parsing/matching service.
//!
//! No other module may talk to the NLP service directly. The client makes a
//! single attempt per call with finite connect/request timeouts; retry policy
//! belongs to the queue that drives the calling worker.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NlpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("NLP service error (status {status}): {message}")]
    Api { status: u16, message: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

/// `POST /parse/resume` request body.
#[derive(Debug, Serialize)]
pub struct ParseResumeRequest {
    pub filename: String,
    pub mime_type: String,
    pub content_b64: String,
}

/// A skill extracted from a résumé.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlpCandidateSkill {
    pub skill: String,
    #[serde(default)]
    pub experience_years: Option<f64>,
    #[serde(default)]
    pub proficiency: Option<String>,
}

/// `POST /parse/resume` response.
#[derive(Debug, Deserialize)]
pub struct ParsedResume {
    #[serde(default)]
    pub skills: Vec<NlpCandidateSkill>,
    #[serde(default)]
    pub sections: Value,
    #[serde(default)]
    pub profile: Value,
    #[serde(default)]
    pub statistics: Value,
}

/// `POST /parse/job` request body: file-backed uploads send content, text
/// sources send the raw text.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ParseJobRequest {
    File {
        filename: String,
        mime_type: String,
        content_b64: String,
    },
    Text {
        text: String,
    },
}

/// A requirement extracted from a job description. `importance` and
/// `inferred` arrive loosely typed and are normalized by the match worker.
#[derive(Debug, Clone, Deserialize)]
pub struct NlpRequirement {
    pub skill: String,
    #[serde(default)]
    pub importance: Value,
    #[serde(default)]
    pub inferred: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NlpSoftSkill {
    pub skill: String,
    #[serde(default)]
    pub value: f64,
}

/// `POST /parse/job` response.
#[derive(Debug, Deserialize)]
pub struct ParsedJob {
    #[serde(default)]
    pub requirements: Vec<NlpRequirement>,
    #[serde(default)]
    pub highlights: Value,
    #[serde(default)]
    pub summary: Value,
    #[serde(default)]
    pub onet: Option<Value>,
    #[serde(default)]
    pub soft_skills: Option<Vec<NlpSoftSkill>>,
}

/// `POST /match` request body.
#[derive(Debug, Serialize)]
pub struct MatchRequest {
    pub candidate_skills: Vec<Value>,
    pub requirements: Vec<Value>,
}

/// One per-requirement comparison in the match response.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchDetail {
    pub requirement: String,
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub matched_skill: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchStrength {
    pub requirement: String,
    #[serde(default)]
    pub similarity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchGap {
    pub requirement: String,
    #[serde(default)]
    pub importance: f64,
}

#[derive(Debug, Deserialize)]
pub struct MatchSummary {
    #[serde(default)]
    pub details: Vec<MatchDetail>,
    #[serde(default)]
    pub strengths: Vec<MatchStrength>,
    #[serde(default)]
    pub gaps: Vec<MatchGap>,
    #[serde(default)]
    pub overall_match_score: Option<f64>,
}

/// `POST /match` response.
#[derive(Debug, Deserialize)]
pub struct MatchResponse {
    #[serde(default)]
    pub score: Option<f64>,
    pub summary: MatchSummary,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single NLP client shared by all workers.
#[derive(Clone)]
pub struct NlpClient {
    client: Client,
    base_url: String,
}

impl NlpClient {
    pub fn new(base_url: String, connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(connect_timeout)
                .timeout(request_timeout)
                .build()
                .expect("failed to build NLP HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn parse_resume(&self, request: &ParseResumeRequest) -> Result<ParsedResume, NlpError> {
        self.post("/parse/resume", request).await
    }

    pub async fn parse_job(&self, request: &ParseJobRequest) -> Result<ParsedJob, NlpError> {
        self.post("/parse/job", request).await
    }

    pub async fn compute_match(&self, request: &MatchRequest) -> Result<MatchResponse, NlpError> {
        self.post("/match", request).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, NlpError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NlpError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(%url, "NLP call succeeded");
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_resume_deserializes() {
        let json = r#"{
            "skills": [
                {"skill": "python", "experience_years": 4.5, "proficiency": "advanced"},
                {"skill": "sql"}
            ],
            "sections": {"experience": ["..."]},
            "profile": {"name": "Ada"},
            "statistics": {"word_count": 420}
        }"#;
        let parsed: ParsedResume = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.skills.len(), 2);
        assert_eq!(parsed.skills[0].skill, "python");
        assert_eq!(parsed.skills[0].experience_years, Some(4.5));
        assert!(parsed.skills[1].proficiency.is_none());
        assert_eq!(parsed.profile["name"], "Ada");
    }

    #[test]
    fn test_parsed_job_tolerates_loose_requirement_typing() {
        let json = r#"{
            "requirements": [
                {"skill": "python", "importance": 0.9, "inferred": false},
                {"skill": "docker", "importance": "0.4", "inferred": 1}
            ],
            "highlights": ["fast-paced team"],
            "summary": {"overview": "backend role"},
            "soft_skills": [{"skill": "communication", "value": 0.8}]
        }"#;
        let parsed: ParsedJob = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.requirements.len(), 2);
        assert_eq!(parsed.requirements[1].importance, Value::String("0.4".into()));
        assert!(parsed.onet.is_none());
        assert_eq!(parsed.soft_skills.unwrap()[0].skill, "communication");
    }

    #[test]
    fn test_match_response_deserializes() {
        let json = r#"{
            "score": 0.72,
            "summary": {
                "details": [
                    {"requirement": "python", "similarity": 0.91, "matched_skill": "python"},
                    {"requirement": "kubernetes", "similarity": 0.2}
                ],
                "strengths": [{"requirement": "python", "similarity": 0.91}],
                "gaps": [{"requirement": "kubernetes", "importance": 0.7}],
                "overall_match_score": 0.7
            }
        }"#;
        let resp: MatchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.score, Some(0.72));
        assert_eq!(resp.summary.details.len(), 2);
        assert_eq!(resp.summary.details[1].matched_skill, None);
        assert_eq!(resp.summary.overall_match_score, Some(0.7));
    }

    #[test]
    fn test_parse_job_request_serializes_untagged() {
        let text = ParseJobRequest::Text {
            text: "Looking for Python skills".into(),
        };
        let v = serde_json::to_value(&text).unwrap();
        assert_eq!(v, serde_json::json!({"text": "Looking for Python skills"}));

        let file = ParseJobRequest::File {
            filename: "jd.pdf".into(),
            mime_type: "application/pdf".into(),
            content_b64: "aGk=".into(),
        };
        let v = serde_json::to_value(&file).unwrap();
        assert_eq!(v["filename"], "jd.pdf");
        assert!(v.get("text").is_none());
    }
}
