//! Consumes `compute_match`: reads both parsed documents, delegates the
//! similarity computation to the NLP service, builds the enriched match
//! summary, and attaches the persisted result to the match job.

use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::CandidateSkillRow;
use crate::models::status::MatchStatus;
use crate::nlp_client::{MatchRequest, MatchResponse};
use crate::queue::ComputeMatchPayload;
use crate::state::AppState;

/// A requirement is considered covered once its similarity reaches this.
const SIMILARITY_THRESHOLD: f64 = 0.5;

#[instrument(skip(state, payload), fields(match_job_id = %payload.match_job_id))]
pub async fn handle(state: AppState, payload: ComputeMatchPayload) -> Result<(), AppError> {
    // queued → running. Zero rows means the job already completed.
    if !state
        .repos
        .matches
        .update_status(payload.match_job_id, MatchStatus::Running, None, None)
        .await?
    {
        info!("match job already completed, dropping delivery");
        return Ok(());
    }

    match compute_and_persist(&state, &payload).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let message = e.to_string();
            state
                .repos
                .matches
                .update_status(
                    payload.match_job_id,
                    MatchStatus::Failed,
                    Some(&message),
                    None,
                )
                .await?;
            Err(e)
        }
    }
}

async fn compute_and_persist(
    state: &AppState,
    payload: &ComputeMatchPayload,
) -> Result<(), AppError> {
    let (resume, skills) = state
        .repos
        .resumes
        .get_for_user(payload.resume_id, payload.user_id)
        .await?
        .ok_or(AppError::NotFound("resume_not_found"))?;
    let (_job, requirements, _soft_skills) = state
        .repos
        .jobs
        .get_for_user(payload.job_id, payload.user_id)
        .await?
        .ok_or(AppError::NotFound("job_not_found"))?;

    let request = MatchRequest {
        candidate_skills: skills
            .iter()
            .map(|s| {
                json!({
                    "skill": s.skill,
                    "experience_years": s.experience_years,
                    "proficiency": s.proficiency,
                })
            })
            .collect(),
        requirements: requirements
            .iter()
            .map(|r| {
                json!({
                    "skill": r.skill,
                    "importance": r.importance,
                    "inferred": r.inferred,
                })
            })
            .collect(),
    };

    let response = state.nlp.compute_match(&request).await?;

    let summary = build_match_summary(&response, resume.parsed_data().as_ref(), &skills);
    let score = response
        .score
        .or(response.summary.overall_match_score)
        .unwrap_or(0.0);

    let result_id = Uuid::new_v4();
    state
        .repos
        .matches
        .insert_result(
            result_id,
            payload.user_id,
            payload.resume_id,
            payload.job_id,
            score,
            &summary,
        )
        .await?;
    state
        .repos
        .matches
        .update_status(
            payload.match_job_id,
            MatchStatus::Completed,
            None,
            Some(result_id),
        )
        .await?;

    info!(%result_id, score, "match computed");
    Ok(())
}

/// Builds the enriched match summary persisted with the result.
///
/// Shape: `overall_match_score` prefers the top-level score, then the
/// summary's own figure; `candidate` is assembled from the résumé profile
/// plus its (deduplicated, ascending-sorted) skill rows; every detail gets
/// the three-case comment template.
pub fn build_match_summary(
    response: &MatchResponse,
    resume_summary: Option<&Value>,
    skills: &[CandidateSkillRow],
) -> Value {
    let overall = response.score.or(response.summary.overall_match_score);

    let profile = resume_summary
        .and_then(|s| s.get("profile"))
        .cloned()
        .unwrap_or(Value::Null);
    let mut skill_names: Vec<&str> = skills.iter().map(|s| s.skill.as_str()).collect();
    skill_names.sort_unstable();
    skill_names.dedup();

    let candidate = json!({
        "name": profile.get("name").cloned().unwrap_or(Value::Null),
        "skills": skill_names,
        "experience_years": profile.get("experience_years").cloned().unwrap_or(Value::Null),
        "degrees": profile.get("degrees").cloned().unwrap_or(Value::Null),
        "certifications": profile.get("certifications").cloned().unwrap_or(Value::Null),
        "summary": profile.get("summary").cloned().unwrap_or(Value::Null),
    });

    let details: Vec<Value> = response
        .summary
        .details
        .iter()
        .map(|d| {
            let matched = d.similarity >= SIMILARITY_THRESHOLD;
            let comments = if matched {
                match d.matched_skill.as_deref() {
                    Some(skill) => {
                        format!("Matched via {skill} (similarity {:.2})", d.similarity)
                    }
                    None => format!("Matched with similarity {:.2}", d.similarity),
                }
            } else {
                "No close match found".to_string()
            };
            json!({
                "requirement": d.requirement,
                "similarity": d.similarity,
                "candidate_has_experience": matched,
                "comments": comments,
            })
        })
        .collect();

    let strengths: Vec<String> = response
        .summary
        .strengths
        .iter()
        .map(|s| format!("{} (similarity {:.2})", s.requirement, s.similarity))
        .collect();
    let weaknesses: Vec<String> = response
        .summary
        .gaps
        .iter()
        .map(|g| format!("{} (importance {:.2})", g.requirement, g.importance))
        .collect();

    json!({
        "overall_match_score": overall,
        "candidate": candidate,
        "details": details,
        "strengths": strengths,
        "weaknesses": weaknesses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill_row(skill: &str) -> CandidateSkillRow {
        CandidateSkillRow {
            id: 0,
            resume_id: Uuid::new_v4(),
            skill: skill.to_string(),
            experience_years: None,
            proficiency: None,
        }
    }

    fn response(json_body: &str) -> MatchResponse {
        serde_json::from_str(json_body).unwrap()
    }

    #[test]
    fn test_matched_via_named_skill_comment() {
        let resp = response(
            r#"{"score": 0.8, "summary": {"details": [
                {"requirement": "python", "similarity": 0.91, "matched_skill": "python"}
            ]}}"#,
        );
        let summary = build_match_summary(&resp, None, &[]);
        let detail = &summary["details"][0];
        assert_eq!(detail["candidate_has_experience"], true);
        assert_eq!(detail["comments"], "Matched via python (similarity 0.91)");
    }

    #[test]
    fn test_matched_without_named_skill_comment() {
        let resp = response(
            r#"{"summary": {"details": [
                {"requirement": "sql", "similarity": 0.64}
            ]}}"#,
        );
        let summary = build_match_summary(&resp, None, &[]);
        assert_eq!(
            summary["details"][0]["comments"],
            "Matched with similarity 0.64"
        );
    }

    #[test]
    fn test_unmatched_comment_and_flag() {
        let resp = response(
            r#"{"summary": {"details": [
                {"requirement": "kubernetes", "similarity": 0.2, "matched_skill": "docker"}
            ]}}"#,
        );
        let summary = build_match_summary(&resp, None, &[]);
        let detail = &summary["details"][0];
        assert_eq!(detail["candidate_has_experience"], false);
        assert_eq!(detail["comments"], "No close match found");
    }

    #[test]
    fn test_threshold_boundary_counts_as_matched() {
        let resp = response(
            r#"{"summary": {"details": [
                {"requirement": "go", "similarity": 0.5}
            ]}}"#,
        );
        let summary = build_match_summary(&resp, None, &[]);
        assert_eq!(summary["details"][0]["candidate_has_experience"], true);
    }

    #[test]
    fn test_overall_prefers_top_level_score() {
        let resp = response(r#"{"score": 0.72, "summary": {"overall_match_score": 0.5}}"#);
        let summary = build_match_summary(&resp, None, &[]);
        assert_eq!(summary["overall_match_score"], 0.72);
    }

    #[test]
    fn test_overall_falls_back_to_summary_score() {
        let resp = response(r#"{"summary": {"overall_match_score": 0.5}}"#);
        let summary = build_match_summary(&resp, None, &[]);
        assert_eq!(summary["overall_match_score"], 0.5);
    }

    #[test]
    fn test_candidate_skills_deduped_and_sorted() {
        let resp = response(r#"{"summary": {}}"#);
        let skills = vec![skill_row("sql"), skill_row("python"), skill_row("sql")];
        let summary = build_match_summary(&resp, None, &skills);
        assert_eq!(summary["candidate"]["skills"], json!(["python", "sql"]));
    }

    #[test]
    fn test_candidate_block_pulls_from_profile() {
        let resp = response(r#"{"summary": {}}"#);
        let resume_summary = json!({
            "profile": {
                "name": "Ada Lovelace",
                "experience_years": 7,
                "degrees": ["BSc Mathematics"],
                "certifications": [],
                "summary": "Backend engineer"
            },
            "sections": {},
            "statistics": {}
        });
        let summary = build_match_summary(&resp, Some(&resume_summary), &[]);
        assert_eq!(summary["candidate"]["name"], "Ada Lovelace");
        assert_eq!(summary["candidate"]["experience_years"], 7);
        assert_eq!(summary["candidate"]["degrees"], json!(["BSc Mathematics"]));
    }

    #[test]
    fn test_strengths_and_weaknesses_formatting() {
        let resp = response(
            r#"{"summary": {
                "strengths": [{"requirement": "python", "similarity": 0.87}],
                "gaps": [{"requirement": "kubernetes", "importance": 0.9}]
            }}"#,
        );
        let summary = build_match_summary(&resp, None, &[]);
        assert_eq!(summary["strengths"], json!(["python (similarity 0.87)"]));
        assert_eq!(summary["weaknesses"], json!(["kubernetes (importance 0.90)"]));
    }

    #[test]
    fn test_missing_profile_yields_nulls_not_panics() {
        let resp = response(r#"{"summary": {}}"#);
        let summary = build_match_summary(&resp, None, &[]);
        assert_eq!(summary["candidate"]["name"], Value::Null);
        assert_eq!(summary["candidate"]["skills"], json!([]));
    }
}
