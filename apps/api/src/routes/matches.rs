//! Match creation and reads.
//!
//! Creation validates input, then existence, then readiness of both source
//! documents, and only then consults the quota gate, so a refused request
//! never burns allowance on entities that would have 404'd or 409'd.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::status::DocumentStatus;
use crate::queue::{ComputeMatchPayload, COMPUTE_MATCH_QUEUE};
use crate::quota::enforce_match_quota;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchBody {
    pub resume_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchListItem {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /api/v1/matches
pub async fn handle_create_match(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<CreateMatchBody>>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Some(Json(body)) = body else {
        return Err(AppError::InvalidInput("resumeId_and_jobId_required"));
    };
    let (Some(resume_id), Some(job_id)) = (body.resume_id, body.job_id) else {
        return Err(AppError::InvalidInput("resumeId_and_jobId_required"));
    };

    let (resume, _skills) = state
        .repos
        .resumes
        .get_for_user(resume_id, auth.user.id)
        .await?
        .ok_or(AppError::NotFound("resume_not_found"))?;
    let (job, _reqs, _soft) = state
        .repos
        .jobs
        .get_for_user(job_id, auth.user.id)
        .await?
        .ok_or(AppError::NotFound("job_not_found"))?;

    if !DocumentStatus::is_ready(&resume.status) {
        return Err(AppError::PreconditionFailed("resume_not_ready"));
    }
    if !DocumentStatus::is_ready(&job.status) {
        return Err(AppError::PreconditionFailed("job_not_ready"));
    }

    enforce_match_quota(&state.repos.users, &auth.user, auth.pro_member).await?;

    let id = Uuid::new_v4();
    state
        .repos
        .matches
        .create_job(id, auth.user.id, resume_id, job_id)
        .await?;
    state
        .queue
        .enqueue(
            COMPUTE_MATCH_QUEUE,
            &ComputeMatchPayload {
                match_job_id: id,
                resume_id,
                job_id,
                user_id: auth.user.id,
            },
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"id": id, "status": "queued"})),
    ))
}

/// GET /api/v1/matches
pub async fn handle_list_matches(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<MatchListItem>>, AppError> {
    let rows = state.repos.matches.list_for_user(auth.user.id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|m| MatchListItem {
                id: m.id,
                resume_id: m.resume_id,
                job_id: m.job_id,
                status: m.status,
                created_at: m.created_at,
                updated_at: m.updated_at,
            })
            .collect(),
    ))
}

/// GET /api/v1/matches/:id: the job row plus, once completed, the attached
/// result.
pub async fn handle_get_match(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let job = state
        .repos
        .matches
        .get_job_for_user(id, auth.user.id)
        .await?
        .ok_or(AppError::NotFound("match_not_found"))?;

    let result = match job.result_id {
        Some(result_id) => {
            state
                .repos
                .matches
                .get_result_for_user(result_id, auth.user.id)
                .await?
        }
        None => None,
    };

    Ok(Json(json!({
        "id": job.id,
        "status": job.status,
        "resumeId": job.resume_id,
        "jobId": job.job_id,
        "error": job.error_message,
        "match": result.map(|r| json!({
            "id": r.id,
            "score": r.score,
            "summary": r.summary_data(),
            "createdAt": r.created_at,
        })),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_body_accepts_camel_case_ids() {
        let body: CreateMatchBody = serde_json::from_str(
            r#"{"resumeId":"d5d9f3c2-8f46-4f2d-9a3d-2a4a5a6b7c8d","jobId":"2b8c7d6e-5f4a-4b3c-9d2e-1f0a9b8c7d6e"}"#,
        )
        .unwrap();
        assert!(body.resume_id.is_some());
        assert!(body.job_id.is_some());
    }

    #[test]
    fn test_create_body_tolerates_missing_ids() {
        let body: CreateMatchBody = serde_json::from_str(r#"{"resumeId":null}"#).unwrap();
        assert!(body.resume_id.is_none());
        assert!(body.job_id.is_none());
    }
}
