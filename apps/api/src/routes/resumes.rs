//! Résumé ingestion and reads.
//!
//! The write path is ensure-user → validate → persist `queued` row → upload
//! bytes → enqueue → 202. The 202 is only sent once the enqueue succeeded;
//! if it fails the row stays `queued` for operational recovery.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::CandidateSkillRow;
use crate::queue::{ParseResumePayload, PARSE_RESUME_QUEUE};
use crate::state::AppState;
use crate::storage::{is_allowed_mime_type, object_key, MAX_UPLOAD_BYTES};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeListItem {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDetailResponse {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub status: String,
    pub parsed_data: Option<Value>,
    pub skills: Vec<CandidateSkillRow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /api/v1/resumes. Multipart upload, field `file`.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::InvalidInput("file_required"))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("resume").to_string();
            let mime_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| AppError::PayloadTooLarge)?
                .to_vec();
            upload = Some((filename, mime_type, bytes));
        }
    }

    let (filename, mime_type, bytes) = upload.ok_or(AppError::InvalidInput("file_required"))?;
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::PayloadTooLarge);
    }
    if !is_allowed_mime_type(&mime_type) {
        return Err(AppError::UnsupportedMediaType(mime_type));
    }

    let id = Uuid::new_v4();
    let storage_key = object_key("resumes", id, &filename, &mime_type);

    state
        .repos
        .resumes
        .create(id, auth.user.id, &filename, &mime_type, &storage_key)
        .await?;
    state.storage.put_object(&storage_key, bytes, &mime_type).await?;
    state
        .queue
        .enqueue(
            PARSE_RESUME_QUEUE,
            &ParseResumePayload {
                resume_id: id,
                storage_key,
                filename,
                mime_type,
                user_id: auth.user.id,
            },
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"id": id, "status": "queued"})),
    ))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ResumeListItem>>, AppError> {
    let rows = state.repos.resumes.list_for_user(auth.user.id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| ResumeListItem {
                id: r.id,
                filename: r.filename,
                mime_type: r.mime_type,
                status: r.status,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect(),
    ))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDetailResponse>, AppError> {
    let (row, skills) = state
        .repos
        .resumes
        .get_for_user(id, auth.user.id)
        .await?
        .ok_or(AppError::NotFound("resume_not_found"))?;

    let parsed_data = row.parsed_data();
    Ok(Json(ResumeDetailResponse {
        id: row.id,
        filename: row.filename,
        mime_type: row.mime_type,
        status: row.status,
        parsed_data,
        skills,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repos.resumes.soft_delete(id, auth.user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("resume_not_found"))
    }
}
