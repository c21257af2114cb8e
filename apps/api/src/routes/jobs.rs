//! Job-description ingestion and reads. A job arrives either as JSON
//! `{title, text}` or as a multipart `file` + `title` form; both land in a
//! `queued` row and a `parse_job` enqueue.

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::job::{RequirementRow, SoftSkillRow};
use crate::queue::{ParseJobPayload, PARSE_JOB_QUEUE};
use crate::state::AppState;
use crate::storage::{is_allowed_mime_type, object_key, MAX_UPLOAD_BYTES};

#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListItem {
    pub id: Uuid,
    pub title: String,
    pub source: String,
    pub filename: Option<String>,
    pub mime_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailResponse {
    pub id: Uuid,
    pub title: String,
    pub source: String,
    pub filename: Option<String>,
    pub mime_type: String,
    pub status: String,
    pub parsed_data: Option<Value>,
    pub requirements: Vec<RequirementRow>,
    #[serde(rename = "soft_skills")]
    pub soft_skills: Vec<SoftSkillRow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /api/v1/jobs. Accepts JSON `{title, text}` or multipart `file` + `title`.
pub async fn handle_create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    request: Request,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|_| AppError::InvalidInput("file_or_text_required"))?;
        create_from_file(state, auth, multipart).await
    } else {
        let Json(body) = Json::<CreateJobBody>::from_request(request, &state)
            .await
            .map_err(|_| AppError::InvalidInput("file_or_text_required"))?;
        create_from_text(state, auth, body).await
    }
}

async fn create_from_text(
    state: AppState,
    auth: AuthUser,
    body: CreateJobBody,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let title = body
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::InvalidInput("title_required"))?;
    let text = body
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::InvalidInput("file_or_text_required"))?;

    let id = Uuid::new_v4();
    state
        .repos
        .jobs
        .create(crate::repos::jobs::NewJob {
            id,
            user_id: auth.user.id,
            title,
            source: "text",
            filename: None,
            mime_type: "text/plain",
            storage_key: None,
            raw_text: Some(text),
        })
        .await?;

    state
        .queue
        .enqueue(
            PARSE_JOB_QUEUE,
            &ParseJobPayload {
                job_id: id,
                source: "text".to_string(),
                storage_key: None,
                filename: None,
                mime_type: "text/plain".to_string(),
                raw_text: Some(text.to_string()),
                user_id: auth.user.id,
                title: Some(title.to_string()),
            },
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"id": id, "status": "queued"})),
    ))
}

async fn create_from_file(
    state: AppState,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut title: Option<String> = None;
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::InvalidInput("file_or_text_required"))?
    {
        match field.name() {
            Some("title") => {
                title = field.text().await.ok().map(|t| t.trim().to_string());
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("job").to_string();
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
            _ => {}
        }
    }

    let title = title
        .filter(|t| !t.is_empty())
        .ok_or(AppError::InvalidInput("title_required"))?;
    let (filename, mime_type, bytes) =
        upload.ok_or(AppError::InvalidInput("file_or_text_required"))?;
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::PayloadTooLarge);
    }
    if !is_allowed_mime_type(&mime_type) {
        return Err(AppError::UnsupportedMediaType(mime_type));
    }

    let id = Uuid::new_v4();
    let storage_key = object_key("jobs", id, &filename, &mime_type);

    state
        .repos
        .jobs
        .create(crate::repos::jobs::NewJob {
            id,
            user_id: auth.user.id,
            title: &title,
            source: "file",
            filename: Some(&filename),
            mime_type: &mime_type,
            storage_key: Some(&storage_key),
            raw_text: None,
        })
        .await?;
    state.storage.put_object(&storage_key, bytes, &mime_type).await?;
    state
        .queue
        .enqueue(
            PARSE_JOB_QUEUE,
            &ParseJobPayload {
                job_id: id,
                source: "file".to_string(),
                storage_key: Some(storage_key),
                filename: Some(filename),
                mime_type,
                raw_text: None,
                user_id: auth.user.id,
                title: Some(title),
            },
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"id": id, "status": "queued"})),
    ))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<JobListItem>>, AppError> {
    let rows = state.repos.jobs.list_for_user(auth.user.id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|j| JobListItem {
                id: j.id,
                title: j.title,
                source: j.source,
                filename: j.filename,
                mime_type: j.mime_type,
                status: j.status,
                created_at: j.created_at,
                updated_at: j.updated_at,
            })
            .collect(),
    ))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobDetailResponse>, AppError> {
    let (row, requirements, soft_skills) = state
        .repos
        .jobs
        .get_for_user(id, auth.user.id)
        .await?
        .ok_or(AppError::NotFound("job_not_found"))?;

    let parsed_data = row.parsed_data();
    Ok(Json(JobDetailResponse {
        id: row.id,
        title: row.title,
        source: row.source,
        filename: row.filename,
        mime_type: row.mime_type,
        status: row.status,
        parsed_data,
        requirements,
        soft_skills,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repos.jobs.soft_delete(id, auth.user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("job_not_found"))
    }
}
