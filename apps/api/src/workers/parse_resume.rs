//! Consumes `parse_resume`: fetch the uploaded bytes, delegate extraction to
//! the NLP service, replace the derived skill set, mark the résumé ready.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::resume::NewCandidateSkill;
use crate::models::status::DocumentStatus;
use crate::nlp_client::ParseResumeRequest;
use crate::queue::ParseResumePayload;
use crate::state::AppState;

#[instrument(skip(state, payload), fields(resume_id = %payload.resume_id))]
pub async fn handle(state: AppState, payload: ParseResumePayload) -> Result<(), AppError> {
    // queued → processing. Zero rows: concurrently soft-deleted or already
    // ready (redelivery), either way there is nothing to do.
    if !state
        .repos
        .resumes
        .update_status(payload.resume_id, DocumentStatus::Processing, None)
        .await?
    {
        info!("resume gone or already ready, dropping job");
        return Ok(());
    }

    match parse_and_persist(&state, &payload).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let message = e.to_string();
            state
                .repos
                .resumes
                .update_status(
                    payload.resume_id,
                    DocumentStatus::Error,
                    Some(&json!({ "message": message })),
                )
                .await?;
            // Rethrow so the queue records the failure and applies its
            // retry policy.
            Err(e)
        }
    }
}

async fn parse_and_persist(state: &AppState, payload: &ParseResumePayload) -> Result<(), AppError> {
    let bytes = state.storage.get_object_bytes(&payload.storage_key).await?;

    let parsed = state
        .nlp
        .parse_resume(&ParseResumeRequest {
            filename: payload.filename.clone(),
            mime_type: payload.mime_type.clone(),
            content_b64: BASE64.encode(&bytes),
        })
        .await?;

    let skills: Vec<NewCandidateSkill> = parsed
        .skills
        .iter()
        .map(|s| NewCandidateSkill {
            skill: s.skill.clone(),
            experience_years: s.experience_years,
            proficiency: s.proficiency.clone(),
        })
        .collect();
    state
        .repos
        .resumes
        .replace_children(payload.resume_id, &skills)
        .await?;

    let summary = json!({
        "sections": parsed.sections,
        "profile": parsed.profile,
        "statistics": parsed.statistics,
    });
    state
        .repos
        .resumes
        .update_status(payload.resume_id, DocumentStatus::Ready, Some(&summary))
        .await?;

    info!(skills = skills.len(), "resume parsed");
    Ok(())
}
