//! Consumes `parse_job`: text sources go straight to the NLP service,
//! file sources are fetched from object storage first. Writes the derived
//! requirement (and optional soft-skill) rows, then marks the job ready.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::job::{NewRequirement, NewSoftSkill};
use crate::models::status::DocumentStatus;
use crate::nlp_client::ParseJobRequest;
use crate::queue::ParseJobPayload;
use crate::state::AppState;

#[instrument(skip(state, payload), fields(job_id = %payload.job_id))]
pub async fn handle(state: AppState, payload: ParseJobPayload) -> Result<(), AppError> {
    if !state
        .repos
        .jobs
        .update_status(payload.job_id, DocumentStatus::Processing, None)
        .await?
    {
        info!("job gone or already ready, dropping job");
        return Ok(());
    }

    match parse_and_persist(&state, &payload).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let message = e.to_string();
            state
                .repos
                .jobs
                .update_status(
                    payload.job_id,
                    DocumentStatus::Error,
                    Some(&json!({ "message": message })),
                )
                .await?;
            Err(e)
        }
    }
}

async fn parse_and_persist(state: &AppState, payload: &ParseJobPayload) -> Result<(), AppError> {
    let request = if payload.source == "text" {
        ParseJobRequest::Text {
            text: payload.raw_text.clone().unwrap_or_default(),
        }
    } else {
        let storage_key = payload
            .storage_key
            .as_deref()
            .ok_or_else(|| AppError::Storage("file-sourced job without storage key".to_string()))?;
        let bytes = state.storage.get_object_bytes(storage_key).await?;
        ParseJobRequest::File {
            filename: payload.filename.clone().unwrap_or_default(),
            mime_type: payload.mime_type.clone(),
            content_b64: BASE64.encode(&bytes),
        }
    };

    let parsed = state.nlp.parse_job(&request).await?;

    let requirements: Vec<NewRequirement> = parsed
        .requirements
        .iter()
        .map(|r| NewRequirement {
            skill: r.skill.clone(),
            importance: normalize_importance(&r.importance),
            inferred: normalize_inferred(&r.inferred),
        })
        .collect();
    let soft_skills: Vec<NewSoftSkill> = parsed
        .soft_skills
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|s| NewSoftSkill {
            skill: s.skill.clone(),
            value: s.value,
        })
        .collect();

    state
        .repos
        .jobs
        .replace_children(payload.job_id, &requirements, &soft_skills)
        .await?;

    let mut summary = json!({
        "highlights": parsed.highlights,
        "overview": parsed.summary,
    });
    if let Some(onet) = parsed.onet {
        summary["onet"] = onet;
    }
    state
        .repos
        .jobs
        .update_status(payload.job_id, DocumentStatus::Ready, Some(&summary))
        .await?;

    info!(requirements = requirements.len(), "job description parsed");
    Ok(())
}

/// The NLP service reports `importance` loosely (number, numeric string, or
/// absent). Normalize to a number in [0,1]; unusable values fall back to 0.5.
pub fn normalize_importance(raw: &Value) -> f64 {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.unwrap_or(0.5).clamp(0.0, 1.0)
}

/// `inferred` is a boolean only when the service says boolean `true`.
pub fn normalize_inferred(raw: &Value) -> bool {
    matches!(raw, Value::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_number_passes_through() {
        assert_eq!(normalize_importance(&json!(0.9)), 0.9);
        assert_eq!(normalize_importance(&json!(0.0)), 0.0);
    }

    #[test]
    fn test_importance_clamps_out_of_range() {
        assert_eq!(normalize_importance(&json!(1.7)), 1.0);
        assert_eq!(normalize_importance(&json!(-0.2)), 0.0);
    }

    #[test]
    fn test_importance_parses_numeric_strings() {
        assert_eq!(normalize_importance(&json!("0.4")), 0.4);
        assert_eq!(normalize_importance(&json!(" 0.75 ")), 0.75);
    }

    #[test]
    fn test_importance_defaults_on_garbage() {
        assert_eq!(normalize_importance(&json!("high")), 0.5);
        assert_eq!(normalize_importance(&Value::Null), 0.5);
        assert_eq!(normalize_importance(&json!({"weight": 1})), 0.5);
    }

    #[test]
    fn test_inferred_is_strict_boolean() {
        assert!(normalize_inferred(&json!(true)));
        assert!(!normalize_inferred(&json!(false)));
        assert!(!normalize_inferred(&json!(1)));
        assert!(!normalize_inferred(&json!("true")));
        assert!(!normalize_inferred(&Value::Null));
    }
}
