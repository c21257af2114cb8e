//! Bridges the domain event bus to per-user realtime push.
//!
//! One listener per event family, each registered under a distinct tag so
//! a re-run of boot cannot double-subscribe. On each event the authoritative
//! row is re-read joined with the owner's external subject; missing rows and
//! null subjects are dropped silently. Bridge failures are logged and
//! dropped; push is best-effort and the REST reads stay authoritative.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::events::DomainEvent;
use crate::state::AppState;

/// Registers the three bridge listeners. Safe to call more than once.
pub fn register_listeners(state: &AppState) {
    let resume_state = state.clone();
    state.events.register_listener("realtime.resume", move |event| {
        let state = resume_state.clone();
        async move {
            if let DomainEvent::ResumeStatusChanged { id, .. } = event {
                if let Err(e) = push_resume_update(&state, id).await {
                    debug!("resume push dropped: {e}");
                }
            }
        }
    });

    let job_state = state.clone();
    state.events.register_listener("realtime.job", move |event| {
        let state = job_state.clone();
        async move {
            if let DomainEvent::JobStatusChanged { id, .. } = event {
                if let Err(e) = push_job_update(&state, id).await {
                    debug!("job push dropped: {e}");
                }
            }
        }
    });

    let match_state = state.clone();
    state.events.register_listener("realtime.match", move |event| {
        let state = match_state.clone();
        async move {
            if let DomainEvent::MatchStatusChanged { id, .. } = event {
                if let Err(e) = push_match_update(&state, id).await {
                    debug!("match push dropped: {e}");
                }
            }
        }
    });
}

#[derive(sqlx::FromRow)]
struct OwnedStatusRow {
    status: String,
    title: Option<String>,
    external_subject: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

async fn fetch_owned_row(
    pool: &PgPool,
    sql: &str,
    id: Uuid,
) -> Result<Option<OwnedStatusRow>, sqlx::Error> {
    sqlx::query_as::<_, OwnedStatusRow>(sql).bind(id).fetch_optional(pool).await
}

async fn push_resume_update(state: &AppState, id: Uuid) -> anyhow::Result<()> {
    let row = fetch_owned_row(
        state.repos.pool(),
        r#"
        SELECT r.status, NULL::text AS title, u.external_subject, r.created_at, r.updated_at
        FROM resumes r JOIN users u ON u.id = r.user_id
        WHERE r.id = $1 AND r.is_deleted = FALSE
        "#,
        id,
    )
    .await?;

    let Some(row) = row else { return Ok(()) };
    let Some(subject) = row.external_subject else { return Ok(()) };

    state
        .realtime
        .emit(
            &subject,
            "resume:update",
            json!({
                "id": id,
                "status": row.status,
                "createdAt": row.created_at,
                "updatedAt": row.updated_at,
            }),
        )
        .await;
    Ok(())
}

async fn push_job_update(state: &AppState, id: Uuid) -> anyhow::Result<()> {
    let row = fetch_owned_row(
        state.repos.pool(),
        r#"
        SELECT j.status, j.title, u.external_subject, j.created_at, j.updated_at
        FROM job_descriptions j JOIN users u ON u.id = j.user_id
        WHERE j.id = $1 AND j.is_deleted = FALSE
        "#,
        id,
    )
    .await?;

    let Some(row) = row else { return Ok(()) };
    let Some(subject) = row.external_subject else { return Ok(()) };

    state
        .realtime
        .emit(
            &subject,
            "job:update",
            json!({
                "id": id,
                "title": row.title,
                "status": row.status,
                "createdAt": row.created_at,
                "updatedAt": row.updated_at,
            }),
        )
        .await;
    Ok(())
}

async fn push_match_update(state: &AppState, id: Uuid) -> anyhow::Result<()> {
    let row = fetch_owned_row(
        state.repos.pool(),
        r#"
        SELECT m.status, NULL::text AS title, u.external_subject, m.created_at, m.updated_at
        FROM match_jobs m JOIN users u ON u.id = m.user_id
        WHERE m.id = $1
        "#,
        id,
    )
    .await?;

    let Some(row) = row else { return Ok(()) };
    let Some(subject) = row.external_subject else { return Ok(()) };

    state
        .realtime
        .emit(
            &subject,
            "match:update",
            json!({
                "id": id,
                "status": row.status,
                "createdAt": row.created_at,
                "updatedAt": row.updated_at,
            }),
        )
        .await;
    Ok(())
}
