use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::quota::remaining_allowance;
use crate::state::AppState;

/// GET /api/v1/usage. Returns the caller's quota counters.
pub async fn handle_get_usage(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    // Re-read rather than trusting the extractor's snapshot: a worker may
    // have bumped the counters since this request was authenticated.
    let user = state
        .repos
        .users
        .get_by_id(auth.user.id)
        .await?
        .ok_or(AppError::NotFound("user_not_found"))?;

    let remaining = remaining_allowance(&user, Utc::now());
    Ok(Json(json!({
        "annual_limit": user.annual_limit,
        "annual_usage_count": user.annual_usage_count,
        "annual_period_start": user.annual_period_start,
        "remaining": remaining,
    })))
}
