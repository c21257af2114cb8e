//! Rolling-window quota gate in front of match creation.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::repos::UserRepo;

/// Length of the usage window in days.
pub const WINDOW_DAYS: i64 = 365;

/// True when the usage window has never started or lies fully in the past,
/// meaning the counter is due for a reset.
pub fn window_expired(period_start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match period_start {
        None => true,
        Some(start) => now - start > Duration::days(WINDOW_DAYS),
    }
}

/// Remaining allowance for display purposes; an expired window counts as a
/// full allowance.
pub fn remaining_allowance(user: &UserRow, now: DateTime<Utc>) -> i32 {
    if window_expired(user.annual_period_start, now) {
        user.annual_limit
    } else {
        (user.annual_limit - user.annual_usage_count).max(0)
    }
}

/// Gate invoked exclusively from the match-create path.
///
/// Privileged callers skip both the check and the increment. Everyone else
/// is refused once the in-window count reaches the limit; otherwise the
/// counter is bumped (resetting the window first when it expired).
pub async fn enforce_match_quota(
    users: &UserRepo,
    user: &UserRow,
    privileged: bool,
) -> Result<(), AppError> {
    if privileged {
        return Ok(());
    }

    let now = Utc::now();
    if user.annual_usage_count >= user.annual_limit && !window_expired(user.annual_period_start, now)
    {
        return Err(AppError::UpgradeRequired);
    }

    let counters = users.increment_annual_usage(user.id).await?;
    info!(
        user_id = %user.id,
        count = counters.new_count,
        limit = counters.limit,
        "match quota consumed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(limit: i32, count: i32, period_start: Option<DateTime<Utc>>) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            external_subject: "dev|user".to_string(),
            email: None,
            annual_limit: limit,
            annual_usage_count: count,
            annual_period_start: period_start,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_window_never_started_is_expired() {
        assert!(window_expired(None, Utc::now()));
    }

    #[test]
    fn test_window_within_365_days_is_live() {
        let now = Utc::now();
        assert!(!window_expired(Some(now - Duration::days(100)), now));
        assert!(!window_expired(Some(now - Duration::days(365)), now));
    }

    #[test]
    fn test_window_older_than_365_days_is_expired() {
        let now = Utc::now();
        assert!(window_expired(Some(now - Duration::days(400)), now));
    }

    #[test]
    fn test_remaining_counts_down_inside_window() {
        let now = Utc::now();
        let u = user(100, 37, Some(now - Duration::days(10)));
        assert_eq!(remaining_allowance(&u, now), 63);
    }

    #[test]
    fn test_remaining_is_full_after_expiry() {
        let now = Utc::now();
        let u = user(100, 100, Some(now - Duration::days(400)));
        assert_eq!(remaining_allowance(&u, now), 100);
    }

    #[test]
    fn test_remaining_never_negative() {
        let now = Utc::now();
        let u = user(1, 5, Some(now - Duration::days(1)));
        assert_eq!(remaining_allowance(&u, now), 0);
    }
}
