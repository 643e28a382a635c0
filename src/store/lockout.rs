//! Account lockout bookkeeping for the primary path. The fallback store keeps
//! no failure counters, so these helpers are only wired into the Postgres
//! adapter.

use chrono::{DateTime, Duration, Utc};

use crate::models::User;

pub const MAX_FAILED_ATTEMPTS: i32 = 5;
pub const LOCKOUT_MINUTES: i64 = 15;

/// Returns the lock expiry if the account is currently locked. Checked before
/// the password, so a correct password during the window is still rejected.
pub fn active_lock(user: &User, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match user.locked_until {
        Some(until) if until > now => Some(until),
        _ => None,
    }
}

/// Bump the failure counter; the 5th consecutive failure (and every one after
/// it) sets a fresh 15-minute lock.
pub fn register_failure(
    failed_attempts: i32,
    now: DateTime<Utc>,
) -> (i32, Option<DateTime<Utc>>) {
    let attempts = failed_attempts + 1;
    let locked_until = if attempts >= MAX_FAILED_ATTEMPTS {
        Some(now + Duration::minutes(LOCKOUT_MINUTES))
    } else {
        None
    };
    (attempts, locked_until)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use uuid::Uuid;

    fn user(failed: i32, locked_until: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "betty".into(),
            email: None,
            phone: None,
            password_hash: "x".into(),
            role: Role::User,
            email_verified: false,
            failed_login_attempts: failed,
            locked_until,
            created_at: now,
            last_login: now,
        }
    }

    #[test]
    fn four_failures_do_not_lock() {
        let now = Utc::now();
        let mut attempts = 0;
        for _ in 0..4 {
            let (next, lock) = register_failure(attempts, now);
            assert!(lock.is_none());
            attempts = next;
        }
        assert_eq!(attempts, 4);
    }

    #[test]
    fn fifth_failure_locks_for_fifteen_minutes() {
        let now = Utc::now();
        let (attempts, lock) = register_failure(4, now);
        assert_eq!(attempts, 5);
        assert_eq!(lock, Some(now + Duration::minutes(LOCKOUT_MINUTES)));
    }

    #[test]
    fn lock_holds_within_window_regardless_of_password() {
        // The adapter checks active_lock before verifying anything, so a
        // present lock rejects even a correct password.
        let now = Utc::now();
        let u = user(5, Some(now + Duration::minutes(10)));
        assert!(active_lock(&u, now).is_some());
    }

    #[test]
    fn lock_expires_after_window() {
        let now = Utc::now();
        let u = user(5, Some(now - Duration::seconds(1)));
        assert!(active_lock(&u, now).is_none());
    }
}
