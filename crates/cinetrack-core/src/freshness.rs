use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Whether a cached snapshot taken at `cached_at` must be refetched.
/// A missing timestamp always counts as expired.
pub fn is_expired(cached_at: Option<DateTime<Utc>>, max_days: i64) -> bool {
    is_expired_at(cached_at, max_days, Utc::now())
}

/// Same as [`is_expired`] against an explicit `now`. A window too large to
/// represent never expires.
pub fn is_expired_at(cached_at: Option<DateTime<Utc>>, max_days: i64, now: DateTime<Utc>) -> bool {
    let Some(at) = cached_at else {
        return true;
    };
    match Duration::try_days(max_days) {
        Some(window) => now - at >= window,
        None => false,
    }
}
