//! Presigned URL expiry arithmetic.
//!
//! Expiry is counted in calendar days on the local clock, so a "7 day" URL
//! issued the week clocks change is an hour shorter or longer than
//! 7 × 24 hours. SigV4 caps a presigned URL at 604 800 seconds; overshoot
//! caused by the calendar is clamped to that ceiling.

use std::time::Duration;

use chrono::{DateTime, Days, TimeZone};
use tracing::debug;

use tinyoss_core::{OssError, OssResult};

/// Longest validity SigV4 accepts for a presigned URL.
pub const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest expiry, in days, accepted by [`ttl_for_days`].
pub const MAX_PRESIGN_DAYS: u32 = 7;

/// The instant `days` calendar days after `now`.
#[must_use]
pub fn expiry_after_days<Tz: TimeZone>(now: &DateTime<Tz>, days: u32) -> Option<DateTime<Tz>> {
    now.clone().checked_add_days(Days::new(u64::from(days)))
}

/// Validity window for a URL issued at `now` that expires `days` calendar days later.
///
/// # Errors
///
/// Returns [`OssError::Presign`] when `days` is zero or larger than
/// [`MAX_PRESIGN_DAYS`], or when the expiry cannot be represented.
pub fn ttl_for_days<Tz: TimeZone>(now: &DateTime<Tz>, days: u32) -> OssResult<Duration> {
    if days == 0 || days > MAX_PRESIGN_DAYS {
        return Err(presign_error(format!(
            "expiry of {days} days is outside 1..={MAX_PRESIGN_DAYS}"
        )));
    }

    let expiry = expiry_after_days(now, days)
        .ok_or_else(|| presign_error(format!("expiry {days} days from now is out of range")))?;
    let ttl = expiry
        .signed_duration_since(now)
        .to_std()
        .map_err(|e| presign_error(format!("expiry precedes signing time: {e}")))?;

    if ttl > MAX_PRESIGN_TTL {
        debug!(
            requested_secs = ttl.as_secs(),
            "calendar expiry exceeds SigV4 ceiling, clamping"
        );
        return Ok(MAX_PRESIGN_TTL);
    }
    Ok(ttl)
}

fn presign_error(message: String) -> OssError {
    OssError::Presign {
        operation: "GetObject",
        message,
    }
}
