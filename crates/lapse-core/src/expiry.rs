use crate::error::ShortenerError;
use jiff::{SignedDuration, Timestamp};

/// Default lifetime of a shortened URL.
pub const DEFAULT_TTL: SignedDuration = SignedDuration::from_hours(30 * 24);

const SECONDS_PER_DAY: i64 = 86_400;

/// A whole number of days as a duration, saturating instead of overflowing.
pub fn days(days: i64) -> SignedDuration {
    SignedDuration::from_secs(days.saturating_mul(SECONDS_PER_DAY))
}

/// [`DEFAULT_TTL`] in whole days.
pub const DEFAULT_TTL_DAYS: i64 = DEFAULT_TTL.as_secs() / SECONDS_PER_DAY;

/// Returns whether a record expiring at `expire_at` is expired at `now`.
///
/// A record is expired from its expiry instant onwards. Lookups, listings and
/// the bulk sweep all go through this predicate so they agree on the boundary.
pub fn is_expired(expire_at: Timestamp, now: Timestamp) -> bool {
    now >= expire_at
}

/// When a newly shortened URL stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// The shortened URL expires after a certain duration from now.
    AfterDuration(SignedDuration),
    /// The shortened URL expires at a specific timestamp.
    AtTimestamp(Timestamp),
}

impl Expiration {
    /// Shorthand for a whole number of days, the unit operators think in.
    pub fn days(days: i64) -> Self {
        Self::AfterDuration(self::days(days))
    }

    /// Resolves the expiration into an absolute instant relative to `now`.
    ///
    /// Fails for negative durations, past timestamps and overflow. A zero
    /// duration is accepted and yields a record that is already expired.
    pub fn expire_at(self, now: Timestamp) -> Result<Timestamp, ShortenerError> {
        match self {
            Expiration::AfterDuration(ttl) => {
                if ttl.is_negative() {
                    return Err(ShortenerError::InvalidTtl(format!(
                        "ttl must not be negative, got {ttl:#}"
                    )));
                }
                now.checked_add(ttl)
                    .map_err(|e| ShortenerError::InvalidTtl(format!("ttl out of range: {e}")))
            }
            Expiration::AtTimestamp(at) => {
                if at < now {
                    return Err(ShortenerError::InvalidTtl(format!(
                        "expiry {at} is before now ({now})"
                    )));
                }
                Ok(at)
            }
        }
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Self::AfterDuration(DEFAULT_TTL)
    }
}
