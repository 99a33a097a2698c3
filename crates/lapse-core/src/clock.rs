use jiff::{SignedDuration, Timestamp};
use std::sync::{Arc, Mutex, PoisonError};

/// Source of the current instant used for every expiry decision.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current time of the clock.
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle and hand
/// another to the service under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            inner: Arc::new(Mutex::new(now)),
        }
    }

    /// Moves the clock to `target`, backwards included.
    pub fn set(&self, target: Timestamp) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = target;
    }

    /// Advances the clock by `by` and returns the new instant.
    pub fn advance(&self, by: SignedDuration) -> Timestamp {
        let mut now = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.saturating_add(by).unwrap_or(*now);
        *now
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_told() {
        let base = Timestamp::from_second(1_000).unwrap();
        let clock = ManualClock::new(base);
        assert_eq!(clock.now(), base);

        let later = clock.advance(SignedDuration::from_secs(30));
        assert_eq!(later, Timestamp::from_second(1_030).unwrap());
        assert_eq!(clock.now(), later);

        clock.set(base);
        assert_eq!(clock.now(), base);
    }

    #[test]
    fn clones_share_the_same_instant() {
        let clock = ManualClock::new(Timestamp::from_second(0).unwrap());
        let handle = clock.clone();

        handle.advance(SignedDuration::from_hours(1));

        assert_eq!(clock.now(), Timestamp::from_second(3_600).unwrap());
    }
}
