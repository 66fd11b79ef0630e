//! Time source for write timestamps and expiry checks.
//!
//! Stores stamp every write with [`Clock::now`] and garbage collection compares
//! against it, so tests can move time without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests.
///
/// Holds millisecond precision; [`FixedClock::advance`] moves it forward.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(now.timestamp_millis()),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: DateTime<Utc>) {
        self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |m| {
                Some(m.saturating_add(by))
            })
            .ok();
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Oldest write time that survives a sweep with `max_age` at `now`.
///
/// Returns `None` when the cutoff falls before the representable range, in
/// which case nothing is old enough to collect.
#[must_use]
pub fn age_cutoff(now: DateTime<Utc>, max_age: Duration) -> Option<DateTime<Utc>> {
    let max_age = TimeDelta::from_std(max_age).ok()?;
    now.checked_sub_signed(max_age)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(at(1_704_067_200));
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now(), at(1_704_067_290));

        clock.set(at(0));
        assert_eq!(clock.now(), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_age_cutoff() {
        let now = at(1_000);
        assert_eq!(age_cutoff(now, Duration::from_secs(400)), Some(at(600)));
        assert_eq!(age_cutoff(now, Duration::ZERO), Some(now));
    }

    #[test]
    fn test_age_cutoff_out_of_range() {
        assert_eq!(age_cutoff(at(0), Duration::MAX), None);
    }
}
