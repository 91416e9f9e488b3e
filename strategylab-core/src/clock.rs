//! Source of "now" for time-relative cache behavior.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// Wall clock used by pipelines. `Fixed` pins time for tests and replays;
/// `Manual` is moved by whoever holds a clone, so a running loop can be
/// driven across a UTC midnight without sleeping.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
    Manual(Arc<ManualClock>),
}

impl Clock {
    /// A manual clock starting at `start`. Clones share the same time.
    pub fn manual(start: DateTime<Utc>) -> Self {
        Self::Manual(Arc::new(ManualClock {
            millis: AtomicI64::new(start.timestamp_millis()),
        }))
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(t) => *t,
            Self::Manual(m) => m.now(),
        }
    }

    /// Current UTC calendar date.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

impl PartialEq for Clock {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::System, Self::System) => true,
            (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (Self::Manual(a), Self::Manual(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Shared time behind [`Clock::Manual`], stored as epoch milliseconds.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn now(&self) -> DateTime<Utc> {
        let ms = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
    }

    pub fn set(&self, t: DateTime<Utc>) {
        self.millis.store(t.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_never_moves() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let c = Clock::Fixed(t);
        assert_eq!(c.now(), t);
        assert_eq!(c.now(), t);
    }

    #[test]
    fn manual_clock_moves_only_when_told_and_clones_share_it() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();
        let c = Clock::manual(t);
        let twin = c.clone();
        assert_eq!(c.now(), t);
        assert_eq!(c.now(), t);

        let Clock::Manual(handle) = &twin else { unreachable!() };
        handle.advance(Duration::hours(1));
        assert_eq!(c.today(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());

        handle.set(t);
        assert_eq!(c.now(), t);
        assert_eq!(c, twin);
        assert_ne!(c, Clock::manual(t));
    }
}
