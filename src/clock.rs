use std::cell::Cell;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};

/// Source of the current local instant.
///
/// Everything time-dependent takes a clock instead of calling
/// [`Local::now`] so that tests can move time forward deterministically.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now: Cell::new(now) }
    }

    /// Builds a clock from a local wall time, e.g. `2024-01-01T09:02`.
    ///
    /// Returns `None` if the text is malformed or the local time does not
    /// exist.
    pub fn at(local: &str) -> Option<Self> {
        let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M").ok()?;
        Local.from_local_datetime(&naive).earliest().map(Self::new)
    }

    pub fn set(&self, now: DateTime<Local>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }
}
