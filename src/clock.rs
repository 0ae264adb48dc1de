use chrono::{Local, NaiveDateTime};

/// Source of the current local wall-clock time.
///
/// Activity dates and times are stored without a zone, so every comparison
/// against them is done in local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
