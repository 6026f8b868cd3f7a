//! Wall-clock source.

use chrono::{Local, NaiveDateTime};

/// Supplies the current local time.
///
/// Abstracts the system clock for substitution in tests.
pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// The system's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
