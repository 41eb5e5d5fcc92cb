use chrono::{DateTime, Utc};
use std::time::Instant;

/// Source of "now" for elapsed-time checks.
///
/// Monotonic [`Instant`]s drive verification; the wall-clock reading is only
/// used for log output.
pub trait Clock: Send + Sync + 'static {
    /// Get the current instant
    fn now(&self) -> Instant;

    /// Get the current UTC datetime
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
