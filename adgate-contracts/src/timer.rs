use std::fmt;
use std::time::Duration;

/// What a scheduled timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// The 1-second tick of an unlock countdown
    CountdownTick,
    /// The periodic re-lock of long-form content
    Relock,
}

/// Unique handle for one armed timer.
///
/// Ids are never reused by a controller, so a fire that arrives after the
/// timer was cancelled can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    pub kind: TimerKind,
    pub seq: u64,
}

impl TimerId {
    pub fn new(kind: TimerKind, seq: u64) -> Self {
        Self { kind, seq }
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TimerKind::CountdownTick => "tick",
            TimerKind::Relock => "relock",
        };
        write!(f, "{kind}#{}", self.seq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSchedule {
    /// Fire once after the delay
    Once(Duration),
    /// Fire every period until cancelled; the first fire is one period out
    Every(Duration),
}

/// Arms and cancels timers whose fires are delivered back to the owner of
/// the scheduler (as a `TimerFired` event in the gate runtime).
pub trait TimerScheduler: Send + Sync {
    fn schedule(&self, id: TimerId, schedule: TimerSchedule);

    /// Cancelling an unknown or already-fired id is a no-op.
    fn cancel(&self, id: TimerId);
}
