//! Virtual time for deterministic gate tests
//!
//! One value is both the [`Clock`] and the [`TimerScheduler`] of a controller
//! under test. Time only moves when the test says so, and due timers are
//! handed back one at a time in deadline order so the test decides when each
//! fire is delivered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use adgate_contracts::prelude::{Clock, TimerId, TimerSchedule, TimerScheduler};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Virtual clock plus timer wheel
#[derive(Clone, Debug)]
pub struct VirtualTime {
    state: Arc<Mutex<VirtualState>>,
    /// Base instant for calculating offsets
    base_instant: Instant,
    /// Wall-clock reading at `base_instant`
    base_utc: DateTime<Utc>,
}

#[derive(Debug)]
struct VirtualState {
    now: Instant,
    timers: Vec<VirtualTimer>,
    armed: u64,
}

#[derive(Debug, Clone, Copy)]
struct VirtualTimer {
    id: TimerId,
    deadline: Instant,
    period: Option<Duration>,
    /// Arming order, breaks deadline ties
    order: u64,
}

impl VirtualTime {
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    /// Create virtual time whose wall clock starts at `start`
    pub fn new_at(start: DateTime<Utc>) -> Self {
        let now = Instant::now();
        Self {
            state: Arc::new(Mutex::new(VirtualState {
                now,
                timers: Vec::new(),
                armed: 0,
            })),
            base_instant: now,
            base_utc: start,
        }
    }

    /// Move the clock forward without firing anything.
    pub fn advance(&self, duration: Duration) {
        self.state.lock().now += duration;
    }

    /// Time elapsed since construction
    pub fn elapsed(&self) -> Duration {
        self.state.lock().now - self.base_instant
    }

    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.state.lock().timers.iter().any(|timer| timer.id == id)
    }

    /// Pops the earliest timer due at or before `until` and moves the clock
    /// to its deadline. Periodic timers are re-armed one period later.
    pub fn pop_due(&self, until: Instant) -> Option<TimerId> {
        let mut state = self.state.lock();

        let (index, timer) = state
            .timers
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, timer)| timer.deadline <= until)
            .min_by_key(|(_, timer)| (timer.deadline, timer.order))?;

        if timer.deadline > state.now {
            state.now = timer.deadline;
        }

        match timer.period {
            Some(period) => {
                state.armed += 1;
                let order = state.armed;
                let entry = &mut state.timers[index];
                entry.deadline += period;
                entry.order = order;
            }
            None => {
                state.timers.remove(index);
            }
        }

        Some(timer.id)
    }
}

impl Default for VirtualTime {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualTime {
    fn now(&self) -> Instant {
        self.state.lock().now
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = self.elapsed();
        self.base_utc
            + chrono::Duration::from_std(elapsed)
                .unwrap_or_else(|_| chrono::Duration::zero())
    }
}

impl TimerScheduler for VirtualTime {
    fn schedule(&self, id: TimerId, schedule: TimerSchedule) {
        let mut state = self.state.lock();
        let (delay, period) = match schedule {
            TimerSchedule::Once(delay) => (delay, None),
            TimerSchedule::Every(period) => (period, Some(period)),
        };
        let deadline = state.now + delay;
        state.armed += 1;
        let order = state.armed;

        state.timers.retain(|timer| timer.id != id);
        state.timers.push(VirtualTimer {
            id,
            deadline,
            period,
            order,
        });
    }

    fn cancel(&self, id: TimerId) {
        self.state.lock().timers.retain(|timer| timer.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgate_contracts::prelude::TimerKind;

    #[test]
    fn advance_moves_both_clocks() {
        let time = VirtualTime::new();
        let start = time.now();
        let start_utc = time.utc_now();

        time.advance(Duration::from_secs(90));

        assert_eq!(time.now() - start, Duration::from_secs(90));
        assert_eq!(
            time.utc_now() - start_utc,
            chrono::Duration::seconds(90)
        );
    }

    #[test]
    fn timers_pop_in_deadline_order() {
        let time = VirtualTime::new();
        let slow = TimerId::new(TimerKind::Relock, 1);
        let fast = TimerId::new(TimerKind::CountdownTick, 2);
        time.schedule(slow, TimerSchedule::Once(Duration::from_secs(10)));
        time.schedule(fast, TimerSchedule::Every(Duration::from_secs(3)));

        let horizon = time.now() + Duration::from_secs(10);
        let mut fired = Vec::new();
        while let Some(id) = time.pop_due(horizon) {
            fired.push(id);
        }

        assert_eq!(fired, vec![fast, fast, fast, slow]);
        assert!(time.is_pending(fast));
        assert!(!time.is_pending(slow));
        assert_eq!(time.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let time = VirtualTime::new();
        let id = TimerId::new(TimerKind::CountdownTick, 1);
        time.schedule(id, TimerSchedule::Every(Duration::from_secs(1)));
        time.cancel(id);
        time.cancel(id);

        assert_eq!(time.pop_due(time.now() + Duration::from_secs(5)), None);
        assert_eq!(time.pending_timers(), 0);
    }
}
