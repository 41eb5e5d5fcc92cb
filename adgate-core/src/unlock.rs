//! Per-ad unlock verification state machine.
//!
//! There is no way to prove an ad was actually watched, so the machine uses
//! wall-clock time between "ad opened" and "viewer came back" as the signal:
//!
//! ```text
//! idle --activate_ad--> waiting --return_to_foreground--> verifying
//! verifying --verify (elapsed >= view time)--> countdown --tick x N--> done
//! verifying --verify (elapsed <  view time)--> failed --retry--> idle
//! ```
//!
//! The machine is purely reactive: it never reads a clock or arms a timer
//! itself. The gate controller passes `now` in and owns the tick timer.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::UnlockTiming;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockStatus {
    /// Waiting for the viewer to open the ad
    Idle,
    /// Ad opened; waiting for the viewer to come back
    Waiting,
    /// Viewer is back; time away is being checked
    Verifying,
    /// Verification passed; counting down to unlock
    Countdown,
    /// Came back too soon; retry available
    Failed,
}

impl fmt::Display for UnlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnlockStatus::Idle => "idle",
            UnlockStatus::Waiting => "waiting",
            UnlockStatus::Verifying => "verifying",
            UnlockStatus::Countdown => "countdown",
            UnlockStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Input that drives a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnlockTrigger {
    ActivateAd,
    ReturnToForeground,
    Verify,
    Retry,
    Tick,
}

impl fmt::Display for UnlockTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnlockTrigger::ActivateAd => "activate ad",
            UnlockTrigger::ReturnToForeground => "return to foreground",
            UnlockTrigger::Verify => "verify",
            UnlockTrigger::Retry => "retry",
            UnlockTrigger::Tick => "tick",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnlockTransitionError {
    #[error("cannot {trigger} while {from}")]
    Invalid {
        from: UnlockStatus,
        trigger: UnlockTrigger,
    },

    #[error("session already completed")]
    AlreadyCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of checking the time spent away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Passed { elapsed: Duration },
    TooSoon { elapsed: Duration, required: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Remaining(u32),
    /// The countdown hit zero; reported exactly once per session
    Completed,
}

/// Verification state for the queue entry currently being gated.
#[derive(Debug, Clone)]
pub struct UnlockSession {
    id: SessionId,
    timing: UnlockTiming,
    status: UnlockStatus,
    ad_clicked_at: Option<Instant>,
    remaining_countdown_secs: u32,
    completed: bool,
}

impl UnlockSession {
    pub fn new(timing: UnlockTiming) -> Self {
        Self {
            id: SessionId::new(),
            timing,
            status: UnlockStatus::Idle,
            ad_clicked_at: None,
            remaining_countdown_secs: timing.countdown_secs,
            completed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> UnlockStatus {
        self.status
    }

    pub fn timing(&self) -> UnlockTiming {
        self.timing
    }

    pub fn ad_clicked_at(&self) -> Option<Instant> {
        self.ad_clicked_at
    }

    pub fn remaining_countdown_secs(&self) -> u32 {
        self.remaining_countdown_secs
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn expect(
        &self,
        expected: UnlockStatus,
        trigger: UnlockTrigger,
    ) -> Result<(), UnlockTransitionError> {
        if self.completed {
            return Err(UnlockTransitionError::AlreadyCompleted);
        }
        if self.status != expected {
            return Err(UnlockTransitionError::Invalid {
                from: self.status,
                trigger,
            });
        }
        Ok(())
    }

    /// `idle -> waiting`. Records the click instant; opening the link is the
    /// caller's job.
    pub fn activate_ad(
        &mut self,
        now: Instant,
    ) -> Result<(), UnlockTransitionError> {
        self.expect(UnlockStatus::Idle, UnlockTrigger::ActivateAd)?;
        self.ad_clicked_at = Some(now);
        self.status = UnlockStatus::Waiting;
        Ok(())
    }

    /// `waiting -> verifying`.
    pub fn return_to_foreground(
        &mut self,
    ) -> Result<(), UnlockTransitionError> {
        self.expect(UnlockStatus::Waiting, UnlockTrigger::ReturnToForeground)?;
        self.status = UnlockStatus::Verifying;
        Ok(())
    }

    /// `verifying -> countdown | failed`.
    pub fn verify(
        &mut self,
        now: Instant,
    ) -> Result<Verification, UnlockTransitionError> {
        self.expect(UnlockStatus::Verifying, UnlockTrigger::Verify)?;

        let elapsed = self
            .ad_clicked_at
            .map(|clicked| now.saturating_duration_since(clicked))
            .unwrap_or_default();

        if elapsed >= self.timing.view_time {
            self.status = UnlockStatus::Countdown;
            self.remaining_countdown_secs = self.timing.countdown_secs;
            Ok(Verification::Passed { elapsed })
        } else {
            self.status = UnlockStatus::Failed;
            Ok(Verification::TooSoon {
                elapsed,
                required: self.timing.view_time,
            })
        }
    }

    /// `failed -> idle`. Forgets the previous click.
    pub fn retry(&mut self) -> Result<(), UnlockTransitionError> {
        self.expect(UnlockStatus::Failed, UnlockTrigger::Retry)?;
        self.ad_clicked_at = None;
        self.remaining_countdown_secs = self.timing.countdown_secs;
        self.status = UnlockStatus::Idle;
        Ok(())
    }

    /// One countdown step. A zero-length countdown completes on its first
    /// tick without decrementing.
    pub fn tick(&mut self) -> Result<TickOutcome, UnlockTransitionError> {
        self.expect(UnlockStatus::Countdown, UnlockTrigger::Tick)?;

        self.remaining_countdown_secs =
            self.remaining_countdown_secs.saturating_sub(1);

        if self.remaining_countdown_secs == 0 {
            self.completed = true;
            Ok(TickOutcome::Completed)
        } else {
            Ok(TickOutcome::Remaining(self.remaining_countdown_secs))
        }
    }
}
