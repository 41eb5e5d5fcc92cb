//! Playback gate controller.
//!
//! Owns the gate state (queue position, lock flag, re-lock timer) and the one
//! active [`UnlockSession`]. It is a synchronous state machine: every wait is
//! a timer armed through the injected [`TimerScheduler`] or a host listener,
//! and both come back as [`GateEvent`]s through the injected [`EventSink`].
//!
//! Gate lifecycle:
//!
//! ```text
//! locked-gating --last session completes--> unlocked
//! unlocked --re-lock timer (long-form only)--> locked-gating
//! any --content selected--> locked-gating (or unlocked for an empty queue)
//! ```
//!
//! Each timer gets a fresh [`TimerId`] and each session a fresh
//! [`SessionId`]; anything addressed to an id the controller no longer holds
//! is dropped, so a timer or listener from previous content can never act on
//! the current one.

use std::fmt;
use std::sync::Arc;

use adgate_contracts::prelude::{
    Clock, ForegroundSignals, HostSignal, LinkOpener, SignalSink, TimerId,
    TimerKind, TimerSchedule, TimerScheduler,
};
use adgate_model::{
    AdId, AdQueue, AdRecord, ContentId, ContentSelection, QueueEntry,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::config::GateConfig;
use crate::error::Result;
use crate::monitor::ForegroundMonitor;
use crate::queue::{build_queue_seeded, descriptors_from_records, seed_for_content};
use crate::unlock::{
    SessionId, TickOutcome, UnlockSession, UnlockStatus, Verification,
};

/// Asynchronous input delivered back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// A host focus/visibility signal, tagged with the session whose
    /// listener received it
    Host {
        session: SessionId,
        signal: HostSignal,
    },
    TimerFired(TimerId),
}

/// Where host listeners post their [`GateEvent`]s.
pub type EventSink = Arc<dyn Fn(GateEvent) + Send + Sync>;

/// Why the gate opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockReason {
    /// Every queue entry was verified
    QueueCompleted,
    /// The content has no ads to serve
    NoAds,
}

/// Callback invoked whenever the gate opens.
pub type UnlockHook = Arc<dyn Fn(&ContentSelection, UnlockReason) + Send + Sync>;

/// Collaborators injected into the controller.
#[derive(Clone)]
pub struct GateDeps {
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn TimerScheduler>,
    pub host: Arc<dyn ForegroundSignals>,
    pub opener: Arc<dyn LinkOpener>,
    pub events: EventSink,
}

impl fmt::Debug for GateDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateDeps")
            .field("clock", &"<dyn Clock>")
            .field("scheduler", &"<dyn TimerScheduler>")
            .field("host", &"<dyn ForegroundSignals>")
            .field("opener", &"<dyn LinkOpener>")
            .finish()
    }
}

/// Display data for the session the overlay is showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub session: SessionId,
    pub status: UnlockStatus,
    pub remaining_countdown_secs: u32,
    /// 1-based position of the current entry in the queue
    pub ad_number: usize,
    pub total_ads: usize,
    pub ad_id: AdId,
    pub sequence_index: u8,
    pub view_time_secs: u64,
}

/// Everything the player UI renders against.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GateView {
    /// Single source of truth for showing the gate overlay vs. the media
    pub locked: bool,
    pub content: Option<ContentId>,
    pub queue_index: usize,
    pub queue_len: usize,
    pub relock_pending: bool,
    pub session: Option<SessionView>,
}

struct ActiveSession {
    entry: QueueEntry,
    unlock: UnlockSession,
    monitor: ForegroundMonitor,
    tick_timer: Option<TimerId>,
}

pub struct GateController {
    config: GateConfig,
    deps: GateDeps,
    content: Option<ContentSelection>,
    queue: AdQueue,
    current_index: usize,
    locked: bool,
    active: Option<ActiveSession>,
    relock_timer: Option<TimerId>,
    next_timer_seq: u64,
    completed_sessions: u64,
    on_unlocked: Option<UnlockHook>,
    view_tx: watch::Sender<GateView>,
}

impl fmt::Debug for GateController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateController")
            .field("content", &self.content)
            .field("queue_len", &self.queue.len())
            .field("current_index", &self.current_index)
            .field("locked", &self.locked)
            .field(
                "session_status",
                &self.active.as_ref().map(|a| a.unlock.status()),
            )
            .field("relock_timer", &self.relock_timer)
            .finish()
    }
}

impl GateController {
    pub fn new(config: GateConfig, deps: GateDeps) -> Result<Self> {
        config.validate()?;
        let (view_tx, _) = watch::channel(GateView::default());

        Ok(Self {
            config,
            deps,
            content: None,
            queue: AdQueue::empty(),
            current_index: 0,
            locked: false,
            active: None,
            relock_timer: None,
            next_timer_seq: 0,
            completed_sessions: 0,
            on_unlocked: None,
            view_tx,
        })
    }

    /// Registers the completion callback run each time the gate opens.
    pub fn with_unlock_hook(mut self, hook: UnlockHook) -> Self {
        self.on_unlocked = Some(hook);
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn is_player_locked(&self) -> bool {
        self.locked
    }

    pub fn current_queue_index(&self) -> usize {
        self.current_index
    }

    pub fn queue(&self) -> &AdQueue {
        &self.queue
    }

    pub fn content(&self) -> Option<&ContentSelection> {
        self.content.as_ref()
    }

    pub fn has_active_session(&self) -> bool {
        self.active.is_some()
    }

    pub fn has_pending_relock(&self) -> bool {
        self.relock_timer.is_some()
    }

    pub fn session_status(&self) -> Option<UnlockStatus> {
        self.active.as_ref().map(|active| active.unlock.status())
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|active| active.unlock.id())
    }

    /// Sessions completed since construction, across all content.
    pub fn completed_sessions(&self) -> u64 {
        self.completed_sessions
    }

    pub fn subscribe(&self) -> watch::Receiver<GateView> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> GateView {
        GateView {
            locked: self.locked,
            content: self.content.as_ref().map(|c| c.id.clone()),
            queue_index: self.current_index,
            queue_len: self.queue.len(),
            relock_pending: self.relock_timer.is_some(),
            session: self.active.as_ref().map(|active| SessionView {
                session: active.unlock.id(),
                status: active.unlock.status(),
                remaining_countdown_secs: active
                    .unlock
                    .remaining_countdown_secs(),
                ad_number: self.current_index + 1,
                total_ads: self.queue.len(),
                ad_id: active.entry.ad.id.clone(),
                sequence_index: active.entry.sequence_index,
                view_time_secs: active.unlock.timing().view_time.as_secs(),
            }),
        }
    }

    /// Validates raw ad records for `content`, builds its queue and restarts
    /// the gate with it.
    pub fn select_content(
        &mut self,
        content: ContentSelection,
        records: &[AdRecord],
    ) {
        let ads = descriptors_from_records(records);
        let queue = build_queue_seeded(&ads, seed_for_content(&content.id));
        self.on_content_selected(content, queue);
    }

    /// Restarts gating for new content from the first queue entry.
    ///
    /// Cancels the re-lock timer and discards the in-flight session before
    /// anything new is armed.
    pub fn on_content_selected(
        &mut self,
        content: ContentSelection,
        queue: AdQueue,
    ) {
        self.disengage();

        self.current_index = 0;
        self.locked = !queue.is_empty();
        self.queue = queue;
        self.content = Some(content);

        info!(
            target: "adgate::gate",
            content = %self.content_label(),
            queue_len = self.queue.len(),
            locked = self.locked,
            "content selected"
        );

        if self.locked {
            self.start_session();
        } else {
            self.notify_unlocked(UnlockReason::NoAds);
        }
        self.publish();
    }

    /// The viewer clicked the ad link of the current session.
    pub fn activate_ad(&mut self) {
        let now = self.deps.clock.now();
        let Some(active) = self.active.as_mut() else {
            debug!(target: "adgate::gate", "ad activation without an active session");
            return;
        };

        if active.unlock.status() != UnlockStatus::Idle {
            debug!(
                target: "adgate::gate",
                session = %active.unlock.id(),
                status = %active.unlock.status(),
                "ignoring ad activation"
            );
            return;
        }

        let url = &active.entry.ad.url;
        if let Err(err) = self.deps.opener.open(url) {
            warn!(
                target: "adgate::gate",
                ad = %active.entry.ad.id,
                error = %err,
                "failed to open ad link; session stays idle"
            );
            return;
        }

        if let Err(err) = active.unlock.activate_ad(now) {
            debug!(target: "adgate::gate", error = %err, "ad activation rejected");
            return;
        }
        active.monitor.mark_away();

        info!(
            target: "adgate::gate",
            session = %active.unlock.id(),
            ad = %active.entry.ad.id,
            at = %self.deps.clock.utc_now(),
            "ad opened"
        );
        self.publish();
    }

    /// The viewer asked to try the current ad again after a failed check.
    pub fn request_retry(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        match active.unlock.retry() {
            Ok(()) => {
                debug!(target: "adgate::gate", session = %active.unlock.id(), "retrying ad");
                self.publish();
            }
            Err(err) => {
                debug!(target: "adgate::gate", error = %err, "retry rejected")
            }
        }
    }

    pub fn handle(&mut self, event: GateEvent) {
        match event {
            GateEvent::Host { session, signal } => {
                self.on_host_signal(session, signal)
            }
            GateEvent::TimerFired(id) => self.on_timer_fired(id),
        }
    }

    /// Cancels every timer and releases the host listener. Safe to call any
    /// number of times; also runs on drop.
    pub fn teardown(&mut self) {
        if self.active.is_some() || self.relock_timer.is_some() {
            debug!(target: "adgate::gate", "tearing down gate");
        }
        self.disengage();
        self.publish();
    }

    fn on_host_signal(&mut self, session: SessionId, signal: HostSignal) {
        let now = self.deps.clock.now();
        let Some(active) = self.active.as_mut() else {
            trace!(target: "adgate::gate", ?signal, "host signal with no active session");
            return;
        };

        if active.unlock.id() != session {
            trace!(
                target: "adgate::gate",
                %session,
                ?signal,
                "dropping host signal for a discarded session"
            );
            return;
        }

        if active.monitor.observe(signal).is_none() {
            return;
        }

        if let Err(err) = active.unlock.return_to_foreground() {
            trace!(target: "adgate::gate", error = %err, "foreground return ignored");
            return;
        }

        let session_id = active.unlock.id();
        match active.unlock.verify(now) {
            Ok(Verification::Passed { elapsed }) => {
                info!(
                    target: "adgate::gate",
                    session = %session_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "ad view verified"
                );
                self.start_countdown();
            }
            Ok(Verification::TooSoon { elapsed, required }) => {
                info!(
                    target: "adgate::gate",
                    session = %session_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    required_ms = required.as_millis() as u64,
                    "viewer returned too soon"
                );
            }
            Err(err) => {
                debug!(target: "adgate::gate", error = %err, "verification skipped")
            }
        }
        self.publish();
    }

    fn on_timer_fired(&mut self, id: TimerId) {
        if self.relock_timer == Some(id) {
            self.relock_timer = None;
            // Clears the scheduler's bookkeeping for the one-shot timer.
            self.deps.scheduler.cancel(id);
            self.relock();
            return;
        }

        let is_current_tick = self
            .active
            .as_ref()
            .and_then(|active| active.tick_timer)
            == Some(id);
        if !is_current_tick {
            debug!(target: "adgate::gate", timer = %id, "ignoring stale timer");
            return;
        }

        self.countdown_tick();
    }

    fn start_countdown(&mut self) {
        let id = self.next_timer(TimerKind::CountdownTick);
        let period = self.config.tick_interval();
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if active.unlock.remaining_countdown_secs() == 0 {
            self.countdown_tick();
            return;
        }

        active.tick_timer = Some(id);
        self.deps.scheduler.schedule(id, TimerSchedule::Every(period));
    }

    fn countdown_tick(&mut self) {
        let outcome = match self.active.as_mut() {
            Some(active) => active.unlock.tick(),
            None => return,
        };

        match outcome {
            Ok(TickOutcome::Remaining(left)) => {
                trace!(target: "adgate::gate", remaining = left, "countdown tick");
                self.publish();
            }
            Ok(TickOutcome::Completed) => self.on_session_completed(),
            Err(err) => {
                debug!(target: "adgate::gate", error = %err, "tick ignored")
            }
        }
    }

    /// Terminal transition of the current session: advance to the next entry
    /// or open the gate.
    fn on_session_completed(&mut self) {
        let Some(finished) = self.discard_session() else {
            return;
        };
        self.completed_sessions += 1;

        info!(
            target: "adgate::gate",
            session = %finished.unlock.id(),
            ad = %finished.entry.ad.id,
            position = self.current_index + 1,
            total = self.queue.len(),
            "unlock session completed"
        );

        if self.current_index + 1 < self.queue.len() {
            self.current_index += 1;
            self.start_session();
        } else {
            self.locked = false;
            info!(target: "adgate::gate", content = %self.content_label(), "player unlocked");

            if self.content.as_ref().is_some_and(|c| c.is_long_form()) {
                self.arm_relock();
            }
            self.notify_unlocked(UnlockReason::QueueCompleted);
        }
        self.publish();
    }

    fn arm_relock(&mut self) {
        debug_assert!(
            self.active.is_none(),
            "re-lock timer armed while a session is active"
        );
        let id = self.next_timer(TimerKind::Relock);
        self.relock_timer = Some(id);
        self.deps
            .scheduler
            .schedule(id, TimerSchedule::Once(self.config.relock_after()));
        debug!(
            target: "adgate::gate",
            timer = %id,
            after_secs = self.config.relock_after_secs,
            "re-lock armed"
        );
    }

    fn relock(&mut self) {
        info!(target: "adgate::gate", content = %self.content_label(), "re-locking long-form content");
        self.current_index = 0;
        self.locked = !self.queue.is_empty();
        if self.locked {
            self.start_session();
        }
        self.publish();
    }

    fn start_session(&mut self) {
        debug_assert!(
            self.relock_timer.is_none(),
            "session started while a re-lock timer is pending"
        );
        let Some(entry) = self.queue.get(self.current_index).cloned() else {
            return;
        };

        let unlock = UnlockSession::new(self.config.timing_for(&entry.ad.timing));
        let session = unlock.id();
        let events = Arc::clone(&self.deps.events);
        let sink: SignalSink = Arc::new(move |signal| {
            events(GateEvent::Host { session, signal })
        });
        let monitor = ForegroundMonitor::attach(self.deps.host.as_ref(), sink);

        debug!(
            target: "adgate::gate",
            %session,
            ad = %entry.ad.id,
            occurrence = entry.sequence_index,
            position = self.current_index + 1,
            total = self.queue.len(),
            "unlock session started"
        );

        self.active = Some(ActiveSession {
            entry,
            unlock,
            monitor,
            tick_timer: None,
        });
    }

    fn discard_session(&mut self) -> Option<ActiveSession> {
        let mut active = self.active.take()?;
        if let Some(id) = active.tick_timer.take() {
            self.deps.scheduler.cancel(id);
        }
        active.monitor.detach();
        Some(active)
    }

    fn disengage(&mut self) {
        if let Some(id) = self.relock_timer.take() {
            self.deps.scheduler.cancel(id);
        }
        self.discard_session();
    }

    fn next_timer(&mut self, kind: TimerKind) -> TimerId {
        self.next_timer_seq += 1;
        TimerId::new(kind, self.next_timer_seq)
    }

    fn notify_unlocked(&self, reason: UnlockReason) {
        if let (Some(hook), Some(content)) = (&self.on_unlocked, &self.content)
        {
            hook(content, reason);
        }
    }

    fn content_label(&self) -> String {
        self.content
            .as_ref()
            .map(|c| format!("{} ({})", c.id, c.kind))
            .unwrap_or_else(|| "<none>".to_string())
    }

    fn publish(&self) {
        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

impl Drop for GateController {
    fn drop(&mut self) {
        self.disengage();
    }
}
