use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use adgate_contracts::prelude::{HostSignal, TimerId, TimerKind};
use adgate_core::testing::{
    EventInbox, GateHarness, ManualHost, RecordingOpener, VirtualTime,
};
use adgate_core::{
    GateConfig, GateController, GateDeps, GateEvent, UnlockReason,
    UnlockStatus, build_queue,
};
use adgate_model::{AdRecord, ContentSelection};

fn assert_exclusive(harness: &GateHarness) {
    assert!(
        !(harness.controller.has_active_session()
            && harness.controller.has_pending_relock()),
        "active session and pending re-lock at the same time"
    );
}

#[test]
fn single_ad_with_two_occurrences_needs_two_views() {
    let records = [AdRecord::new("a", "https://a").with_occurrences(2)];
    let ads = adgate_core::descriptors_from_records(&records);
    let queue = build_queue(&ads, "ep1");
    assert_eq!(queue.len(), 2);

    let mut harness = GateHarness::new(GateConfig::default());
    harness.select("ep1", &[("a", 2)]);
    assert_eq!(harness.controller.queue().len(), 2);

    let mut locked = vec![harness.controller.is_player_locked()];
    harness.watch_current_ad();
    locked.push(harness.controller.is_player_locked());
    assert_eq!(harness.controller.current_queue_index(), 1);
    harness.watch_current_ad();
    locked.push(harness.controller.is_player_locked());

    assert_eq!(locked, vec![true, true, false]);
    assert_eq!(harness.controller.completed_sessions(), 2);
    assert_eq!(harness.opener.opened().len(), 2);
}

#[test]
fn returning_too_soon_fails_and_retry_restarts() {
    let mut harness = GateHarness::new(GateConfig::default());
    harness.select("ep1", &[("a", 1)]);

    let mut trail = vec![harness.controller.session_status()];
    harness.controller.activate_ad();
    trail.push(harness.controller.session_status());
    harness.emit(HostSignal::Hidden);
    harness.advance(Duration::from_secs(2));
    harness.emit(HostSignal::Visible);
    trail.push(harness.controller.session_status());

    assert_eq!(
        trail,
        vec![
            Some(UnlockStatus::Idle),
            Some(UnlockStatus::Waiting),
            Some(UnlockStatus::Failed)
        ]
    );
    assert!(harness.controller.is_player_locked());
    assert_eq!(harness.time.pending_timers(), 0);

    // A late focus after the failure changes nothing.
    harness.emit(HostSignal::Focus);
    assert_eq!(
        harness.controller.session_status(),
        Some(UnlockStatus::Failed)
    );

    harness.controller.request_retry();
    assert_eq!(harness.controller.session_status(), Some(UnlockStatus::Idle));

    harness.watch_current_ad();
    assert!(!harness.controller.is_player_locked());
}

#[test]
fn countdown_runs_to_zero_and_completes_once() {
    let mut harness = GateHarness::new(GateConfig::default());
    let mut views = harness.controller.subscribe();
    harness.select("ep1", &[("a", 1)]);

    harness.leave_and_return(Duration::from_secs(6));
    let mut remaining = Vec::new();
    for _ in 0..3 {
        let view = harness.controller.view();
        if let Some(session) = view.session {
            remaining.push(session.remaining_countdown_secs);
        }
        harness.advance(Duration::from_secs(1));
    }

    assert_eq!(remaining, vec![3, 2, 1]);
    assert_eq!(harness.controller.completed_sessions(), 1);
    assert!(!harness.controller.is_player_locked());
    assert!(!harness.controller.has_active_session());
    assert!(views.has_changed().unwrap());
    assert!(!views.borrow_and_update().locked);

    harness.advance(Duration::from_secs(10));
    assert_eq!(harness.controller.completed_sessions(), 1);
}

#[test]
fn duplicate_foreground_signals_verify_once() {
    let mut harness = GateHarness::new(GateConfig::default());
    harness.select("ep1", &[("a", 1)]);
    harness.controller.activate_ad();
    harness.advance(Duration::from_secs(6));

    harness.emit(HostSignal::Visible);
    harness.emit(HostSignal::Focus);
    harness.emit(HostSignal::Focus);

    assert_eq!(
        harness.controller.session_status(),
        Some(UnlockStatus::Countdown)
    );
    assert_eq!(harness.time.pending_timers(), 1);
}

#[test]
fn long_form_content_relocks_after_window() {
    let mut harness = GateHarness::new(GateConfig::default());
    harness.select_content(ContentSelection::movie("m1"), &[("a", 1), ("b", 1)]);

    harness.watch_current_ad();
    assert_exclusive(&harness);
    harness.watch_current_ad();
    assert_exclusive(&harness);
    assert!(!harness.controller.is_player_locked());
    assert!(harness.controller.has_pending_relock());

    harness.advance(Duration::from_secs(14 * 60));
    assert!(!harness.controller.is_player_locked());

    harness.advance(Duration::from_secs(60));
    assert_exclusive(&harness);
    assert!(harness.controller.is_player_locked());
    assert_eq!(harness.controller.current_queue_index(), 0);
    assert_eq!(harness.controller.session_status(), Some(UnlockStatus::Idle));
    assert!(!harness.controller.has_pending_relock());
}

#[test]
fn episodes_stay_unlocked() {
    let mut harness = GateHarness::new(GateConfig::default());
    harness.select("ep1", &[("a", 1)]);
    harness.watch_current_ad();

    assert!(!harness.controller.has_pending_relock());
    harness.advance(Duration::from_secs(3600));
    assert!(!harness.controller.is_player_locked());
}

#[test]
fn content_change_mid_countdown_discards_old_session() {
    let mut harness = GateHarness::new(GateConfig::default());
    harness.select("ep1", &[("a", 1)]);
    harness.leave_and_return(Duration::from_secs(6));
    harness.advance(Duration::from_secs(1));
    let old_session = harness.controller.session_id().unwrap();
    assert_eq!(harness.time.pending_timers(), 1);

    harness.select("ep2", &[("b", 1), ("c", 1)]);

    assert_eq!(harness.time.pending_timers(), 0);
    harness
        .controller
        .handle(GateEvent::TimerFired(TimerId::new(TimerKind::CountdownTick, 1)));
    harness.advance(Duration::from_secs(5));

    assert!(harness.controller.is_player_locked());
    assert_eq!(harness.controller.current_queue_index(), 0);
    assert_eq!(harness.controller.session_status(), Some(UnlockStatus::Idle));
    assert_ne!(harness.controller.session_id(), Some(old_session));
    assert_eq!(harness.controller.completed_sessions(), 0);
    assert_eq!(harness.host.active_listeners(), 1);
}

#[test]
fn content_change_cancels_pending_relock() {
    let mut harness = GateHarness::new(GateConfig::default());
    harness.select_content(ContentSelection::movie("m1"), &[("a", 1)]);
    harness.watch_current_ad();
    assert!(harness.controller.has_pending_relock());

    harness.select("ep2", &[]);
    assert!(!harness.controller.has_pending_relock());
    assert_eq!(harness.time.pending_timers(), 0);

    harness.advance(Duration::from_secs(900));
    assert!(!harness.controller.is_player_locked());
}

#[test]
fn selecting_same_content_twice_restarts_cleanly() {
    let mut harness = GateHarness::new(GateConfig::default());
    harness.select("ep1", &[("a", 2)]);
    harness.watch_current_ad();
    assert_eq!(harness.controller.current_queue_index(), 1);

    harness.select("ep1", &[("a", 2)]);
    let first = harness.controller.view();
    harness.select("ep1", &[("a", 2)]);
    let second = harness.controller.view();

    assert_eq!(first.queue_index, 0);
    assert_eq!(first.queue_len, second.queue_len);
    assert_eq!(
        first.session.map(|s| s.ad_id),
        second.session.map(|s| s.ad_id)
    );
    assert_eq!(harness.host.active_listeners(), 1);
}

#[test]
fn no_ads_means_unlocked() {
    let mut harness = GateHarness::new(GateConfig::default());
    harness.select("ep1", &[]);

    assert!(!harness.controller.is_player_locked());
    assert!(!harness.controller.has_active_session());
    assert_eq!(harness.host.total_subscribed(), 0);
}

#[test]
fn invalid_ads_are_skipped_not_fatal() {
    let mut harness = GateHarness::new(GateConfig::default());
    let records = vec![
        AdRecord::new("", "https://blank.example"),
        AdRecord::new("good", "https://good.example"),
        AdRecord::new("bad", "notaurl"),
    ];
    harness
        .controller
        .select_content(ContentSelection::episode("ep1"), &records);

    assert_eq!(harness.controller.queue().len(), 1);
    assert!(harness.controller.is_player_locked());
}

#[test]
fn per_ad_timing_overrides_apply() {
    let mut harness = GateHarness::new(GateConfig::default());
    let records = vec![
        AdRecord::new("long", "https://long.example")
            .with_view_time_secs(30)
            .with_unlock_timer_secs(1),
    ];
    harness
        .controller
        .select_content(ContentSelection::episode("ep1"), &records);

    harness.leave_and_return(Duration::from_secs(10));
    assert_eq!(
        harness.controller.session_status(),
        Some(UnlockStatus::Failed)
    );

    harness.controller.request_retry();
    harness.leave_and_return(Duration::from_secs(31));
    harness.advance(Duration::from_secs(1));
    assert!(!harness.controller.is_player_locked());
}

#[test]
fn blocked_link_keeps_session_idle() {
    let mut harness =
        GateHarness::with_opener(GateConfig::default(), RecordingOpener::blocked());
    harness.select("ep1", &[("a", 1)]);

    harness.controller.activate_ad();
    assert_eq!(harness.controller.session_status(), Some(UnlockStatus::Idle));

    harness.opener.set_blocked(false);
    harness.controller.activate_ad();
    assert_eq!(
        harness.controller.session_status(),
        Some(UnlockStatus::Waiting)
    );
}

#[test]
fn zero_unlock_timer_completes_on_return() {
    let config = GateConfig {
        unlock_timer_secs: 0,
        ..GateConfig::default()
    };
    let mut harness = GateHarness::new(config);
    harness.select("ep1", &[("a", 1)]);

    harness.leave_and_return(Duration::from_secs(6));

    assert!(!harness.controller.is_player_locked());
    assert_eq!(harness.time.pending_timers(), 0);
}

#[test]
fn teardown_balances_listeners_and_timers() {
    let mut harness = GateHarness::new(GateConfig::default());
    harness.select("ep1", &[("a", 1), ("b", 1)]);
    harness.watch_current_ad();
    harness.leave_and_return(Duration::from_secs(6));
    assert_eq!(harness.time.pending_timers(), 1);

    harness.controller.teardown();
    harness.controller.teardown();

    assert_eq!(harness.host.active_listeners(), 0);
    assert_eq!(harness.host.total_subscribed(), harness.host.total_released());
    assert_eq!(harness.time.pending_timers(), 0);
}

#[test]
fn unlock_hook_fires_once_per_opening() {
    let time = VirtualTime::new();
    let host = Arc::new(ManualHost::new());
    let inbox = EventInbox::new();
    let unlocked = Arc::new(AtomicUsize::new(0));
    let reasons = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let counter = Arc::clone(&unlocked);
    let seen = Arc::clone(&reasons);
    let mut controller = GateController::new(
        GateConfig::default(),
        GateDeps {
            clock: Arc::new(time.clone()),
            scheduler: Arc::new(time.clone()),
            host: host.clone(),
            opener: Arc::new(RecordingOpener::new()),
            events: inbox.sink(),
        },
    )
    .unwrap()
    .with_unlock_hook(Arc::new(
        move |_content: &ContentSelection, reason: UnlockReason| {
            counter.fetch_add(1, Ordering::SeqCst);
            seen.lock().push(reason);
        },
    ));

    controller.select_content(ContentSelection::episode("free"), &[]);
    controller.select_content(
        ContentSelection::episode("ep1"),
        &[AdRecord::new("a", "https://a.example")],
    );
    controller.activate_ad();
    time.advance(Duration::from_secs(6));
    host.emit(HostSignal::Visible);
    while let Some(event) = inbox.pop() {
        controller.handle(event);
    }
    let horizon = time_now(&time) + Duration::from_secs(5);
    while let Some(id) = time.pop_due(horizon) {
        controller.handle(GateEvent::TimerFired(id));
    }

    assert_eq!(unlocked.load(Ordering::SeqCst), 2);
    assert_eq!(
        *reasons.lock(),
        vec![UnlockReason::NoAds, UnlockReason::QueueCompleted]
    );
}

fn time_now(time: &VirtualTime) -> std::time::Instant {
    use adgate_contracts::prelude::Clock;
    time.now()
}
