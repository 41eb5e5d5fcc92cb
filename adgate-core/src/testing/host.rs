//! In-memory stand-ins for the host environment.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use adgate_contracts::prelude::{
    ForegroundSignals, HostSignal, LinkOpener, OpenLinkError, SignalSink,
    Subscription,
};
use parking_lot::Mutex;
use url::Url;

use crate::gate::{EventSink, GateEvent};

/// Host whose focus/visibility signals are emitted by the test.
///
/// Counts registrations and releases so listener leaks show up in
/// assertions.
#[derive(Debug, Default)]
pub struct ManualHost {
    listeners: Arc<Mutex<HashMap<u64, SignalSinkEntry>>>,
    next_id: AtomicU64,
    subscribed: AtomicUsize,
    released: Arc<AtomicUsize>,
}

struct SignalSinkEntry(SignalSink);

impl std::fmt::Debug for SignalSinkEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignalSink")
    }
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `signal` to every registered listener.
    pub fn emit(&self, signal: HostSignal) {
        let sinks: Vec<SignalSink> = self
            .listeners
            .lock()
            .values()
            .map(|entry| Arc::clone(&entry.0))
            .collect();
        for sink in sinks {
            sink(signal);
        }
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn total_subscribed(&self) -> usize {
        self.subscribed.load(Ordering::SeqCst)
    }

    pub fn total_released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ForegroundSignals for ManualHost {
    fn subscribe(&self, sink: SignalSink) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, SignalSinkEntry(sink));
        self.subscribed.fetch_add(1, Ordering::SeqCst);

        let listeners = Arc::clone(&self.listeners);
        let released = Arc::clone(&self.released);
        Subscription::new(move || {
            if listeners.lock().remove(&id).is_some() {
                released.fetch_add(1, Ordering::SeqCst);
            }
        })
    }
}

/// Link opener that records every URL it is asked to open.
#[derive(Debug, Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<Url>>,
    blocked: AtomicBool,
}

impl RecordingOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// An opener that refuses every link, like a host with popups blocked.
    pub fn blocked() -> Self {
        let opener = Self::default();
        opener.set_blocked(true);
        opener
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().clone()
    }
}

impl LinkOpener for RecordingOpener {
    fn open(&self, url: &Url) -> Result<(), OpenLinkError> {
        if self.blocked.load(Ordering::SeqCst) {
            return Err(OpenLinkError::Blocked);
        }
        self.opened.lock().push(url.clone());
        Ok(())
    }
}

/// FIFO of controller events, drained by the test harness.
#[derive(Clone, Debug, Default)]
pub struct EventInbox {
    queue: Arc<Mutex<VecDeque<GateEvent>>>,
}

impl EventInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> EventSink {
        let queue = Arc::clone(&self.queue);
        Arc::new(move |event| queue.lock().push_back(event))
    }

    pub fn pop(&self) -> Option<GateEvent> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
