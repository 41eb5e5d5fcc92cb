use adgate_contracts::host::{
    ForegroundSignals, HostSignal, SignalSink, Subscription,
};
use tracing::trace;

/// The single logical event the unlock workflow reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundEvent {
    ReturnedToForeground,
}

/// Coalesces host focus and visibility signals into
/// [`ForegroundEvent::ReturnedToForeground`].
///
/// Holds the host listener registration for as long as it lives; dropping the
/// monitor (or calling [`detach`](Self::detach)) releases it exactly once.
/// Keeps no timing state.
#[derive(Debug)]
pub struct ForegroundMonitor {
    subscription: Option<Subscription>,
    away: bool,
}

impl ForegroundMonitor {
    pub fn attach(host: &dyn ForegroundSignals, sink: SignalSink) -> Self {
        Self {
            subscription: Some(host.subscribe(sink)),
            away: false,
        }
    }

    /// The page is known to be losing the user (the ad link was just opened).
    pub fn mark_away(&mut self) {
        self.away = true;
    }

    pub fn is_away(&self) -> bool {
        self.away
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Feeds one host signal; returns an event for the first foreground
    /// signal after the page went away and drops the duplicates.
    pub fn observe(&mut self, signal: HostSignal) -> Option<ForegroundEvent> {
        if !self.is_attached() {
            return None;
        }

        if !signal.is_foreground() {
            self.away = true;
            return None;
        }

        if self.away {
            self.away = false;
            Some(ForegroundEvent::ReturnedToForeground)
        } else {
            trace!(target: "adgate::monitor", ?signal, "coalesced duplicate foreground signal");
            None
        }
    }

    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.away = false;
    }
}
