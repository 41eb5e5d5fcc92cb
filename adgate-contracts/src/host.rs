//! Host page focus/visibility signals.
//!
//! Browsers and embedding shells disagree on which of "window focused" and
//! "document became visible" fire when a user comes back to a tab, so hosts
//! report both and the gate's monitor coalesces them.

use std::fmt;
use std::sync::Arc;

/// Raw focus/visibility transition reported by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostSignal {
    Focus,
    Blur,
    Visible,
    Hidden,
}

impl HostSignal {
    /// `Focus` and `Visible` both mean the page is in front of the user again.
    pub fn is_foreground(&self) -> bool {
        matches!(self, HostSignal::Focus | HostSignal::Visible)
    }
}

/// Callback a host invokes for every signal while subscribed.
pub type SignalSink = Arc<dyn Fn(HostSignal) + Send + Sync>;

/// Source of [`HostSignal`]s.
pub trait ForegroundSignals: Send + Sync {
    /// Registers `sink` for focus and visibility signals. The listener stays
    /// registered until the returned [`Subscription`] is released.
    fn subscribe(&self, sink: SignalSink) -> Subscription;
}

/// Disposer for a host listener registration.
///
/// Releasing is guaranteed to run the host's deregistration exactly once,
/// whether through [`Subscription::unsubscribe`] or by dropping the value.
#[must_use = "dropping a Subscription immediately unregisters the listener"]
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.disposer.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            tracing::trace!(target: "adgate::host", "releasing host listener");
            disposer();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
