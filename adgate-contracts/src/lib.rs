//! Trait surfaces for the collaborators the gate controller depends on.
//!
//! Everything the controller needs from its host environment (time, timers,
//! page focus/visibility, opening external links, the ad store) is expressed
//! here so it can be injected rather than reached through globals.

pub mod catalog;
pub mod clock;
pub mod host;
pub mod opener;
pub mod timer;

/// Frequently used contracts for runtime and test crates.
pub mod prelude {
    pub use super::catalog::{AdCatalog, CatalogError};
    pub use super::clock::{Clock, SystemClock};
    pub use super::host::{
        ForegroundSignals, HostSignal, SignalSink, Subscription,
    };
    pub use super::opener::{LinkOpener, OpenLinkError};
    pub use super::timer::{TimerId, TimerKind, TimerSchedule, TimerScheduler};
}
