//! Deterministic test doubles for the gate.
//!
//! Shipped with the library so downstream crates can drive a controller
//! through full scenarios without a runtime or a real browser host.

pub mod harness;
pub mod host;
pub mod time;

pub use harness::GateHarness;
pub use host::{EventInbox, ManualHost, RecordingOpener};
pub use time::VirtualTime;
