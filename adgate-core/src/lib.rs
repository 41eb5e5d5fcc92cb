//! # Adgate Core
//!
//! Ad-gated playback: before content plays, the viewer works through a queue
//! of sponsored links. For each entry they open the ad, stay away for a
//! minimum time and come back; a short countdown then unlocks the next entry
//! or, after the last one, the player itself.
//!
//! ## Architecture
//!
//! - [`queue`]: builds the deterministic, seeded play order for a content item
//! - [`monitor`]: coalesces host focus/visibility signals into one
//!   "returned to foreground" event
//! - [`unlock`]: per-ad verification state machine
//! - [`gate`]: the [`GateController`] owning queue position, lock state, timers
//!   and the active session
//! - [`runtime`]: tokio task driving a controller from commands, host signals
//!   and timers
//! - [`catalog`]: in-memory content-ad association store
//! - [`testing`]: virtual time and manual host doubles for deterministic tests
//!
//! The controller never reads globals; its clock, timers, host and link
//! opener come from `adgate-contracts` traits.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use adgate_core::{
//!     GateConfig, GateRuntime, GateServices, InMemoryAdCatalog,
//!     testing::{ManualHost, RecordingOpener},
//! };
//! use adgate_model::{AdRecord, ContentId, ContentSelection};
//!
//! # async fn demo() -> adgate_core::Result<()> {
//! let catalog = InMemoryAdCatalog::new().with_ads(
//!     ContentId::new("ep-1"),
//!     vec![AdRecord::new("sponsor", "https://sponsor.example").with_occurrences(2)],
//! );
//! let runtime = GateRuntime::spawn(
//!     GateConfig::default(),
//!     GateServices {
//!         catalog: Arc::new(catalog),
//!         host: Arc::new(ManualHost::new()),
//!         opener: Arc::new(RecordingOpener::new()),
//!         unlock_hook: None,
//!     },
//! )?;
//!
//! let gate = runtime.handle();
//! gate.select_content(ContentSelection::episode("ep-1"))?;
//! let view = gate.wait_for(|view| view.session.is_some()).await?;
//! assert!(view.locked);
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod gate;
pub mod monitor;
pub mod queue;
pub mod runtime;
pub mod testing;
pub mod unlock;

pub use catalog::{CatalogDocument, InMemoryAdCatalog};
pub use config::{GateConfig, UnlockTiming};
pub use error::{GateError, Result};
pub use gate::{
    EventSink, GateController, GateDeps, GateEvent, GateView, SessionView,
    UnlockHook, UnlockReason,
};
pub use monitor::{ForegroundEvent, ForegroundMonitor};
pub use queue::{build_queue, build_queue_seeded, descriptors_from_records};
pub use runtime::{
    GateCommand, GateHandle, GateRuntime, GateServices, TokioClock,
    TokioScheduler,
};
pub use unlock::{
    SessionId, TickOutcome, UnlockSession, UnlockStatus, UnlockTransitionError,
    UnlockTrigger, Verification,
};
