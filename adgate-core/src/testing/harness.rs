use std::sync::Arc;
use std::time::Duration;

use adgate_contracts::prelude::{Clock, HostSignal};
use adgate_model::{AdRecord, ContentSelection};

use crate::config::GateConfig;
use crate::gate::{GateController, GateDeps, GateEvent};
use crate::testing::host::{EventInbox, ManualHost, RecordingOpener};
use crate::testing::time::VirtualTime;

/// A [`GateController`] wired to virtual time and a manual host.
///
/// Host signals and timer fires are queued exactly as in production and
/// delivered to the controller by [`pump`](Self::pump), so tests observe the
/// same ordering the runtime would produce.
pub struct GateHarness {
    pub controller: GateController,
    pub time: VirtualTime,
    pub host: Arc<ManualHost>,
    pub opener: Arc<RecordingOpener>,
    pub inbox: EventInbox,
}

impl std::fmt::Debug for GateHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateHarness")
            .field("controller", &self.controller)
            .field("elapsed", &self.time.elapsed())
            .field("pending_events", &self.inbox.len())
            .finish()
    }
}

impl GateHarness {
    /// # Panics
    ///
    /// Panics if `config` is rejected by the controller.
    pub fn new(config: GateConfig) -> Self {
        Self::with_opener(config, RecordingOpener::new())
    }

    pub fn with_opener(config: GateConfig, opener: RecordingOpener) -> Self {
        let time = VirtualTime::new();
        let host = Arc::new(ManualHost::new());
        let opener = Arc::new(opener);
        let inbox = EventInbox::new();

        let deps = GateDeps {
            clock: Arc::new(time.clone()),
            scheduler: Arc::new(time.clone()),
            host: host.clone(),
            opener: opener.clone(),
            events: inbox.sink(),
        };
        let controller = match GateController::new(config, deps) {
            Ok(controller) => controller,
            Err(err) => panic!("harness config rejected: {err}"),
        };

        Self {
            controller,
            time,
            host,
            opener,
            inbox,
        }
    }

    /// Selects content whose catalog holds one `https://{id}.example/` ad per
    /// `(id, occurrences)` pair.
    pub fn select(&mut self, content_id: &str, ads: &[(&str, u32)]) {
        self.select_content(ContentSelection::episode(content_id), ads);
    }

    pub fn select_content(
        &mut self,
        content: ContentSelection,
        ads: &[(&str, u32)],
    ) {
        let records: Vec<AdRecord> = ads
            .iter()
            .map(|(id, occurrences)| {
                AdRecord::new(*id, format!("https://{id}.example/"))
                    .with_occurrences(*occurrences)
            })
            .collect();
        self.controller.select_content(content, &records);
        self.pump();
    }

    /// Delivers every queued event to the controller.
    pub fn pump(&mut self) {
        while let Some(event) = self.inbox.pop() {
            self.controller.handle(event);
        }
    }

    pub fn emit(&mut self, signal: HostSignal) {
        self.host.emit(signal);
        self.pump();
    }

    /// Moves time forward by `duration`, firing due timers in order.
    pub fn advance(&mut self, duration: Duration) {
        let target = self.time.now() + duration;
        loop {
            self.pump();
            match self.time.pop_due(target) {
                Some(id) => self.controller.handle(GateEvent::TimerFired(id)),
                None => break,
            }
        }
        let remaining = target.saturating_duration_since(self.time.now());
        self.time.advance(remaining);
        self.pump();
    }

    /// Opens the current ad, leaves the page for `away`, then comes back
    /// with both host foreground signals.
    pub fn leave_and_return(&mut self, away: Duration) {
        self.controller.activate_ad();
        self.emit(HostSignal::Blur);
        self.emit(HostSignal::Hidden);
        self.advance(away);
        self.emit(HostSignal::Visible);
        self.emit(HostSignal::Focus);
    }

    /// Watches one full ad: leaves long enough and waits out the countdown.
    pub fn watch_current_ad(&mut self) {
        let config = self.controller.config().clone();
        let away = Duration::from_secs(u64::from(config.view_time_secs) + 1);
        self.leave_and_return(away);
        self.advance(
            config.tick_interval()
                * config.unlock_timer_secs.max(1),
        );
    }
}
