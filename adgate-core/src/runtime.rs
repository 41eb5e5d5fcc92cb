//! Tokio driver for [`GateController`].
//!
//! One task owns the controller and drains a single inbox, so commands from
//! the UI, host signals and timer fires are applied strictly one at a time in
//! arrival order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use adgate_contracts::prelude::{
    AdCatalog, Clock, ForegroundSignals, LinkOpener, TimerId, TimerSchedule,
    TimerScheduler,
};
use adgate_model::ContentSelection;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::gate::{
    EventSink, GateController, GateDeps, GateEvent, GateView, UnlockHook,
};

/// Input accepted by the runtime task.
#[derive(Debug, Clone)]
pub enum GateCommand {
    SelectContent(ContentSelection),
    ActivateAd,
    Retry,
    Event(GateEvent),
}

/// Clock backed by tokio's time source, so paused-time tests see the same
/// "now" as the timers.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Timer scheduler that posts fires back into the runtime inbox.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<GateCommand>,
    tasks: Mutex<HashMap<TimerId, JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<GateCommand>) -> Self {
        Self {
            tx,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn armed(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("armed", &self.armed())
            .finish()
    }
}

impl TimerScheduler for TokioScheduler {
    fn schedule(&self, id: TimerId, schedule: TimerSchedule) {
        let tx = self.tx.clone();
        let fired = GateCommand::Event(GateEvent::TimerFired(id));

        let handle = match schedule {
            TimerSchedule::Once(delay) => tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(fired);
            }),
            TimerSchedule::Every(period) => tokio::spawn(async move {
                let start = tokio::time::Instant::now() + period;
                let mut interval = tokio::time::interval_at(start, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if tx.send(fired.clone()).is_err() {
                        break;
                    }
                }
            }),
        };

        if let Some(previous) = self.tasks.lock().insert(id, handle) {
            previous.abort();
        }
    }

    fn cancel(&self, id: TimerId) {
        if let Some(handle) = self.tasks.lock().remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.lock().drain() {
            handle.abort();
        }
    }
}

/// Environment-facing collaborators of a [`GateRuntime`].
#[derive(Clone)]
pub struct GateServices {
    pub catalog: Arc<dyn AdCatalog>,
    pub host: Arc<dyn ForegroundSignals>,
    pub opener: Arc<dyn LinkOpener>,
    pub unlock_hook: Option<UnlockHook>,
}

impl fmt::Debug for GateServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateServices")
            .field("unlock_hook", &self.unlock_hook.is_some())
            .finish_non_exhaustive()
    }
}

/// Cloneable front door to a running gate.
#[derive(Clone, Debug)]
pub struct GateHandle {
    tx: mpsc::UnboundedSender<GateCommand>,
    view: watch::Receiver<GateView>,
}

impl GateHandle {
    fn send(&self, command: GateCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| GateError::RuntimeClosed)
    }

    pub fn select_content(&self, content: ContentSelection) -> Result<()> {
        self.send(GateCommand::SelectContent(content))
    }

    pub fn activate_ad(&self) -> Result<()> {
        self.send(GateCommand::ActivateAd)
    }

    pub fn request_retry(&self) -> Result<()> {
        self.send(GateCommand::Retry)
    }

    /// Latest published view.
    pub fn view(&self) -> GateView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GateView> {
        self.view.clone()
    }

    /// Waits until the published view satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&GateView) -> bool,
    ) -> Result<GateView> {
        let mut view = self.view.clone();
        let current = view
            .wait_for(|v| predicate(v))
            .await
            .map_err(|_| GateError::RuntimeClosed)?;
        Ok(current.clone())
    }
}

/// A gate controller running on its own tokio task.
#[derive(Debug)]
pub struct GateRuntime {
    handle: GateHandle,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl GateRuntime {
    /// Spawns the runtime task. Must be called from within a tokio runtime.
    pub fn spawn(config: GateConfig, services: GateServices) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let event_tx = tx.clone();
        let events: EventSink = Arc::new(move |event| {
            let _ = event_tx.send(GateCommand::Event(event));
        });
        let deps = GateDeps {
            clock: Arc::new(TokioClock),
            scheduler: Arc::new(TokioScheduler::new(tx.clone())),
            host: services.host,
            opener: services.opener,
            events,
        };

        let mut controller = GateController::new(config, deps)?;
        if let Some(hook) = services.unlock_hook {
            controller = controller.with_unlock_hook(hook);
        }
        let view = controller.subscribe();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            controller,
            services.catalog,
            rx,
            shutdown.clone(),
        ));
        info!(target: "adgate::runtime", "gate runtime started");

        Ok(Self {
            handle: GateHandle { tx, view },
            shutdown,
            task: Some(task),
        })
    }

    pub fn handle(&self) -> GateHandle {
        self.handle.clone()
    }

    /// Stops the task and waits for the controller to tear down.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            error!(target: "adgate::runtime", error = %err, "gate runtime task failed");
        }
    }
}

impl Drop for GateRuntime {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_loop(
    mut controller: GateController,
    catalog: Arc<dyn AdCatalog>,
    mut rx: mpsc::UnboundedReceiver<GateCommand>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(target: "adgate::runtime", "gate runtime shutting down");
                break;
            }
            Some(command) = rx.recv() => match command {
                GateCommand::SelectContent(content) => {
                    let records = match catalog.ads_for(&content).await {
                        Ok(records) => records,
                        Err(err) => {
                            error!(
                                target: "adgate::runtime",
                                content = %content.id,
                                error = %err,
                                "ad catalog lookup failed; playing without ads"
                            );
                            Vec::new()
                        }
                    };
                    controller.select_content(content, &records);
                }
                GateCommand::ActivateAd => controller.activate_ad(),
                GateCommand::Retry => controller.request_retry(),
                GateCommand::Event(event) => controller.handle(event),
            }
        }
    }

    controller.teardown();
}
