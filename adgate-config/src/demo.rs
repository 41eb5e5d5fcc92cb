//! Scripted end-to-end run of the gate, used by the `adgate-demo` binary.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use adgate_contracts::prelude::{AdCatalog, HostSignal, LinkOpener, OpenLinkError};
use adgate_core::testing::ManualHost;
use adgate_core::{
    GateConfig, GateRuntime, GateServices, GateView, InMemoryAdCatalog,
    SessionId, UnlockStatus,
};
use adgate_model::{AdRecord, ContentSelection};
use anyhow::{Context, anyhow};
use tracing::info;
use url::Url;

/// Link opener for terminals: prints the URL instead of launching anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutOpener;

impl LinkOpener for StdoutOpener {
    fn open(&self, url: &Url) -> Result<(), OpenLinkError> {
        info!(target: "adgate::demo", %url, "opening ad");
        println!("  -> open {url}");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub content: ContentSelection,
    /// How long the scripted viewer stays on each ad page
    pub away: Duration,
    /// Ad activations allowed before the run gives up
    pub max_attempts: u32,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            content: ContentSelection::episode("demo-episode"),
            away: Duration::from_secs(6),
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoReport {
    pub ads_viewed: usize,
    pub attempts: u32,
    pub failures: u32,
}

/// Two sponsors, the first shown twice.
pub fn sample_catalog() -> InMemoryAdCatalog {
    InMemoryAdCatalog::new().with_global_ads(vec![
        AdRecord::new("sponsor-a", "https://sponsor-a.example/offer")
            .with_occurrences(2),
        AdRecord::new("sponsor-b", "https://sponsor-b.example/"),
    ])
}

pub fn load_catalog(path: &Path) -> anyhow::Result<InMemoryAdCatalog> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read ads from {}", path.display()))?;
    InMemoryAdCatalog::from_json_str(&raw)
        .with_context(|| format!("invalid ad catalog {}", path.display()))
}

/// One-line rendering of the overlay state.
pub fn describe(view: &GateView) -> String {
    match &view.session {
        Some(session) => {
            let mut line = format!(
                "Security lock {} of {} [{}] ad={} #{}",
                session.ad_number,
                session.total_ads,
                session.status,
                session.ad_id,
                session.sequence_index
            );
            if session.status == UnlockStatus::Countdown {
                line.push_str(&format!(
                    " unlocking in {}s",
                    session.remaining_countdown_secs
                ));
            }
            line
        }
        None if view.locked => "locked".to_string(),
        None => "unlocked".to_string(),
    }
}

/// Plays a viewer who opens every ad, stays away for `options.away` and
/// retries after failures, until the player unlocks.
pub async fn run_demo(
    config: GateConfig,
    catalog: Arc<dyn AdCatalog>,
    options: DemoOptions,
) -> anyhow::Result<DemoReport> {
    let host = Arc::new(ManualHost::new());
    let runtime = GateRuntime::spawn(
        config,
        GateServices {
            catalog,
            host: host.clone(),
            opener: Arc::new(StdoutOpener),
            unlock_hook: None,
        },
    )?;
    let gate = runtime.handle();
    let mut views = gate.subscribe();
    gate.select_content(options.content.clone())?;

    let mut report = DemoReport::default();
    let mut activated: Option<SessionId> = None;
    let mut last_line = String::new();

    let outcome = loop {
        let view = views.borrow_and_update().clone();
        let line = describe(&view);
        if line != last_line {
            println!("{line}");
            last_line = line;
        }

        if view.content.is_some() && !view.locked {
            report.ads_viewed = view.queue_len;
            break Ok(());
        }

        if let Some(session) = &view.session {
            match session.status {
                UnlockStatus::Idle if activated != Some(session.session) => {
                    if report.attempts >= options.max_attempts {
                        break Err(anyhow!(
                            "gave up after {} attempts",
                            report.attempts
                        ));
                    }
                    report.attempts += 1;
                    activated = Some(session.session);

                    gate.activate_ad()?;
                    host.emit(HostSignal::Blur);
                    host.emit(HostSignal::Hidden);
                    tokio::time::sleep(options.away).await;
                    host.emit(HostSignal::Visible);
                    host.emit(HostSignal::Focus);
                }
                UnlockStatus::Failed => {
                    report.failures += 1;
                    activated = None;
                    gate.request_retry()?;
                }
                _ => {}
            }
        }

        if views.changed().await.is_err() {
            break Err(anyhow!("gate runtime stopped"));
        }
    };

    runtime.shutdown().await;
    outcome.map(|()| report)
}
