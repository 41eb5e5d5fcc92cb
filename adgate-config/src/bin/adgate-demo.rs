use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adgate_config::demo::{self, DemoOptions};
use adgate_config::{ConfigLoader, init_tracing};
use adgate_model::{ContentKind, ContentSelection};
use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "adgate-demo",
    about = "Run the ad gate against a scripted viewer"
)]
struct Cli {
    /// Content id to select; also seeds the ad order
    #[arg(long, default_value = "demo-episode")]
    content: String,
    /// Treat the content as long-form (enables periodic re-lock)
    #[arg(long)]
    movie: bool,
    /// JSON ad catalog (`{"global": [...], "content": {...}}`)
    #[arg(long)]
    ads: Option<PathBuf>,
    /// Seconds the scripted viewer stays on each ad page
    #[arg(long, default_value_t = 6)]
    away_secs: u64,
    /// Give up after this many ad activations
    #[arg(long, default_value_t = 10)]
    max_attempts: u32,
    /// Directory holding `.env` and `adgate.toml`
    #[arg(long, default_value = ".")]
    config_root: PathBuf,
    /// Overrides the view time from configuration
    #[arg(long)]
    view_time_secs: Option<u32>,
    /// Overrides the unlock countdown from configuration
    #[arg(long)]
    unlock_timer_secs: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info")?;
    let cli = Cli::parse();

    let loaded = ConfigLoader::new()
        .with_root(cli.config_root.clone())
        .load()?;
    let mut config = loaded.config;
    if let Some(secs) = cli.view_time_secs {
        config.view_time_secs = secs;
    }
    if let Some(secs) = cli.unlock_timer_secs {
        config.unlock_timer_secs = secs;
    }

    let catalog = match &cli.ads {
        Some(path) => demo::load_catalog(path)?,
        None => demo::sample_catalog(),
    };
    let kind = if cli.movie {
        ContentKind::Movie
    } else {
        ContentKind::Episode
    };

    let report = demo::run_demo(
        config,
        Arc::new(catalog),
        DemoOptions {
            content: ContentSelection::new(cli.content, kind),
            away: Duration::from_secs(cli.away_secs),
            max_attempts: cli.max_attempts,
        },
    )
    .await?;

    println!(
        "unlocked after {} ad(s): {} attempt(s), {} failed",
        report.ads_viewed, report.attempts, report.failures
    );
    Ok(())
}
