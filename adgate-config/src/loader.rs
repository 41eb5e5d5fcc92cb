use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use adgate_core::GateConfig;
use anyhow::{Context, anyhow};
use tracing::{debug, info};

/// Environment variable naming a TOML or JSON config file.
pub const CONFIG_PATH_VAR: &str = "ADGATE_CONFIG_PATH";
/// Environment variable carrying an inline JSON config.
pub const CONFIG_JSON_VAR: &str = "ADGATE_CONFIG_JSON";
pub const VIEW_TIME_VAR: &str = "ADGATE_VIEW_TIME";
pub const UNLOCK_TIMER_VAR: &str = "ADGATE_UNLOCK_TIMER";
pub const RELOCK_AFTER_VAR: &str = "ADGATE_RELOCK_AFTER";
pub const TICK_INTERVAL_VAR: &str = "ADGATE_TICK_INTERVAL";

const DEFAULT_CANDIDATES: &[&str] = &[
    "adgate.toml",
    "adgate.json",
    "config/adgate.toml",
    "config/adgate.json",
];

/// Source that produced the gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GateConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("{key}={value:?} is not a duration: {reason}")]
    InvalidDuration {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{key}={value:?} does not fit in whole seconds")]
    OutOfRange { key: &'static str, value: String },
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLoad {
    pub config: GateConfig,
    pub source: GateConfigSource,
    /// Environment variables that overrode values from `source`
    pub overrides: Vec<&'static str>,
}

/// Resolves [`GateConfig`] from the environment.
///
/// Evaluation order:
/// 1) `.env` in the root directory (existing variables win),
/// 2) `$ADGATE_CONFIG_PATH` (TOML or JSON file),
/// 3) `$ADGATE_CONFIG_JSON` (inline JSON),
/// 4) `adgate.{toml,json}` or `config/adgate.{toml,json}` under the root,
/// 5) defaults if none of the above is present.
///
/// `ADGATE_VIEW_TIME`, `ADGATE_UNLOCK_TIMER`, `ADGATE_RELOCK_AFTER` and
/// `ADGATE_TICK_INTERVAL` are then applied on top. They accept humantime
/// strings (`"90s"`, `"15m"`) or bare seconds.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
    load_dotenv: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            load_dotenv: true,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory searched for `.env` and the default config files.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn without_dotenv(mut self) -> Self {
        self.load_dotenv = false;
        self
    }

    pub fn load(&self) -> anyhow::Result<ConfigLoad> {
        if self.load_dotenv {
            self.load_dotenv_file()?;
        }

        let (mut config, source) = self.load_base()?;
        let overrides = apply_env_overrides(&mut config)?;
        config
            .validate()
            .context("gate configuration failed validation")?;

        info!(
            target: "adgate::config",
            source = ?source,
            overrides = ?overrides,
            view_time_secs = config.view_time_secs,
            unlock_timer_secs = config.unlock_timer_secs,
            relock_after_secs = config.relock_after_secs,
            "gate configuration loaded"
        );

        Ok(ConfigLoad {
            config,
            source,
            overrides,
        })
    }

    fn load_dotenv_file(&self) -> anyhow::Result<()> {
        let path = self.root.join(".env");
        match dotenvy::from_path(&path) {
            Ok(()) => {
                debug!(target: "adgate::config", path = %path.display(), "loaded .env");
                Ok(())
            }
            Err(err) if err.not_found() => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to read env file {}", path.display())
            }),
        }
    }

    fn load_base(&self) -> anyhow::Result<(GateConfig, GateConfigSource)> {
        if let Ok(path_str) = env::var(CONFIG_PATH_VAR)
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = load_from_file(&path)?;
            return Ok((config, GateConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var(CONFIG_JSON_VAR)
            && !raw.trim().is_empty()
        {
            let parsed = parse_json(&raw)
                .with_context(|| format!("failed to parse {CONFIG_JSON_VAR}"))?;
            return Ok((parsed, GateConfigSource::EnvInline));
        }

        if let Some(path) = self.find_default_file() {
            let config = load_from_file(&path)?;
            return Ok((config, GateConfigSource::File(path)));
        }

        Ok((GateConfig::default(), GateConfigSource::Default))
    }

    fn find_default_file(&self) -> Option<PathBuf> {
        DEFAULT_CANDIDATES
            .iter()
            .map(|candidate| self.root.join(candidate))
            .find(|path| path.exists())
    }
}

pub fn load_from_file(path: &Path) -> anyhow::Result<GateConfig> {
    let contents = fs::read_to_string(path).with_context(|| {
        format!("failed to read gate config from {}", path.display())
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_json(&contents)
            .with_context(|| format!("invalid gate config {}", path.display())),
        Some("toml") | Some("tml") => toml::from_str(&contents).map_err(|err| {
            anyhow!("invalid gate config {}: {}", path.display(), err)
        }),
        _ => parse_from_str(&contents, &path.display().to_string()),
    }
}

/// Parses TOML, falling back to JSON.
pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<GateConfig> {
    toml::from_str(contents).or_else(|toml_err| {
        serde_json::from_str(contents).map_err(|json_err| {
            anyhow!(
                "failed to parse gate config {}: toml error: {}; json error: {}",
                origin,
                toml_err,
                json_err
            )
        })
    })
}

pub fn parse_json(raw: &str) -> anyhow::Result<GateConfig> {
    serde_json::from_str(raw)
        .map_err(|err| anyhow!("invalid gate config json: {err}"))
}

/// Applies the per-field environment overrides, returning the variables that
/// were set.
pub fn apply_env_overrides(
    config: &mut GateConfig,
) -> Result<Vec<&'static str>, ConfigLoadError> {
    let mut applied = Vec::new();

    if let Some(duration) = duration_var(VIEW_TIME_VAR)? {
        config.view_time_secs = whole_seconds(VIEW_TIME_VAR, duration)?;
        applied.push(VIEW_TIME_VAR);
    }
    if let Some(duration) = duration_var(UNLOCK_TIMER_VAR)? {
        config.unlock_timer_secs = whole_seconds(UNLOCK_TIMER_VAR, duration)?;
        applied.push(UNLOCK_TIMER_VAR);
    }
    if let Some(duration) = duration_var(RELOCK_AFTER_VAR)? {
        config.relock_after_secs = duration.as_secs();
        applied.push(RELOCK_AFTER_VAR);
    }
    if let Some(duration) = duration_var(TICK_INTERVAL_VAR)? {
        config.tick_interval_ms =
            u64::try_from(duration.as_millis()).map_err(|_| {
                ConfigLoadError::OutOfRange {
                    key: TICK_INTERVAL_VAR,
                    value: humantime::format_duration(duration).to_string(),
                }
            })?;
        applied.push(TICK_INTERVAL_VAR);
    }

    Ok(applied)
}

fn duration_var(key: &'static str) -> Result<Option<Duration>, ConfigLoadError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_duration(key, raw.trim()).map(Some),
        _ => Ok(None),
    }
}

fn parse_duration(key: &'static str, raw: &str) -> Result<Duration, ConfigLoadError> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|err| ConfigLoadError::InvalidDuration {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

fn whole_seconds(key: &'static str, duration: Duration) -> Result<u32, ConfigLoadError> {
    u32::try_from(duration.as_secs()).map_err(|_| ConfigLoadError::OutOfRange {
        key,
        value: humantime::format_duration(duration).to_string(),
    })
}
