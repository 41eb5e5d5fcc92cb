use std::time::Duration;

use adgate_model::TimingOverrides;
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Knobs that tune how strict the gate is.
///
/// All fields carry defaults so a deployment can override a single value
/// without supplying a full configuration payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum seconds the viewer must stay away after opening an ad before
    /// returning counts as a view. Individual ads may override this.
    pub view_time_secs: u32,
    /// Length of the countdown shown after a successful verification.
    /// Individual ads may override this.
    pub unlock_timer_secs: u32,
    /// How long long-form content stays unlocked before the gate re-engages.
    pub relock_after_secs: u64,
    /// Countdown tick period in milliseconds. One tick removes one second
    /// from the countdown.
    pub tick_interval_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            view_time_secs: 5,
            unlock_timer_secs: 3,
            relock_after_secs: 15 * 60,
            tick_interval_ms: 1_000,
        }
    }
}

impl GateConfig {
    pub fn relock_after(&self) -> Duration {
        Duration::from_secs(self.relock_after_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Resolves an ad's timing against these defaults.
    pub fn timing_for(&self, overrides: &TimingOverrides) -> UnlockTiming {
        UnlockTiming {
            view_time: Duration::from_secs(u64::from(
                overrides.view_time_secs.unwrap_or(self.view_time_secs),
            )),
            countdown_secs: overrides
                .unlock_timer_secs
                .unwrap_or(self.unlock_timer_secs),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(GateError::InvalidConfig(
                "tick_interval_ms must be greater than zero".into(),
            ));
        }
        if self.relock_after_secs == 0 {
            return Err(GateError::InvalidConfig(
                "relock_after_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Effective verification timing for one queue entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnlockTiming {
    pub view_time: Duration,
    pub countdown_secs: u32,
}

impl Default for UnlockTiming {
    fn default() -> Self {
        GateConfig::default().timing_for(&TimingOverrides::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GateConfig::default();
        assert_eq!(config.view_time_secs, 5);
        assert_eq!(config.unlock_timer_secs, 3);
        assert_eq!(config.relock_after(), Duration::from_secs(900));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn per_ad_overrides_win_over_defaults() {
        let config = GateConfig::default();
        let timing = config.timing_for(&TimingOverrides {
            view_time_secs: Some(20),
            unlock_timer_secs: None,
        });
        assert_eq!(timing.view_time, Duration::from_secs(20));
        assert_eq!(timing.countdown_secs, 3);
    }

    #[test]
    fn partial_payload_keeps_other_defaults() {
        let config: GateConfig =
            serde_json::from_str(r#"{"view_time_secs": 8}"#).unwrap();
        assert_eq!(config.view_time_secs, 8);
        assert_eq!(config.unlock_timer_secs, 3);
        assert_eq!(config.relock_after_secs, 900);
    }

    #[test]
    fn zero_periods_are_rejected() {
        let config = GateConfig {
            tick_interval_ms: 0,
            ..GateConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GateError::InvalidConfig(_))
        ));

        let config = GateConfig {
            relock_after_secs: 0,
            ..GateConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
