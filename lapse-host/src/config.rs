//! Host configuration: the core settings plus how the host drives them.
//!
//! ```toml
//! profile = "threaded"
//! tick_rate = 20
//! log_level = "info"
//! json_logs = false
//!
//! [janitor]
//! interval_ticks = 20
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use lapse_core::{LapseConfig, LapseError, Result};

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// How ticks are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostProfile {
    /// The host's game loop calls `tick()` itself.
    #[default]
    Cooperative,
    /// A tokio heartbeat ticks at `tick_rate`.
    Threaded,
}

impl HostProfile {
    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Cooperative => "Cooperative: ticked by the host game loop",
            Self::Threaded => "Threaded: ticked by a tokio heartbeat",
        }
    }

    /// Whether a heartbeat task should be spawned.
    #[must_use]
    pub fn uses_heartbeat(self) -> bool {
        matches!(self, Self::Threaded)
    }
}

// ---------------------------------------------------------------------------
// Host Configuration
// ---------------------------------------------------------------------------

/// Everything a host needs to stand up a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Core settings, read from the `[janitor]`, `[containers]` and
    /// `[requests]` tables.
    #[serde(flatten)]
    pub lapse: LapseConfig,
    /// Tick source.
    #[serde(default)]
    pub profile: HostProfile,
    /// Heartbeat ticks per wall-clock second (threaded profile).
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines.
    #[serde(default)]
    pub json_logs: bool,
}

impl HostConfig {
    /// Load configuration from a TOML string and validate it.
    ///
    /// # Errors
    /// Returns `LapseError::Config` if the TOML is invalid or a value is out of range.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| LapseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate the core settings and the host's own.
    ///
    /// # Errors
    /// Returns `LapseError::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.lapse.validate()?;
        if self.tick_rate == 0 {
            return Err(LapseError::Config("tick_rate must be > 0".into()));
        }
        if self.log_level.trim().is_empty() {
            return Err(LapseError::Config("log_level must not be empty".into()));
        }
        Ok(())
    }

    /// Wall-clock time between heartbeat ticks.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            lapse: LapseConfig::default(),
            profile: HostProfile::default(),
            tick_rate: default_tick_rate(),
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_tick_rate() -> u32 { u32::try_from(lapse_core::clock::TICKS_PER_SECOND).unwrap_or(20) }
fn default_log_level() -> String { "info".to_string() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_cooperative_at_twenty_hz() {
        let config = HostConfig::from_toml("").expect("parse");
        assert_eq!(config.profile, HostProfile::Cooperative);
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.tick_period(), Duration::from_millis(50));
        assert_eq!(config.lapse.janitor.interval_ticks, 20);
        assert!(!config.json_logs);
    }

    #[test]
    fn core_tables_sit_beside_host_keys() {
        let toml = r#"
            profile = "threaded"
            tick_rate = 10
            json_logs = true

            [janitor]
            interval_ticks = 5
            start_delay_ticks = 1

            [requests]
            default_timeout = { amount = 10, unit = "seconds" }
        "#;
        let config = HostConfig::from_toml(toml).expect("parse");
        assert!(config.profile.uses_heartbeat());
        assert_eq!(config.tick_period(), Duration::from_millis(100));
        assert_eq!(config.lapse.janitor.interval_ticks, 5);
        assert_eq!(config.lapse.requests.default_timeout.amount, 10);
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        assert!(matches!(
            HostConfig::from_toml("tick_rate = 0"),
            Err(LapseError::Config(_))
        ));
    }

    #[test]
    fn core_validation_still_applies() {
        assert!(HostConfig::from_toml("[janitor]\ninterval_ticks = 0").is_err());
    }
}
