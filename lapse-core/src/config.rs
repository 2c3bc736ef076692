//! Configuration for lapse containers, the janitor, and pending requests.
//!
//! Maps directly to `lapse.toml`. Every section and field has a default, so an
//! empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{Lifespan, TimeUnit};
use crate::error::{LapseError, Result};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LapseConfig {
    /// Sweep cadence.
    #[serde(default)]
    pub janitor: JanitorConfig,
    /// Defaults for containers built from this configuration.
    #[serde(default)]
    pub containers: ContainerConfig,
    /// Response-request settings.
    #[serde(default)]
    pub requests: RequestConfig,
}

impl LapseConfig {
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

    /// Reject values that would make the janitor or requests misbehave.
    ///
    /// # Errors
    /// Returns `LapseError::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.janitor.interval_ticks == 0 {
            return Err(LapseError::Config("janitor.interval_ticks must be > 0".into()));
        }
        if self.requests.default_timeout.amount <= 0 {
            return Err(LapseError::Config(format!(
                "requests.default_timeout must be positive, got {}",
                self.requests.default_timeout
            )));
        }
        for placeholder in ["{response}", "{options}"] {
            if !self.requests.ambiguity_template.contains(placeholder) {
                return Err(LapseError::Config(format!(
                    "requests.ambiguity_template is missing {placeholder}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Janitor scheduling, in host ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JanitorConfig {
    /// Ticks between sweeps.
    #[serde(default = "default_interval_ticks")]
    pub interval_ticks: u64,
    /// Ticks before the first sweep.
    #[serde(default = "default_interval_ticks")]
    pub start_delay_ticks: u64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval_ticks: default_interval_ticks(),
            start_delay_ticks: default_interval_ticks(),
        }
    }
}

/// Container defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Lifespan used when a caller gives none. Zero means forever.
    #[serde(default)]
    pub default_lifespan: LifespanSetting,
}

/// Response-request defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Timeout for requests submitted without one.
    #[serde(default = "default_request_timeout")]
    pub default_timeout: LifespanSetting,
    /// Notice sent when a response matches several requests.
    /// `{response}` and `{options}` are substituted.
    #[serde(default = "default_ambiguity_template")]
    pub ambiguity_template: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_request_timeout(),
            ambiguity_template: default_ambiguity_template(),
        }
    }
}

/// A lifespan as written in configuration: an amount and a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifespanSetting {
    /// Amount of `unit`. Zero or negative means forever.
    pub amount: i64,
    /// Unit of `amount`.
    pub unit: TimeUnit,
}

impl LifespanSetting {
    /// Build a setting.
    #[must_use]
    pub const fn new(amount: i64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    /// The lifespan this setting describes.
    #[must_use]
    pub fn lifespan(self) -> Lifespan {
        Lifespan::of(self.amount, self.unit)
    }

    /// The duration this setting describes, which must be finite.
    ///
    /// # Errors
    /// Returns `LapseError::InvalidLifespan` when `amount` is not positive.
    pub fn required(self) -> Result<Duration> {
        Lifespan::required(self.amount, self.unit)
    }
}

impl Default for LifespanSetting {
    fn default() -> Self {
        Self::new(0, TimeUnit::Seconds)
    }
}

impl std::fmt::Display for LifespanSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

fn default_interval_ticks() -> u64 { 20 }
fn default_request_timeout() -> LifespanSetting { LifespanSetting::new(30, TimeUnit::Seconds) }
fn default_ambiguity_template() -> String {
    "Several requests accept '{response}'. Reply with one of: {options}".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = LapseConfig::from_toml("").expect("parse");
        assert_eq!(config.janitor.interval_ticks, 20);
        assert_eq!(config.janitor.start_delay_ticks, 20);
        assert_eq!(config.containers.default_lifespan.lifespan(), Lifespan::Forever);
        assert_eq!(
            config.requests.default_timeout.required().expect("finite"),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn sections_override_defaults() {
        let config = LapseConfig::from_toml(
            r#"
            [janitor]
            interval_ticks = 5

            [containers]
            default_lifespan = { amount = 2, unit = "minutes" }

            [requests]
            default_timeout = { amount = 100, unit = "ticks" }
            "#,
        )
        .expect("parse");

        assert_eq!(config.janitor.interval_ticks, 5);
        assert_eq!(config.janitor.start_delay_ticks, 20);
        assert_eq!(
            config.containers.default_lifespan.lifespan(),
            Lifespan::Finite(Duration::from_secs(120))
        );
        assert_eq!(
            config.requests.default_timeout.required().expect("finite"),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = LapseConfig::from_toml("[janitor]\ninterval_ticks = 0").unwrap_err();
        assert!(err.to_string().contains("interval_ticks"));
    }

    #[test]
    fn template_without_placeholders_is_rejected() {
        let err = LapseConfig::from_toml("[requests]\nambiguity_template = \"pick one\"").unwrap_err();
        assert!(matches!(err, LapseError::Config(_)));
    }

    #[test]
    fn unknown_unit_is_a_config_error() {
        let err = LapseConfig::from_toml("[containers]\ndefault_lifespan = { amount = 1, unit = \"fortnights\" }")
            .unwrap_err();
        assert!(matches!(err, LapseError::Config(_)));
    }
}
