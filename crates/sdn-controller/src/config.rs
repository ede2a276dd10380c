//! Controller configuration

use sdn_common::{FlowKey, Host, Intent, SdnError, SdnResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Scheduler tick period in milliseconds
    pub probe_interval_ms: u64,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Remove every installed route when the controller stops
    pub teardown_on_exit: bool,
    /// Intent catalog
    pub intents: Vec<Intent>,
    /// Emulated fabric settings
    pub emulator: EmulatorConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: 1000,
            log_filter: "info".into(),
            teardown_on_exit: false,
            intents: default_intents(),
            emulator: EmulatorConfig::default(),
        }
    }
}

/// Built-in intent catalog
pub fn default_intents() -> Vec<Intent> {
    vec![
        Intent::new(Host::H1, Host::H4, 90.0),
        Intent::new(Host::H1, Host::H5, 90.0),
        Intent::new(Host::H1, Host::H6, 20.0),
        Intent::new(Host::H2, Host::H4, 600.0),
        Intent::new(Host::H2, Host::H5, 50.0),
        Intent::new(Host::H2, Host::H6, 150.0),
    ]
}

impl ControllerConfig {
    /// Load from a TOML file and validate
    pub fn load(path: impl AsRef<Path>) -> SdnResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML and validate
    pub fn from_toml(content: &str) -> SdnResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| SdnError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the controller relies on
    pub fn validate(&self) -> SdnResult<()> {
        if self.probe_interval_ms == 0 {
            return Err(SdnError::ConfigError("probe_interval_ms must be positive".into()));
        }
        let mut seen: HashSet<FlowKey> = HashSet::new();
        for intent in &self.intents {
            intent.validate()?;
            if !seen.insert(intent.key()) {
                return Err(SdnError::InvalidIntent(format!("duplicate intent for {}", intent.key())));
            }
        }
        self.emulator.validate()
    }

    /// Scheduler tick period
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

/// Emulated fabric: link delays as in the reference lab topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// One-way delay of path A (s1-s2) in ms
    pub path_a_delay_ms: u64,
    /// One-way delay of path B (s1-s3) in ms
    pub path_b_delay_ms: u64,
    /// One-way delay of path C (s1-s4) in ms
    pub path_c_delay_ms: u64,
    /// One-way controller to switch latency in ms
    pub control_latency_ms: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            path_a_delay_ms: 200,
            path_b_delay_ms: 50,
            path_c_delay_ms: 10,
            control_latency_ms: 2,
        }
    }
}

impl EmulatorConfig {
    fn validate(&self) -> SdnResult<()> {
        // probe stamps are 32-bit tenths of ms
        const MAX_DELAY_MS: u64 = 60_000;
        let delays = [self.path_a_delay_ms, self.path_b_delay_ms, self.path_c_delay_ms, self.control_latency_ms];
        if delays.iter().any(|d| *d > MAX_DELAY_MS) {
            return Err(SdnError::ConfigError(format!(
                "emulated delays must not exceed {} ms",
                MAX_DELAY_MS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.intents.len(), 6);
        assert_eq!(config.probe_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_toml() {
        let config = ControllerConfig::from_toml(
            r#"
            probe_interval_ms = 250

            [[intents]]
            source = "h3"
            destination = "h6"
            delay = 40.0

            [emulator]
            path_b_delay_ms = 80
            "#,
        )
        .unwrap();

        assert_eq!(config.probe_interval_ms, 250);
        assert_eq!(config.intents, vec![Intent::new(Host::H3, Host::H6, 40.0)]);
        assert_eq!(config.emulator.path_b_delay_ms, 80);
        assert_eq!(config.emulator.path_a_delay_ms, 200);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ControllerConfig::from_toml("").unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_rejects_duplicate_intent() {
        let err = ControllerConfig::from_toml(
            r#"
            [[intents]]
            source = "h1"
            destination = "h4"
            delay = 10.0

            [[intents]]
            source = "h1"
            destination = "h4"
            delay = 20.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SdnError::InvalidIntent(_)));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ControllerConfig::from_toml("probe_interval_ms = 0").is_err());
        assert!(ControllerConfig::from_toml(
            "[[intents]]\nsource = \"h4\"\ndestination = \"h1\"\ndelay = 10.0"
        )
        .is_err());
        assert!(ControllerConfig::from_toml("[[intents]]\nsource = \"h9\"\ndestination = \"h4\"\ndelay = 1.0").is_err());
    }
}
