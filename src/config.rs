//! Harness configuration.
//!
//! Values come from defaults, a JSON document, or `RULEKIT_*` environment
//! variables. Environment values override whatever was loaded before.

use crate::failure::ConfigError;
use crate::timeouts::{saturating_millis, DEFAULT_GRACE_PERIOD, DEFAULT_TEST_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DEFAULT_TIMEOUT_MS: &str = "RULEKIT_DEFAULT_TIMEOUT_MS";
pub const ENV_GRACE_PERIOD_MS: &str = "RULEKIT_GRACE_PERIOD_MS";
pub const ENV_LOOKUP_STUCK_THREADS: &str = "RULEKIT_LOOKUP_STUCK_THREADS";
pub const ENV_DEBUG: &str = "RULEKIT_DEBUG";
pub const ENV_REPORT_PATH: &str = "RULEKIT_REPORT_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Per-test deadline in milliseconds; zero disables it.
    pub default_timeout_ms: u64,
    pub grace_period_ms: u64,
    pub lookup_stuck_threads: bool,
    /// Disables rules wrapped in `DisableOnDebug`.
    pub debug: bool,
    pub report_path: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: saturating_millis(DEFAULT_TEST_TIMEOUT),
            grace_period_ms: saturating_millis(DEFAULT_GRACE_PERIOD),
            lookup_stuck_threads: false,
            debug: false,
            report_path: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(value) = read_env(ENV_DEFAULT_TIMEOUT_MS) {
            self.default_timeout_ms = parse_u64(ENV_DEFAULT_TIMEOUT_MS, value)?;
        }
        if let Some(value) = read_env(ENV_GRACE_PERIOD_MS) {
            self.grace_period_ms = parse_u64(ENV_GRACE_PERIOD_MS, value)?;
        }
        if let Some(value) = read_env(ENV_LOOKUP_STUCK_THREADS) {
            self.lookup_stuck_threads = parse_flag(ENV_LOOKUP_STUCK_THREADS, value)?;
        }
        if let Some(value) = read_env(ENV_DEBUG) {
            self.debug = parse_flag(ENV_DEBUG, value)?;
        }
        if let Some(value) = read_env(ENV_REPORT_PATH) {
            self.report_path = Some(PathBuf::from(value));
        }
        Ok(self)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_ms > 0).then(|| Duration::from_millis(self.default_timeout_ms))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Whether `RULEKIT_DEBUG` marks this process as being debugged.
pub fn debug_mode() -> bool {
    read_env(ENV_DEBUG)
        .and_then(|value| parse_flag(ENV_DEBUG, value).ok())
        .unwrap_or(false)
}

fn read_env(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = HarnessConfig::from_json(r#"{"default_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.grace_period(), DEFAULT_GRACE_PERIOD);
        assert!(config.report_path.is_none());
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let err = HarnessConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn env_overrides_defaults() {
        let _guard = env_lock().lock().unwrap();
        std::env::set_var(ENV_DEFAULT_TIMEOUT_MS, "1500");
        std::env::set_var(ENV_LOOKUP_STUCK_THREADS, "yes");
        let config = HarnessConfig::from_env().unwrap();
        std::env::remove_var(ENV_DEFAULT_TIMEOUT_MS);
        std::env::remove_var(ENV_LOOKUP_STUCK_THREADS);
        assert_eq!(config.default_timeout_ms, 1500);
        assert!(config.lookup_stuck_threads);
    }

    #[test]
    fn malformed_env_value_is_rejected() {
        let _guard = env_lock().lock().unwrap();
        std::env::set_var(ENV_GRACE_PERIOD_MS, "soon");
        let err = HarnessConfig::from_env().unwrap_err();
        std::env::remove_var(ENV_GRACE_PERIOD_MS);
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                key: ENV_GRACE_PERIOD_MS,
                ..
            }
        ));
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        assert_eq!(HarnessConfig::default().default_timeout(), None);
    }

    #[test]
    fn defaults_mirror_timeout_constants() {
        let config = HarnessConfig::default();
        assert_eq!(config.grace_period(), DEFAULT_GRACE_PERIOD);
        assert_eq!(config.default_timeout_ms, 0);
    }
}
