//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::RetryPolicy;
use crate::EngineError;

/// Configuration for a mining engine instance.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the mining/wallet API.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Bearer token sent with every backend request.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Directory for the durable snapshot.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Per-request transport timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries after the first initialization attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles per attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Age after which cached state forces a backend sync on launch.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Maximum length of one mining session; accrual stops at this bound.
    #[serde(default = "default_session_length_secs")]
    pub session_length_secs: u64,

    /// How often the expiry detector polls while mining.
    #[serde(default = "default_expiry_check_interval_secs")]
    pub expiry_check_interval_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_backend_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./accrue_data")
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    1_000
}

fn default_stale_after_secs() -> u64 {
    300
}

fn default_session_length_secs() -> u64 {
    86_400
}

fn default_expiry_check_interval_secs() -> u64 {
    60
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.session_length_secs == 0 {
            return Err(EngineError::Config(
                "session_length_secs must be positive".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(EngineError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.expiry_check_interval_secs == 0 {
            return Err(EngineError::Config(
                "expiry_check_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn session_length(&self) -> Duration {
        Duration::from_secs(self.session_length_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_check_interval_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            api_token: None,
            data_dir: default_data_dir(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            stale_after_secs: default_stale_after_secs(),
            session_length_secs: default_session_length_secs(),
            expiry_check_interval_secs: default_expiry_check_interval_secs(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = EngineConfig::default();
        let toml_str = config.to_toml_string().expect("serializable");
        let parsed = EngineConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.max_retries, config.max_retries);
        assert_eq!(parsed.stale_after_secs, config.stale_after_secs);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_base_delay_ms, 1_000);
        assert_eq!(config.stale_after(), Duration::from_secs(300));
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            backend_url = "https://mining.example.com/v1"
            max_retries = 4
        "#;
        let config = EngineConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.backend_url, "https://mining.example.com/v1");
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.session_length_secs, 86_400); // default
    }

    #[test]
    fn zero_session_length_rejected() {
        let result = EngineConfig::from_toml_str("session_length_secs = 0");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("accrue.toml");
        std::fs::write(&path, "stale_after_secs = 60\n").unwrap();
        let config = EngineConfig::from_toml_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.stale_after(), Duration::from_secs(60));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = EngineConfig::from_toml_file("/nonexistent/accrue.toml");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
