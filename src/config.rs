//! Configuration types for videogen-tasks

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable that overrides the default API origin
pub const BASE_URL_ENV: &str = "VIDEOGEN_API_BASE_URL";

/// Origin used when neither the config nor the environment names one
pub const DEFAULT_BASE_URL: &str = "https://api.xlap.top";

/// Remote generation service settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base origin of the generation service (default: `$VIDEOGEN_API_BASE_URL`,
    /// falling back to "https://api.xlap.top")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (None = transport default)
    ///
    /// A hung status call only delays its own tick; later ticks are not blocked
    /// by it, so no timeout is imposed unless one is configured here.
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: None,
        }
    }
}

/// Status polling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between status ticks (default: 10 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
        }
    }
}

/// Durable storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./videogen-tasks.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for [`TaskManager`](crate::TaskManager)
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) - service origin and transport settings
/// - [`polling`](PollingConfig) - tick interval
/// - [`persistence`](PersistenceConfig) - where session state survives restarts
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote generation service settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Status polling settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Durable storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Check the configuration for values the task manager cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is not an absolute http(s) URL or
    /// the polling interval is zero.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.api.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {}", self.api.base_url, e),
            key: Some("api.base_url".to_string()),
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::Config {
                message: format!(
                    "base URL must use http or https, got '{}'",
                    parsed.scheme()
                ),
                key: Some("api.base_url".to_string()),
            });
        }

        if self.polling.interval.is_zero() {
            return Err(Error::Config {
                message: "polling interval must be greater than zero".to_string(),
                key: Some("polling.interval".to_string()),
            });
        }

        Ok(())
    }
}

fn default_base_url() -> String {
    std::env::var(BASE_URL_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./videogen-tasks.db")
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_match_the_hosted_service() {
        // SAFETY: serialized with every other test touching the environment
        unsafe { std::env::remove_var(BASE_URL_ENV) };

        let config = Config::default();
        assert_eq!(config.api.base_url, "https://api.xlap.top");
        assert_eq!(config.api.request_timeout, None);
        assert_eq!(config.polling.interval, Duration::from_secs(10));
        assert_eq!(
            config.persistence.database_path,
            PathBuf::from("./videogen-tasks.db")
        );
        config.validate().unwrap();
    }

    #[test]
    #[serial]
    fn base_url_env_var_overrides_default() {
        // SAFETY: serialized with every other test touching the environment
        unsafe { std::env::set_var(BASE_URL_ENV, "http://localhost:9000") };
        let config = Config::default();
        unsafe { std::env::remove_var(BASE_URL_ENV) };

        assert_eq!(config.api.base_url, "http://localhost:9000");
    }

    #[test]
    #[serial]
    fn blank_env_var_is_ignored() {
        // SAFETY: serialized with every other test touching the environment
        unsafe { std::env::set_var(BASE_URL_ENV, "   ") };
        let config = Config::default();
        unsafe { std::env::remove_var(BASE_URL_ENV) };

        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    #[serial]
    fn partial_json_fills_in_defaults() {
        let json = r#"{
            "api": { "base_url": "https://example.test", "request_timeout": 30 },
            "polling": { "interval": 3 }
        }"#;

        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.api.base_url, "https://example.test");
        assert_eq!(config.api.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.polling.interval, Duration::from_secs(3));
        assert_eq!(
            config.persistence.database_path,
            PathBuf::from("./videogen-tasks.db")
        );
    }

    #[test]
    fn durations_serialize_as_whole_seconds() {
        let config = Config {
            api: ApiConfig {
                base_url: "https://example.test".into(),
                request_timeout: Some(Duration::from_secs(45)),
            },
            polling: PollingConfig {
                interval: Duration::from_secs(10),
            },
            persistence: PersistenceConfig::default(),
        };

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["api"]["request_timeout"], 45);
        assert_eq!(value["polling"]["interval"], 10);
    }

    #[test]
    #[serial]
    fn validate_rejects_unparsable_base_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".into();

        match config.validate().unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("api.base_url")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn validate_rejects_non_http_scheme() {
        let mut config = Config::default();
        config.api.base_url = "ftp://files.example.test".into();

        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    #[serial]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.api.base_url = DEFAULT_BASE_URL.into();
        config.polling.interval = Duration::ZERO;

        match config.validate().unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("polling.interval")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
