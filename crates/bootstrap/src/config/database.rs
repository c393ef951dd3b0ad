//! Database configuration for PostgreSQL connection.

use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::error::{SequencerError, SequencerResult};

/// Database configuration loaded from environment variables.
///
/// Environment variables are prefixed with `DB_`:
/// - `DB_HOST`: Database host (required by the readiness wait)
/// - `DB_PORT`: Database port (default: 5432)
/// - `DB_NAME`: Database name (required)
/// - `DB_USER`: Database user (required)
/// - `DB_PASS`: Database password (default: empty)
/// - `DB_CONNECT_TIMEOUT_SECS`: Timeout of one connection attempt (default: 5)
/// - `DB_MAX_CONNECTIONS`: Pool size once serving (default: 10)
/// - `DB_WAIT_MAX_ATTEMPTS`: Readiness attempt budget (default: 60)
/// - `DB_WAIT_INITIAL_DELAY_MS`: First delay between attempts (default: 1000)
/// - `DB_WAIT_MAX_DELAY_MS`: Upper bound of the doubling delay (default: 1000)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database host
    #[serde(default)]
    pub host: Option<String>,

    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    #[serde(default)]
    pub name: Option<String>,

    /// Database user
    #[serde(default)]
    pub user: Option<String>,

    /// Database password
    #[serde(default, rename = "pass")]
    pub password: String,

    /// Timeout of a single connection attempt in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum connections in the serving pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Maximum readiness attempts before giving up
    #[serde(default = "default_wait_max_attempts")]
    pub wait_max_attempts: u32,

    /// Delay after the first failed attempt, in milliseconds
    #[serde(default = "default_wait_delay_ms")]
    pub wait_initial_delay_ms: u64,

    /// Cap for the doubling delay, in milliseconds
    #[serde(default = "default_wait_delay_ms")]
    pub wait_max_delay_ms: u64,
}

fn default_port() -> u16 {
    5432
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_max_connections() -> u32 {
    10
}

fn default_wait_max_attempts() -> u32 {
    60
}

fn default_wait_delay_ms() -> u64 {
    1000
}

/// Backoff schedule for the datastore readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay after the first failure
    pub initial_delay: Duration,

    /// Upper bound of the delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to sleep after the failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.initial_delay.saturating_mul(1u32 << exponent);
        std::cmp::min(delay, std::cmp::max(self.max_delay, self.initial_delay))
    }
}

impl DatabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `DB_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("DB_").from_env::<DatabaseConfig>()
    }

    /// Get PostgreSQL connection options.
    ///
    /// Fails with `ConfigurationMissing` when host, name or user is absent.
    pub fn connect_options(&self) -> SequencerResult<PgConnectOptions> {
        let host = required(&self.host, "DB_HOST")?;
        let name = required(&self.name, "DB_NAME")?;
        let user = required(&self.user, "DB_USER")?;

        Ok(PgConnectOptions::new()
            .host(host)
            .port(self.port)
            .username(user)
            .password(&self.password)
            .database(name))
    }

    /// Connection URL with the password masked, for logs.
    pub fn display_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            self.user.as_deref().unwrap_or_default(),
            self.host.as_deref().unwrap_or_default(),
            self.port,
            self.name.as_deref().unwrap_or_default()
        )
    }

    /// Timeout applied to one readiness attempt.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    /// Readiness backoff derived from the `DB_WAIT_*` settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.wait_max_attempts.max(1),
            initial_delay: Duration::from_millis(self.wait_initial_delay_ms),
            max_delay: Duration::from_millis(self.wait_max_delay_ms),
        }
    }
}

fn required<'a>(value: &'a Option<String>, var: &'static str) -> SequencerResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SequencerError::ConfigurationMissing(var))
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            name: None,
            user: None,
            password: String::new(),
            connect_timeout_secs: default_connect_timeout(),
            max_connections: default_max_connections(),
            wait_max_attempts: default_wait_max_attempts(),
            wait_initial_delay_ms: default_wait_delay_ms(),
            wait_max_delay_ms: default_wait_delay_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.wait_max_attempts, 60);
        assert!(config.host.is_none());
    }

    #[test]
    fn test_from_prefixed_vars() {
        let config: DatabaseConfig = envy::prefixed("DB_")
            .from_iter(vars(&[
                ("DB_HOST", "db"),
                ("DB_NAME", "devdb"),
                ("DB_USER", "devuser"),
                ("DB_PASS", "changeme"),
                ("DB_WAIT_MAX_ATTEMPTS", "3"),
            ]))
            .unwrap();

        assert_eq!(config.host.as_deref(), Some("db"));
        assert_eq!(config.password, "changeme");
        assert_eq!(config.wait_max_attempts, 3);
        assert_eq!(config.port, 5432);
        assert!(config.connect_options().is_ok());
    }

    #[test]
    fn test_missing_host_is_reported() {
        let config = DatabaseConfig {
            name: Some("devdb".to_string()),
            user: Some("devuser".to_string()),
            ..DatabaseConfig::default()
        };

        let err = config.connect_options().unwrap_err();
        assert!(matches!(err, SequencerError::ConfigurationMissing("DB_HOST")));
    }

    #[test]
    fn test_blank_user_counts_as_missing() {
        let config = DatabaseConfig {
            host: Some("db".to_string()),
            name: Some("devdb".to_string()),
            user: Some("  ".to_string()),
            ..DatabaseConfig::default()
        };

        let err = config.connect_options().unwrap_err();
        assert!(matches!(err, SequencerError::ConfigurationMissing("DB_USER")));
    }

    #[test]
    fn test_display_url_masks_password() {
        let config = DatabaseConfig {
            host: Some("db".to_string()),
            name: Some("devdb".to_string()),
            user: Some("devuser".to_string()),
            password: "secret".to_string(),
            ..DatabaseConfig::default()
        };
        assert_eq!(config.display_url(), "postgres://devuser:***@db:5432/devdb");
    }

    #[test]
    fn test_retry_policy_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(500));
        assert_eq!(policy.delay_after(40), Duration::from_millis(500));
    }

    #[test]
    fn test_default_policy_is_fixed_one_second() {
        let policy = DatabaseConfig::default().retry_policy();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(5), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_connect_timeout_is_clamped() {
        let config = DatabaseConfig {
            connect_timeout_secs: 0,
            ..DatabaseConfig::default()
        };
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
    }
}
