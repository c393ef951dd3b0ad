//! Serving gateway configuration.

use serde::Deserialize;

/// Gateway configuration loaded from environment variables.
///
/// Environment variables are prefixed with `GATEWAY_`:
/// - `GATEWAY_HOST`: Server bind address (default: "0.0.0.0")
/// - `GATEWAY_PORT`: Server port (default: 9000)
/// - `GATEWAY_WORKERS`: Number of worker threads (optional, defaults to CPU count)
/// - `GATEWAY_ENABLE_THREADS`: Use a multi-thread runtime (default: true)
/// - `GATEWAY_ALLOWED_HOSTS`: Comma-separated `Host` allowlist (default: "*")
/// - `GATEWAY_STATIC_URL`: URL prefix of collected static assets (default: "/static")
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    pub workers: Option<usize>,

    /// Run handlers on a multi-thread runtime
    #[serde(default = "default_true")]
    pub enable_threads: bool,

    /// Accepted `Host` header values, `*` accepts any
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// URL prefix for static assets
    #[serde(default = "default_static_url")]
    pub static_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_true() -> bool {
    true
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_static_url() -> String {
    "/static".to_string()
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `GATEWAY_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("GATEWAY_").from_env::<GatewayConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Runtime worker threads: 1 when threads are disabled, otherwise the
    /// configured count or the available parallelism.
    pub fn worker_threads(&self) -> usize {
        if !self.enable_threads {
            return 1;
        }
        self.workers.filter(|w| *w > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Static URL prefix normalized to a leading slash and no trailing slash.
    pub fn static_prefix(&self) -> String {
        let trimmed = self.static_url.trim().trim_matches('/');
        if trimmed.is_empty() {
            default_static_url()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Allowed hosts with blanks removed and lowercased.
    pub fn allowed_hosts(&self) -> Vec<String> {
        self.allowed_hosts
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            enable_threads: true,
            allowed_hosts: default_allowed_hosts(),
            static_url: default_static_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert!(config.enable_threads);
    }

    #[test]
    fn test_bind_address() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_worker_threads() {
        let mut config = GatewayConfig {
            workers: Some(4),
            ..GatewayConfig::default()
        };
        assert_eq!(config.worker_threads(), 4);

        config.enable_threads = false;
        assert_eq!(config.worker_threads(), 1);

        config.enable_threads = true;
        config.workers = Some(0);
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn test_static_prefix_normalized() {
        let config = GatewayConfig {
            static_url: "assets/".to_string(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.static_prefix(), "/assets");

        let config = GatewayConfig {
            static_url: "/".to_string(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.static_prefix(), "/static");
    }

    #[test]
    fn test_allowed_hosts_from_env() {
        let config: GatewayConfig = envy::prefixed("GATEWAY_")
            .from_iter(vec![
                (
                    "GATEWAY_ALLOWED_HOSTS".to_string(),
                    "API.example.com, localhost".to_string(),
                ),
                ("GATEWAY_ENABLE_THREADS".to_string(), "false".to_string()),
            ])
            .unwrap();

        assert_eq!(
            config.allowed_hosts(),
            vec!["api.example.com".to_string(), "localhost".to_string()]
        );
        assert!(!config.enable_threads);
    }
}
