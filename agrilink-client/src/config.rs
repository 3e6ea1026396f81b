//! Configuration loading for the AGRILINK client.
//!
//! `api_base_url` and `ws_endpoint` are required. Everything else has a
//! default matching the dashboard's behaviour.

use agrilink_cache::CacheConfig;
use agrilink_realtime::config::DEFAULT_HANDSHAKE_TIMEOUT_MS;
use agrilink_realtime::{ChannelConfig, ChannelError, ReconnectConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "AGRILINK_CONFIG";

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_handshake_timeout_ms() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_MS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_endpoint: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// File holding the bearer token. No file, no token.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or AGRILINK_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = resolve_config_path(
            std::env::args().skip(1),
            std::env::var(CONFIG_ENV_VAR).ok(),
        )
        .ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must be an http:// or https:// URL".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(path) = &self.credentials_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "credentials_path",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }
        self.channel_config()
            .validate()
            .map_err(|err| match err {
                ChannelError::InvalidConfig { field, reason } => {
                    ConfigError::InvalidValue { field, reason }
                }
                other => ConfigError::InvalidValue {
                    field: "ws_endpoint",
                    reason: other.to_string(),
                },
            })?;
        self.cache
            .validate()
            .map_err(|err| ConfigError::InvalidValue {
                field: "cache",
                reason: err.to_string(),
            })?;
        Ok(())
    }

    pub fn channel_config(&self) -> ChannelConfig {
        let mut channel =
            ChannelConfig::new(self.ws_endpoint.clone()).with_reconnect(self.reconnect.clone());
        channel.handshake_timeout_ms = self.handshake_timeout_ms;
        channel
    }
}

/// `--config <path>` wins over the environment variable.
pub fn resolve_config_path<I>(args: I, env_value: Option<String>) -> Option<PathBuf>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    env_value.map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
api_base_url = "https://api.agrilink.test"
ws_endpoint = "wss://api.agrilink.test/ws"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ClientConfig::from_toml(MINIMAL).expect("parse");
        config.validate().expect("valid");
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.handshake_timeout_ms, 10_000);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(config.credentials_path.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = ClientConfig::from_toml(
            r#"
api_base_url = "https://api.agrilink.test/"
ws_endpoint = "wss://api.agrilink.test/ws"
request_timeout_ms = 2500
handshake_timeout_ms = 4000
credentials_path = "/var/lib/agrilink/token"
log_format = "json"

[reconnect]
base_ms = 500
max_ms = 10000
multiplier = 3.0
max_attempts = 8
jitter_ms = 100

[cache]
ttl_secs = 60
max_entries = 4
"#,
        )
        .expect("parse");
        config.validate().expect("valid");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.reconnect.max_attempts, 8);
        assert_eq!(config.cache.max_entries, Some(4));

        let channel = config.channel_config();
        assert_eq!(channel.endpoint, "wss://api.agrilink.test/ws");
        assert_eq!(channel.reconnect.base_ms, 500);
        assert_eq!(channel.handshake_timeout_ms, 4000);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = ClientConfig::from_toml(&format!("{}\ntheme = \"dark\"\n", MINIMAL))
            .expect_err("unknown field");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = ClientConfig::from_toml(MINIMAL).expect("parse");
        config.request_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "request_timeout_ms", .. })
        ));

        let mut config = ClientConfig::from_toml(MINIMAL).expect("parse");
        config.ws_endpoint = "https://api.agrilink.test/ws".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "ws_endpoint", .. })
        ));

        let mut config = ClientConfig::from_toml(MINIMAL).expect("parse");
        config.handshake_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "handshake_timeout_ms", .. })
        ));

        let mut config = ClientConfig::from_toml(MINIMAL).expect("parse");
        config.reconnect.multiplier = 0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "reconnect.multiplier", .. })
        ));

        let mut config = ClientConfig::from_toml(MINIMAL).expect("parse");
        config.cache.ttl_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "cache", .. })
        ));
    }

    #[test]
    fn test_resolve_config_path() {
        let args = vec!["--verbose".to_string(), "--config".to_string(), "a.toml".to_string()];
        assert_eq!(
            resolve_config_path(args, Some("b.toml".to_string())),
            Some(PathBuf::from("a.toml"))
        );
        assert_eq!(
            resolve_config_path(Vec::new(), Some("b.toml".to_string())),
            Some(PathBuf::from("b.toml"))
        );
        assert_eq!(resolve_config_path(vec!["--config".to_string()], None), None);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(MINIMAL.as_bytes()).expect("write");
        let config = ClientConfig::from_path(file.path()).expect("load");
        assert_eq!(config.api_base_url, "https://api.agrilink.test");

        let missing = ClientConfig::from_path(Path::new("/nonexistent/agrilink.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
