use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{
    deserialize_duration, deserialize_duration_opt, serialize_duration, serialize_duration_opt,
};

/// Default grace period before an unobserved producer is torn down.
fn default_linger() -> Duration {
    Duration::from_secs(3)
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_response_ttl() -> Duration {
    Duration::from_secs(5)
}

fn default_fiat_currency() -> String {
    "usd".to_string()
}

/// Shared-stream lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplierConfig {
    /// How long a producer keeps running after its last subscriber detaches.
    /// A resubscribe inside this window reuses the running producer.
    #[serde(
        default = "default_linger",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub linger: Duration,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            linger: default_linger(),
        }
    }
}

/// Remote call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Time budget of a single provider attempt before failing over.
    #[serde(
        default = "default_attempt_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub attempt_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: default_attempt_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotesConfig {
    /// Fiat currency quotes are requested in.
    #[serde(default = "default_fiat_currency")]
    pub fiat_currency: String,

    /// How long a fetched quote is served from the fetcher's response cache.
    #[serde(
        default = "default_response_ttl",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub response_ttl: Duration,

    /// Polling period of live quote producers. `None` fetches once per producer.
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_interval: Option<Duration>,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            fiat_currency: default_fiat_currency(),
            response_ttl: default_response_ttl(),
            refresh_interval: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworksConfig {
    /// Polling period of live balance producers. `None` fetches once per producer.
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_interval: Option<Duration>,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider ordering asset. If relative, resolved from the config file location.
    /// If not specified, the asset packaged with the crate is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers_path: Option<PathBuf>,

    pub supplier: SupplierConfig,

    pub fetch: FetchConfig,

    pub quotes: QuotesConfig,

    pub networks: NetworksConfig,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if let (Some(providers), Some(dir)) = (&config.providers_path, path.parent()) {
            if providers.is_relative() {
                config.providers_path = Some(dir.join(providers));
            }
        }

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// `$XDG_CONFIG_HOME/walletfeed/walletfeed.toml` or the platform equivalent.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("walletfeed")
            .join("walletfeed.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.supplier.linger, Duration::from_secs(3));
        assert_eq!(config.fetch.attempt_timeout, Duration::from_secs(10));
        assert_eq!(config.quotes.response_ttl, Duration::from_secs(5));
        assert_eq!(config.quotes.fiat_currency, "usd");
        assert_eq!(config.quotes.refresh_interval, None);
        assert_eq!(config.networks.refresh_interval, None);
        assert!(config.providers_path.is_none());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: Config = toml::from_str(
            r#"
[supplier]
linger = "500ms"

[networks]
refresh_interval = "30s"
"#,
        )
        .unwrap();

        assert_eq!(config.supplier.linger, Duration::from_millis(500));
        assert_eq!(config.networks.refresh_interval, Some(Duration::from_secs(30)));
        assert_eq!(config.fetch.attempt_timeout, Duration::from_secs(10));
        assert_eq!(config.quotes.fiat_currency, "usd");
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
[fetch]
attempt_timeout = "soon"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_resolves_relative_providers_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walletfeed.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "providers_path = \"providers.json\"").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.providers_path, Some(dir.path().join("providers.json")));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.supplier.linger, Duration::from_secs(3));
    }

    #[test]
    fn test_serialized_config_round_trips_through_toml() {
        let mut config = Config::default();
        config.quotes.refresh_interval = Some(Duration::from_secs(60));
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.quotes.refresh_interval, Some(Duration::from_secs(60)));
        assert_eq!(parsed.supplier.linger, config.supplier.linger);
    }
}
