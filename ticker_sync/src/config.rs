//! Application configuration: TOML file, `.env`, and environment overrides.
//!
//! Resolution order (later wins):
//! 1. Built-in defaults ([`AppConfig::default`]).
//! 2. An optional TOML file passed with `--config`.
//! 3. Environment variables (a `.env` file in the working directory is loaded first):
//!    `DATABASE_URL`, `SIMULATION_MODE`, `APCA_API_KEY_ID`, `APCA_API_SECRET_KEY`.
//!
//! Example file:
//! ```toml
//! database_url = "ticker_sync.db"
//! simulation_mode = true
//! default_symbols = ["AAPL", "MSFT"]
//!
//! [refresh]
//! live_interval_secs = 300
//! simulated_interval_secs = 30
//! retry_ceiling_secs = 900
//!
//! [alpaca]
//! trading_url = "https://paper-api.alpaca.markets"
//! requests_per_minute = 200
//! ```
//!
//! Credentials are only read from the environment so they never sit in a config file.

use std::{num::NonZeroU32, path::Path, time::Duration};

use market_data_ingestor::providers::alpaca_rest::AlpacaConfig;
use serde::Deserialize;
use shared_utils::env::{lookup_env_var, parse_bool};

use crate::{credentials::Credentials, source::SourceMode};

/// Symbols seeded into an empty database.
pub const DEFAULT_SYMBOLS: [&str; 5] = ["AAPL", "GOOGL", "MSFT", "AMZN", "META"];

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was requested.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`AppConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value parsed but is out of range.
    #[error("invalid config value for {key}: {message}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// SQLite file path.
    pub database_url: String,
    /// Start in simulated mode instead of live.
    pub simulation_mode: bool,
    /// Symbols seeded on `init` and on a simulated start.
    pub default_symbols: Vec<String>,
    /// Loop cadence and request limits.
    pub refresh: RefreshSettings,
    /// Alpaca endpoints.
    pub alpaca: AlpacaSettings,
    /// Key pair from the environment, if both variables were set.
    #[serde(skip)]
    pub env_credentials: Option<Credentials>,
}

/// `[refresh]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshSettings {
    /// Base interval between cycles in live mode.
    pub live_interval_secs: u64,
    /// Base interval between cycles in simulated mode.
    pub simulated_interval_secs: u64,
    /// Backoff ceiling.
    pub retry_ceiling_secs: u64,
    /// Per-request timeout for provider calls.
    pub request_timeout_secs: u64,
    /// Daily-bar lookback used to find the latest two closes.
    pub lookback_days: i64,
}

/// `[alpaca]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlpacaSettings {
    /// Market data host.
    pub data_url: String,
    /// Trading host.
    pub trading_url: String,
    /// Client-side request budget.
    pub requests_per_minute: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "ticker_sync.db".to_string(),
            simulation_mode: false,
            default_symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            refresh: RefreshSettings::default(),
            alpaca: AlpacaSettings::default(),
            env_credentials: None,
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            live_interval_secs: 300,
            simulated_interval_secs: 30,
            retry_ceiling_secs: 900,
            request_timeout_secs: 30,
            lookback_days: 2,
        }
    }
}

impl Default for AlpacaSettings {
    fn default() -> Self {
        let defaults = AlpacaConfig::default();
        Self {
            data_url: defaults.data_url,
            trading_url: defaults.trading_url,
            requests_per_minute: defaults.requests_per_minute.get(),
        }
    }
}

impl AppConfig {
    /// Loads `.env`, then the optional TOML file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();

        let base = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                    path: p.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        base.with_overrides(lookup_env_var)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies environment overrides through `lookup`, which returns trimmed non-blank values.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(raw) = lookup("SIMULATION_MODE") {
            self.simulation_mode = parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "SIMULATION_MODE",
                message: format!("expected a boolean, got {raw:?}"),
            })?;
        }
        if let (Some(key), Some(secret)) = (lookup("APCA_API_KEY_ID"), lookup("APCA_API_SECRET_KEY"))
        {
            self.env_credentials = Some(Credentials::new(key, secret));
        }
        self.validate()?;
        Ok(self)
    }

    /// Mode the daemon starts in.
    pub fn initial_mode(&self) -> SourceMode {
        if self.simulation_mode {
            SourceMode::Simulated
        } else {
            SourceMode::Live
        }
    }

    /// Base refresh interval for `mode`.
    pub fn base_interval(&self, mode: SourceMode) -> Duration {
        match mode {
            SourceMode::Live => Duration::from_secs(self.refresh.live_interval_secs),
            SourceMode::Simulated => Duration::from_secs(self.refresh.simulated_interval_secs),
        }
    }

    /// Backoff ceiling.
    pub fn retry_ceiling(&self) -> Duration {
        Duration::from_secs(self.refresh.retry_ceiling_secs)
    }

    /// Provider configuration for live mode.
    pub fn alpaca_config(&self) -> AlpacaConfig {
        let requests_per_minute = NonZeroU32::new(self.alpaca.requests_per_minute)
            .unwrap_or(AlpacaConfig::default().requests_per_minute);
        AlpacaConfig {
            data_url: self.alpaca.data_url.trim_end_matches('/').to_string(),
            trading_url: self.alpaca.trading_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.refresh.request_timeout_secs),
            requests_per_minute,
            lookback: chrono::Duration::days(self.refresh.lookback_days),
            ..AlpacaConfig::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.refresh;
        if r.live_interval_secs == 0 || r.simulated_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "refresh",
                message: "intervals must be at least one second".into(),
            });
        }
        if r.retry_ceiling_secs < r.live_interval_secs.max(r.simulated_interval_secs) {
            return Err(ConfigError::Invalid {
                key: "refresh.retry_ceiling_secs",
                message: "ceiling must not be below the base intervals".into(),
            });
        }
        if r.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "refresh.request_timeout_secs",
                message: "timeout must be at least one second".into(),
            });
        }
        if r.lookback_days < 1 {
            return Err(ConfigError::Invalid {
                key: "refresh.lookback_days",
                message: "lookback must cover at least one day".into(),
            });
        }
        if self.alpaca.requests_per_minute == 0 {
            return Err(ConfigError::Invalid {
                key: "alpaca.requests_per_minute",
                message: "must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.database_url, "ticker_sync.db");
        assert!(!cfg.simulation_mode);
        assert_eq!(cfg.default_symbols, DEFAULT_SYMBOLS);
        assert_eq!(cfg.base_interval(SourceMode::Live), Duration::from_secs(300));
        assert_eq!(cfg.base_interval(SourceMode::Simulated), Duration::from_secs(30));
        assert_eq!(cfg.retry_ceiling(), Duration::from_secs(900));
        assert_eq!(cfg.alpaca_config().trading_url, "https://paper-api.alpaca.markets");
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let cfg = AppConfig::from_toml_str(
            r#"
            simulation_mode = true
            [refresh]
            simulated_interval_secs = 5
            [alpaca]
            data_url = "http://localhost:9000/"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.initial_mode(), SourceMode::Simulated);
        assert_eq!(cfg.base_interval(SourceMode::Simulated), Duration::from_secs(5));
        assert_eq!(cfg.refresh.live_interval_secs, 300);
        assert_eq!(cfg.alpaca_config().data_url, "http://localhost:9000");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppConfig::from_toml_str("databse_url = \"x.db\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn ceiling_below_base_is_invalid() {
        let err = AppConfig::from_toml_str("[refresh]\nretry_ceiling_secs = 10").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "refresh.retry_ceiling_secs",
                ..
            }
        ));
    }

    #[test]
    fn env_overrides_win() {
        let cfg = AppConfig::default()
            .with_overrides(env(&[
                ("DATABASE_URL", "/tmp/other.db"),
                ("SIMULATION_MODE", "yes"),
                ("APCA_API_KEY_ID", "PKTESTKEY1234"),
                ("APCA_API_SECRET_KEY", "secret"),
            ]))
            .unwrap();
        assert_eq!(cfg.database_url, "/tmp/other.db");
        assert_eq!(cfg.initial_mode(), SourceMode::Simulated);
        assert_eq!(
            cfg.env_credentials.as_ref().map(|c| c.masked_key()),
            Some("PKTE...1234".to_string())
        );
    }

    #[test]
    fn half_a_key_pair_is_ignored() {
        let cfg = AppConfig::default()
            .with_overrides(env(&[("APCA_API_KEY_ID", "PKTESTKEY1234")]))
            .unwrap();
        assert!(cfg.env_credentials.is_none());
    }

    #[test]
    fn bad_simulation_flag_is_reported() {
        let err = AppConfig::default()
            .with_overrides(env(&[("SIMULATION_MODE", "sometimes")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SIMULATION_MODE", .. }));
    }
}
