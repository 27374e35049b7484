//! Configuration management

use crate::error::{FeedError, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default aggregate feed endpoint
pub const DEFAULT_FEED_URL: &str = "wss://socket.polygon.io/stocks";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub strategy: MomentumConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Streaming endpoint (wss://)
    pub url: String,
    /// Feed credential sent in the auth message
    pub api_key: Option<String>,
    /// Transport connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Close the connection as soon as the subscription is acknowledged.
    /// Only meant for exercising the handshake in tests.
    pub close_after_subscribe: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            api_key: None,
            connect_timeout_secs: 10,
            close_after_subscribe: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Window durations in seconds, one per resolution (1s, 10s, 1m, 5m)
    pub resolutions_secs: [i64; 4],
    /// Bars kept per ticker per resolution
    pub history_len: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            resolutions_secs: [1, 10, 60, 300],
            history_len: 30,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self.resolutions_secs.iter().find(|secs| **secs <= 0) {
            return Err(FeedError::Config(format!(
                "window duration must be positive, got {}",
                bad
            )));
        }
        if self.history_len == 0 {
            return Err(FeedError::Config(
                "history_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Session window start (exchange local time)
    pub session_start: NaiveTime,
    /// Session window end, exclusive
    pub session_end: NaiveTime,
    /// Exchange time zone the session window is expressed in
    pub timezone: Tz,
    /// Required close / reference open ratio
    pub gain_ratio: Decimal,
    /// Lower price bound, exclusive
    pub min_price: Decimal,
    /// Upper price bound, exclusive
    pub max_price: Decimal,
    /// Minimum volume of the newest one-minute bar
    pub min_minute_volume: i64,
    /// Newest 10s volume must stay below this multiple of the 5-minute volume
    pub volume_ratio: Decimal,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            session_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            session_end: NaiveTime::from_hms_opt(9, 25, 0).unwrap_or_default(),
            timezone: chrono_tz::America::New_York,
            gain_ratio: Decimal::new(12, 1),   // +20%
            min_price: Decimal::new(2, 0),     // $2
            max_price: Decimal::new(50, 0),    // $50
            min_minute_volume: 3000,
            volume_ratio: Decimal::new(15, 1), // 1.5x
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path
            .as_ref()
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("config path is not valid UTF-8"))?;

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("PASTA").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = ["config.toml", "config.yaml", "~/.config/pasta-trader/config.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        anyhow::bail!("No configuration file found")
    }

    pub fn validate(&self) -> Result<()> {
        if !self.feed.url.starts_with("wss://") && !self.feed.url.starts_with("ws://") {
            return Err(FeedError::Config(format!(
                "feed url must be a websocket url, got {}",
                self.feed.url
            )));
        }
        self.aggregation.validate()
    }
}
