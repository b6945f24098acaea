//! Watcher configuration
//!
//! Read once from the environment at startup:
//! - INFLUX_URL: store base URL (default: http://influxdb:8086)
//! - INFLUX_TOKEN: API token (optional)
//! - INFLUX_ORG, INFLUX_BUCKET, WATCHER_MEASUREMENT: required
//! - WATCHER_FIELD: comma-separated tracked fields (default: value)
//! - WATCHER_THRESHOLD: threshold (default: 50)
//! - WATCHER_COMPARISON: gt, gte, eq, lt, lte or ne (default: gt)
//! - WATCHER_WINDOW_SEC: trailing query window (default: 300)
//! - DISCORD_WEBHOOK: webhook URL; alerts are only logged when unset
//! - INTERVAL_SEC: poll interval (default: 30)
//! - STATE_FILE: alert state path (default: .last_discord_alert.json)
//! - QUERY_TIMEOUT_SEC, NOTIFY_TIMEOUT_SEC: collaborator timeouts (default: 10)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::alerts::{Comparison, Condition};
use crate::source::InfluxConfig;

pub const DEFAULT_INFLUX_URL: &str = "http://influxdb:8086";
pub const DEFAULT_FIELD: &str = "value";
pub const DEFAULT_THRESHOLD: f64 = 50.0;
pub const DEFAULT_WINDOW_SECS: u64 = 300;
pub const DEFAULT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_STATE_FILE: &str = ".last_discord_alert.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Complete, immutable watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub influx: InfluxConfig,
    /// Tracked fields within the measurement
    pub signals: Vec<String>,
    pub condition: Condition,
    /// Trailing window for the latest-value query
    pub window: Duration,
    pub interval: Duration,
    pub webhook_url: Option<String>,
    pub state_file: PathBuf,
    pub query_timeout: Duration,
    pub notify_timeout: Duration,
}

impl WatcherConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let influx = InfluxConfig {
            url: get("INFLUX_URL").unwrap_or_else(|| DEFAULT_INFLUX_URL.to_string()),
            token: get("INFLUX_TOKEN"),
            org: required("INFLUX_ORG")?,
            bucket: required("INFLUX_BUCKET")?,
            measurement: required("WATCHER_MEASUREMENT")?,
        };

        let mut signals: Vec<String> = Vec::new();
        for field in get("WATCHER_FIELD").unwrap_or_default().split(',') {
            let field = field.trim();
            if !field.is_empty() && !signals.iter().any(|s| s == field) {
                signals.push(field.to_string());
            }
        }
        if signals.is_empty() {
            signals.push(DEFAULT_FIELD.to_string());
        }

        let threshold = parse_or("WATCHER_THRESHOLD", get("WATCHER_THRESHOLD"), DEFAULT_THRESHOLD)?;
        let comparison = match get("WATCHER_COMPARISON") {
            Some(raw) => Comparison::from_str(&raw).map_err(|reason| ConfigError::Invalid {
                key: "WATCHER_COMPARISON",
                value: raw,
                reason,
            })?,
            None => Comparison::GreaterThan,
        };

        let secs = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
            let value: u64 = parse_or(key, get(key), default)?;
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    value: value.to_string(),
                    reason: "must be at least 1 second".to_string(),
                });
            }
            Ok(Duration::from_secs(value))
        };

        Ok(Self {
            influx,
            signals,
            condition: Condition::new(comparison, threshold),
            window: secs("WATCHER_WINDOW_SEC", DEFAULT_WINDOW_SECS)?,
            interval: secs("INTERVAL_SEC", DEFAULT_INTERVAL_SECS)?,
            webhook_url: get("DISCORD_WEBHOOK"),
            state_file: get("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            query_timeout: secs("QUERY_TIMEOUT_SEC", DEFAULT_TIMEOUT_SECS)?,
            notify_timeout: secs("NOTIFY_TIMEOUT_SEC", DEFAULT_TIMEOUT_SECS)?,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
