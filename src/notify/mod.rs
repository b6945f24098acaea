//! Alert delivery
//!
//! A notifier sends exactly one message per call. It neither retries nor
//! deduplicates; the checker decides when a breach is worth a message.

pub mod webhook;

pub use webhook::WebhookNotifier;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::alerts::Condition;

/// A new breaching observation that should be notified
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub signal: String,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
    pub condition: Condition,
}

/// Render the alert text for a breach of `measurement.signal`
pub fn format_alert(measurement: &str, breach: &Breach) -> String {
    format!(
        "⚠️ Check sensor: {} {} {} in `{}.{}`\nTime (UTC): {} ⚠️",
        breach.value,
        breach.condition.comparison,
        breach.condition.threshold,
        measurement,
        breach.signal,
        breach.observed_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    )
}

/// Delivery channel for breach notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, breach: &Breach) -> Result<(), NotifyError>;
}

/// Writes breaches to the log instead of delivering them anywhere
pub struct LogNotifier {
    measurement: String,
}

impl LogNotifier {
    /// Create a log notifier for `measurement`
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, breach: &Breach) -> Result<(), NotifyError> {
        tracing::warn!(
            signal = %breach.signal,
            value = breach.value,
            observed_at = %breach.observed_at,
            "Alert triggered: {}",
            format_alert(&self.measurement, breach)
        );
        Ok(())
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Webhook returned status {0}")]
    Status(u16),

    #[error("Notification timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn breach() -> Breach {
        Breach {
            signal: "temp".to_string(),
            value: 61.5,
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 30).unwrap(),
            condition: Condition::greater_than(50.0),
        }
    }

    #[test]
    fn test_format_alert() {
        let message = format_alert("station", &breach());
        assert_eq!(
            message,
            "⚠️ Check sensor: 61.5 > 50 in `station.temp`\nTime (UTC): 2024-05-01T11:59:30Z ⚠️"
        );
    }

    #[tokio::test]
    async fn test_log_notification() {
        let notifier = LogNotifier::new("station");
        // Log notification should always succeed
        assert!(notifier.notify(&breach()).await.is_ok());
    }
}
