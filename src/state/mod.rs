//! Durable alert state
//!
//! Remembers, per signal, the timestamp of the last observation that was
//! successfully notified. That timestamp is the deduplication key.

pub mod file;

pub use file::JsonFileStore;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last notified observation timestamp per signal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertState {
    last_notified: BTreeMap<String, DateTime<Utc>>,
}

impl AlertState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the last notified observation for `signal`
    pub fn last_notified(&self, signal: &str) -> Option<DateTime<Utc>> {
        self.last_notified.get(signal).copied()
    }

    /// Whether the observation at `observed_at` was already notified
    pub fn is_notified(&self, signal: &str, observed_at: DateTime<Utc>) -> bool {
        self.last_notified(signal) == Some(observed_at)
    }

    /// Record a successful notification, returning the previous timestamp
    pub fn record(&mut self, signal: impl Into<String>, observed_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.last_notified.insert(signal.into(), observed_at)
    }

    /// Number of signals with a notified observation
    pub fn len(&self) -> usize {
        self.last_notified.len()
    }

    /// Whether no signal has been notified yet
    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}

/// Durable storage for [`AlertState`]
pub trait StateStore: Send + Sync {
    /// Read the stored state. Missing or unreadable storage yields an empty
    /// state; this never fails.
    fn load(&self) -> AlertState;

    /// Overwrite the stored state with `state`
    fn save(&self, state: &AlertState) -> Result<(), StateError>;
}

/// Alert state persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_and_dedup() {
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 30).unwrap();

        let mut state = AlertState::new();
        assert!(!state.is_notified("temp", t1));
        assert_eq!(state.record("temp", t1), None);
        assert!(state.is_notified("temp", t1));
        assert!(!state.is_notified("temp", t2));
        assert!(!state.is_notified("humidity", t1));

        assert_eq!(state.record("temp", t2), Some(t1));
        assert_eq!(state.last_notified("temp"), Some(t2));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let mut state = AlertState::new();
        state.record("temp", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"temp":"2024-05-01T12:00:00Z"}"#);

        let parsed: AlertState = serde_json::from_str(r#"{"temp":"2024-05-01T12:00:00+00:00"}"#).unwrap();
        assert_eq!(parsed, state);
    }
}
