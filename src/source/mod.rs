//! Time-series data sources
//!
//! A data source answers one question per tick: what is the latest value of
//! each tracked signal within a trailing window. Signals without data in the
//! window are simply missing from the answer.

pub mod influx;

pub use influx::{InfluxClient, InfluxConfig};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Latest sample of one signal
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub signal: String,
    /// `None` when the stored value is missing or not numeric
    pub value: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    /// Create an observation
    pub fn new(signal: impl Into<String>, value: Option<f64>, observed_at: DateTime<Utc>) -> Self {
        Self {
            signal: signal.into(),
            value,
            observed_at,
        }
    }
}

/// Source of the most recent observation per signal
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the most recent observation of each signal within `window`.
    ///
    /// The map holds at most one entry per signal. A signal with no data in
    /// the window has no entry.
    async fn fetch_latest(
        &self,
        signals: &[String],
        window: Duration,
    ) -> Result<HashMap<String, Observation>, FetchError>;
}

/// Data source errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Query returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}
