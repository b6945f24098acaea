//! Alertwatch: threshold alerts for sensor time-series
//!
//! Polls the latest value of a fixed set of fields from an InfluxDB
//! measurement, compares each against a threshold and posts a webhook
//! message for every new breach. A breach is identified by its observation
//! timestamp, so a value that stays put is reported once, while a fresh
//! breaching sample is reported again.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use alertwatch::alerts::{AlertChecker, CheckerConfig};
//! use alertwatch::config::WatcherConfig;
//! use alertwatch::notify::LogNotifier;
//! use alertwatch::source::InfluxClient;
//! use alertwatch::state::JsonFileStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WatcherConfig::from_env()?;
//! let source = InfluxClient::new(config.influx.clone(), config.query_timeout)?;
//! let notifier = LogNotifier::new(config.influx.measurement.clone());
//! let store = JsonFileStore::new(&config.state_file);
//!
//! let mut checker = AlertChecker::new(
//!     CheckerConfig::from(&config),
//!     Arc::new(source),
//!     Arc::new(notifier),
//!     Arc::new(store),
//! );
//! let report = checker.tick().await;
//! println!("notified: {:?}", report.notified);
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod config;
pub mod notify;
pub mod source;
pub mod state;

pub use alerts::{AlertChecker, CheckerConfig, Comparison, Condition, TickReport};
pub use config::{ConfigError, WatcherConfig};
pub use notify::{Breach, Notifier, NotifyError};
pub use source::{DataSource, FetchError, Observation};
pub use state::{AlertState, StateError, StateStore};
