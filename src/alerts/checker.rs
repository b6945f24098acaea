//! Background alert checker
//!
//! Each tick walks through the same phases:
//!
//! ```text
//!  Idle ──► Fetching ──► Evaluating ──► Notifying(0..n) ──► Persisting ──► Idle
//!              │                                                          ▲
//!              └──────────────── fetch failed ────────────────────────────┘
//! ```
//!
//! A breach is notified once per observation timestamp. The state is only
//! advanced after the notifier reported success, and it is written to the
//! store right away, before the next signal is looked at.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};

use super::condition::Condition;
use crate::config::WatcherConfig;
use crate::notify::{Breach, Notifier, NotifyError};
use crate::source::{DataSource, FetchError};
use crate::state::{AlertState, StateError, StateStore};

/// What to watch and how long collaborators may take
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub signals: Vec<String>,
    pub condition: Condition,
    pub window: Duration,
    pub fetch_timeout: Duration,
    pub notify_timeout: Duration,
}

impl From<&WatcherConfig> for CheckerConfig {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            signals: config.signals.clone(),
            condition: config.condition,
            window: config.window,
            fetch_timeout: config.query_timeout,
            notify_timeout: config.notify_timeout,
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Default)]
pub struct TickReport {
    /// Set when the fetch failed and the tick was abandoned
    pub fetch_error: Option<FetchError>,
    /// Signals with no data in the query window
    pub absent: Vec<String>,
    /// Signals whose latest value is missing or not numeric
    pub without_value: Vec<String>,
    /// Signals evaluated as not breaching
    pub clear: Vec<String>,
    /// Breaching signals already notified for the same timestamp
    pub duplicates: Vec<String>,
    pub notified: Vec<String>,
    pub notify_failures: Vec<(String, NotifyError)>,
    pub persist_errors: Vec<StateError>,
}

impl TickReport {
    /// True when nothing failed during the tick
    pub fn is_clean(&self) -> bool {
        self.fetch_error.is_none() && self.notify_failures.is_empty() && self.persist_errors.is_empty()
    }
}

/// Polls a data source and notifies new breaches exactly once
pub struct AlertChecker {
    source: Arc<dyn DataSource>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn StateStore>,
    config: CheckerConfig,
    /// Owned by the checker; only advanced after a successful notification
    state: AlertState,
}

impl AlertChecker {
    /// Create a checker, loading the previous alert state from `store`
    pub fn new(
        config: CheckerConfig,
        source: Arc<dyn DataSource>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let state = store.load();
        Self {
            source,
            notifier,
            store,
            config,
            state,
        }
    }

    /// Current in-memory alert state
    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Run one fetch-evaluate-notify pass
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        let fetched = match timeout(
            self.config.fetch_timeout,
            self.source.fetch_latest(&self.config.signals, self.config.window),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.config.fetch_timeout)),
        };

        let observations = match fetched {
            Ok(observations) => observations,
            Err(e) => {
                tracing::error!(error = %e, "Fetch failed, skipping tick");
                report.fetch_error = Some(e);
                return report;
            }
        };

        for signal in &self.config.signals {
            let Some(observation) = observations.get(signal) else {
                tracing::debug!(signal = %signal, "No recent data");
                report.absent.push(signal.clone());
                continue;
            };

            let Some(value) = observation.value else {
                tracing::debug!(signal = %signal, "Latest value is not numeric");
                report.without_value.push(signal.clone());
                continue;
            };

            if !self.config.condition.is_breached(value) {
                report.clear.push(signal.clone());
                continue;
            }

            if self.state.is_notified(signal, observation.observed_at) {
                tracing::debug!(
                    signal = %signal,
                    observed_at = %observation.observed_at,
                    "Breach already notified"
                );
                report.duplicates.push(signal.clone());
                continue;
            }

            let breach = Breach {
                signal: signal.clone(),
                value,
                observed_at: observation.observed_at,
                condition: self.config.condition,
            };

            let sent = match timeout(self.config.notify_timeout, self.notifier.notify(&breach)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout(self.config.notify_timeout)),
            };

            if let Err(e) = sent {
                tracing::error!(
                    signal = %signal,
                    observed_at = %observation.observed_at,
                    error = %e,
                    "Failed to send notification, will retry next tick"
                );
                report.notify_failures.push((signal.clone(), e));
                continue;
            }

            tracing::info!(
                signal = %signal,
                value = value,
                observed_at = %observation.observed_at,
                "Breach notified"
            );
            self.state.record(signal.clone(), observation.observed_at);
            report.notified.push(signal.clone());

            // The in-memory state keeps the update even when the write fails,
            // so this process will not resend; the next successful save
            // brings the file back in line.
            if let Err(e) = self.store.save(&self.state) {
                tracing::error!(signal = %signal, error = %e, "Failed to persist alert state");
                report.persist_errors.push(e);
            }
        }

        report
    }

    /// Start ticking in the background, once right away and then every
    /// `check_interval`.
    ///
    /// The loop ends when [`CheckerHandle::stop`] is called or the handle is
    /// dropped. A tick in progress is finished first.
    pub fn start(self, check_interval: Duration) -> CheckerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        // tokio intervals must be non-zero
        let check_interval = check_interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut checker = self;
            let mut ticker = interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                signals = ?checker.config.signals,
                condition = %checker.config.condition,
                "Alert checker started with interval {:?}",
                check_interval
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = checker.tick().await;
                        tracing::debug!(
                            notified = report.notified.len(),
                            duplicates = report.duplicates.len(),
                            absent = report.absent.len(),
                            clean = report.is_clean(),
                            "Tick finished"
                        );
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Alert checker shutting down");
                        break;
                    }
                }
            }

            checker
        });

        CheckerHandle { shutdown_tx, task }
    }
}

/// Handle to a running checker
pub struct CheckerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<AlertChecker>,
}

impl CheckerHandle {
    /// Stop the background loop and hand the checker back
    pub async fn stop(self) -> Result<AlertChecker, tokio::task::JoinError> {
        let _ = self.shutdown_tx.send(()).await;
        self.task.await
    }

    /// Whether the background loop has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
