//! Alertwatch
//!
//! Run with: cargo run
//!
//! See `alertwatch::config` for the environment variables. RUST_LOG sets the
//! log level (default: alertwatch=info).

use std::sync::Arc;

use alertwatch::alerts::{AlertChecker, CheckerConfig};
use alertwatch::config::WatcherConfig;
use alertwatch::notify::{LogNotifier, Notifier, WebhookNotifier};
use alertwatch::source::InfluxClient;
use alertwatch::state::JsonFileStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alertwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WatcherConfig::from_env()?;

    tracing::info!("Alertwatch configuration:");
    tracing::info!("  InfluxDB: {} (org {})", config.influx.url, config.influx.org);
    tracing::info!(
        "  Watching: {}.{{{}}} in bucket {}",
        config.influx.measurement,
        config.signals.join(","),
        config.influx.bucket
    );
    tracing::info!("  Condition: value {}", config.condition);
    tracing::info!("  Window: {:?}, interval: {:?}", config.window, config.interval);
    tracing::info!("  State file: {}", config.state_file.display());

    let source = InfluxClient::new(config.influx.clone(), config.query_timeout)?;

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => {
            tracing::info!("  Notifications: webhook");
            Arc::new(WebhookNotifier::new(
                url.clone(),
                config.influx.measurement.clone(),
                config.notify_timeout,
            )?)
        }
        None => {
            tracing::warn!("  Notifications: DISCORD_WEBHOOK not set, alerts are only logged");
            Arc::new(LogNotifier::new(config.influx.measurement.clone()))
        }
    };

    let store = JsonFileStore::new(&config.state_file);

    let checker = AlertChecker::new(
        CheckerConfig::from(&config),
        Arc::new(source),
        notifier,
        Arc::new(store),
    );

    let handle = checker.start(config.interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    handle.stop().await?;

    Ok(())
}
