//! sitewatch entry point: load configuration, wire the components, run the
//! monitor until mission-complete or interrupt.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitewatch::checker::{CheckConfig, CheckCoordinator};
use sitewatch::config::Config;
use sitewatch::fetch::PageFetcher;
use sitewatch::monitor::{Monitor, MonitorOutcome};
use sitewatch::notify::PushoverNotifier;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let default_filter = if std::env::var("DEBUG").is_ok_and(|v| v.eq_ignore_ascii_case("true")) {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        targets = config.targets.len(),
        terms = config.terms.len(),
        interval_secs = config.check_interval.as_secs(),
        auto_stop = config.auto_stop_on_found,
        combinations = config.targets.len() * config.terms.len(),
        "configuration loaded"
    );
    for target in &config.targets {
        tracing::info!(url = %target, "monitoring");
    }
    for term in &config.terms {
        tracing::info!(term = %term, "searching for");
    }

    let fetcher = Arc::new(
        PageFetcher::new(config.fetch_config()).context("Failed to build HTTP client")?,
    );
    let notifier = Arc::new(
        PushoverNotifier::new(config.notify_config())
            .context("Failed to build notification client")?,
    );

    let coordinator = CheckCoordinator::new(
        CheckConfig::default(),
        fetcher,
        notifier.clone(),
        config.targets.clone(),
        config.terms.clone(),
    );
    let monitor = Monitor::new(
        coordinator,
        notifier,
        config.check_interval,
        config.auto_stop_on_found,
    );

    match monitor.run().await? {
        MonitorOutcome::Completed => {
            tracing::info!("monitor finished: all combinations found");
        }
        MonitorOutcome::Interrupted => {
            tracing::info!("monitor finished: stopped by user");
        }
    }

    Ok(())
}
