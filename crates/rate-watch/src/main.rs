//! Rate Watch - live jewellery metal rates
//!
//! Runs the rate feed and logs every published table until shutdown

use std::env;

use chrono::Local;
use futures::StreamExt;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use jewar_core::{FeedConfig, Metal, RateTable};
use jewar_rate_feed::{format_timestamp, RateFeedService};

/// Tables buffered for the log writer before deliveries start failing
const UPDATE_BUFFER: usize = 16;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    init_logging();

    info!("Starting Jewar rate watch v{}", env!("CARGO_PKG_VERSION"));

    let config = FeedConfig::from_env()?;
    info!(
        "Updating every {:?} (live rates {}, cooldown {:?})",
        config.update_interval(),
        if config.enable_live_rates { "enabled" } else { "disabled" },
        config.api_cooldown()
    );

    let service = RateFeedService::new(config)?;

    let market = service.market_status();
    info!(
        "Market {:?}, next open {}, volatility x{}, sentiment {}",
        market.status,
        market.next_open,
        market.volatility,
        market.sentiment.name()
    );

    if service.config().enable_live_rates {
        let health = service.check_api_health().await;
        if health.is_healthy() {
            info!("{}", health.message);
        } else {
            warn!("Spot API unhealthy: {}", health.message);
        }
    }

    let (subscription, mut updates) = service.subscribe_channel(UPDATE_BUFFER)?;
    info!("Press Ctrl+C to shutdown");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            update = updates.next() => match update {
                Some(rates) => log_rates(&rates),
                None => {
                    warn!("Rate stream closed");
                    break;
                }
            }
        }
    }

    subscription.unsubscribe();

    let stats = service.stats();
    info!(
        "Shutdown complete: {} tables published, {} failed deliveries",
        stats.publish_count, stats.failed_deliveries
    );
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if env::var("RATE_WATCH_LOG_JSON").is_ok_and(|v| v == "1" || v == "true") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn log_rates(rates: &RateTable) {
    let updated = format_timestamp(&rates.last_updated.with_timezone(&Local));

    for metal in Metal::ALL {
        let line = rates
            .metal(metal)
            .iter()
            .map(|(purity, price)| format!("{} {}", purity.label(), price))
            .collect::<Vec<_>>()
            .join(", ");
        info!(source = ?rates.source, updated = %updated, "{} per 10g: {}", metal.name(), line);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}
