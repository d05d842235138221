use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use swing_watch::alert::WakerClient;
use swing_watch::config::{Config, LoggingConfig};
use swing_watch::feed::FeedWsClient;
use swing_watch::processor::{ProcessorSettings, TickProcessor};

const TICK_INBOX_CAPACITY: usize = 256;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Create config/default.toml or point SWING_WATCH_CONFIG at a config file");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);

    let waker_url = config.alert.waker_url()?;
    tracing::info!(
        ws_url = %config.feed.ws_url,
        waker_url = %waker_url,
        minute_range = config.window.minute_range,
        ratio = config.window.ratio,
        "Starting swing-watch"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let waker = WakerClient::new(waker_url, config.alert.timeout())
        .context("failed to build waker HTTP client")?;
    let processor = TickProcessor::new(ProcessorSettings::from_config(&config), waker);
    let (handle, processor_task) = processor.spawn(TICK_INBOX_CAPACITY, shutdown_rx.clone());

    let feed = FeedWsClient::new(&config.feed.ws_url);
    let feed_shutdown = shutdown_rx.clone();
    let feed_task = tokio::spawn(async move {
        if let Err(e) = feed.connect_and_run(handle, feed_shutdown).await {
            tracing::warn!(error = %e, "Feed worker failed");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    tracing::info!("Ctrl+C received");
    let _ = shutdown_tx.send(true);

    if let Err(e) = feed_task.await {
        tracing::warn!(error = %e, "Feed task panicked");
    }
    if let Err(e) = processor_task.await {
        tracing::warn!(error = %e, "Processor task panicked");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
