mod config;
mod error;
mod handlers;
mod router;
mod state;
mod validation;

use anyhow::Context;
use config::GatewayConfig;
use market_data::analytics::AnalyticsFacade;
use market_data::feed::HttpPriceFeed;
use market_data::ingestion::IngestionJob;
use market_data::scheduler::IngestionScheduler;
use market_data::store::{InfluxStore, MemoryStore, TimeSeriesStore};
use router::create_router;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(version = market_data::SERVICE_VERSION, "Starting crypto price gateway");

    let cfg = GatewayConfig::from_env();

    let store: Arc<dyn TimeSeriesStore> = match &cfg.influx {
        Some(influx) => {
            tracing::info!(url = %influx.url, bucket = %influx.bucket, "Using InfluxDB store");
            Arc::new(InfluxStore::new(influx.clone()).context("building InfluxDB client")?)
        }
        None => {
            tracing::warn!("INFLUXDB_ADDRESS not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // Shutdown fan-out for the server and the scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = if cfg.ingest_enabled {
        let feed = HttpPriceFeed::new(cfg.feed_base_url.clone(), cfg.request_timeout)
            .context("building price feed client")?;
        let job = Arc::new(IngestionJob::new(Arc::new(feed), Arc::clone(&store)));
        let mut rx = shutdown_rx.clone();
        Some(
            IngestionScheduler::new(job, cfg.ingest_interval).spawn(async move {
                let _ = rx.wait_for(|stop| *stop).await;
            }),
        )
    } else {
        tracing::info!("Ingestion disabled");
        None
    };

    let analytics = Arc::new(AnalyticsFacade::new(store, cfg.stddev_mode));
    let app = create_router(AppState::new(analytics, cfg.request_timeout));

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.bind, cfg.port)
        .parse()
        .context("invalid bind address")?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut rx = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = rx.wait_for(|stop| *stop).await;
        })
        .await?;

    if let Some(handle) = scheduler {
        handle.await.context("ingestion scheduler panicked")?;
    }

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully stopping");
}
