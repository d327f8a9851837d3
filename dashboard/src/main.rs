mod aggregate;
mod alerts;
mod batching;
mod config;
mod db;
mod errors;
mod filter;
mod memory;
mod metrics;
mod model;
mod mqtt;
mod params;
mod range;
mod rank;
mod report;
mod rest;
mod store;
mod suggest;
mod validate;

use anyhow::Context;
use axum::{routing::get, Router};
use config::{Config, StoreBackend};
use memory::MemoryStore;
use std::sync::Arc;
use store::ReadingStore;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    info!("Starting power dashboard");
    info!(
        http_addr = %config.http_addr,
        timezone = config.report.timezone.name(),
        backend = ?config.store_backend,
        "Configuration loaded"
    );

    metrics::init_metrics();

    let store: Arc<dyn ReadingStore> = match config.store_backend {
        StoreBackend::Postgres => {
            info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));
            let pool = db::make_pool(&config.database_url)
                .await
                .context("failed to connect to database")?;
            Arc::new(db::PgStore::new(pool))
        }
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            for seed in &config.seed_devices {
                store.add_device(&seed.name, seed.room.as_deref()).await;
            }
            info!(devices = config.seed_devices.len(), "Using in-memory store");
            Arc::new(store)
        }
    };

    let mut background = tokio::task::JoinSet::new();

    if config.mqtt_enabled {
        info!("MQTT broker: {}:{}", config.mqtt_broker, config.mqtt_port);
        info!("Channel capacity: {}", config.channel_capacity);
        let (tx, rx) = mpsc::channel(config.channel_capacity);

        let client_id = format!("dashboard-{}", uuid::Uuid::new_v4());
        let (broker, port) = (config.mqtt_broker.clone(), config.mqtt_port);
        background.spawn(async move {
            if let Err(e) = mqtt::run_mqtt(broker, port, client_id, tx).await {
                error!("MQTT task failed: {}", e);
            }
            "MQTT task"
        });

        let batcher_store = store.clone();
        let (batch_size, batch_timeout_ms) = (config.batch_size, config.batch_timeout_ms);
        background.spawn(async move {
            batching::run_batcher(rx, batcher_store, batch_size, batch_timeout_ms).await;
            "Batcher task"
        });
    }

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(rest::AppState {
            store,
            config: config.report,
        }));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    background.spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
        "HTTP server"
    });

    tokio::select! {
        Some(finished) = background.join_next() => {
            match finished {
                Ok(task) => error!("{} terminated", task),
                Err(e) => error!("Background task panicked: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
