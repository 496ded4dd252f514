use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use backoff::{future::retry, ExponentialBackoff};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use ethbus::blockchain::{BlockProcessor, Dispatcher, JsonRpcLedger, LedgerClient};
use ethbus::database::{IndexStore, RedisStore};
use ethbus::metrics::metrics;
use ethbus::Config;

// Waits for both the store and the ledger to answer before starting work
async fn wait_ready(store: &RedisStore, ledger: &JsonRpcLedger) -> ethbus::Result<()> {
    let backoff = ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(300)),
        ..Default::default()
    };
    retry(backoff, || async {
        store.ping().await.map_err(|e| {
            warn!("Index store not ready: {}", e);
            backoff::Error::transient(e)
        })?;
        let version = ledger.client_version().await.map_err(|e| {
            warn!("Ledger RPC not ready: {}", e);
            backoff::Error::transient(e)
        })?;
        info!("Ledger node {}", version);
        Ok::<(), backoff::Error<ethbus::IndexerError>>(())
    })
    .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;

    let store = RedisStore::connect(&config.redis_url, config.store_timeout).await?;
    let ledger = JsonRpcLedger::new(&config.rpc_url, config.rpc_timeout)?;
    wait_ready(&store, &ledger).await?;

    // Metrics server
    let metrics_server = HttpServer::new(|| App::new().route("/metrics", web::get().to(metrics)))
        .bind(&config.metrics_addr)?
        .run();
    let metrics_handle = metrics_server.handle();
    tokio::spawn(metrics_server);
    info!("Serving metrics at {}/metrics", config.metrics_addr);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested, finishing in-flight blocks");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let processor = BlockProcessor::new(Arc::new(ledger), Arc::new(store));
    Dispatcher::new(processor, &config).run(cancel).await;

    metrics_handle.stop(true).await;
    Ok(())
}
