use std::{sync::Arc, time::Duration};

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use lendex::{
    worker::{indexer_status, ContractClass},
    ContractRegistry, EventStore, IndexerWorker, RpcChainClient, Settings,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    // Load configuration
    let settings =
        Settings::new().context("Failed to load configuration. Check config.yaml and LENDEX__* env vars")?;

    let store = Arc::new(
        EventStore::open(&settings.storage.path)
            .with_context(|| format!("Failed to open event store at {}", settings.storage.path))?,
    );

    let mut registry = ContractRegistry::new();
    if let Some(comptroller) = &settings.contracts.comptroller {
        registry
            .register_str(comptroller, ContractClass::Comptroller)
            .context("Invalid comptroller address")?;
    }
    for market in &settings.contracts.markets {
        registry
            .register_str(market, ContractClass::Market)
            .with_context(|| format!("Invalid market address {market}"))?;
    }
    for mining in &settings.contracts.liquidity_mining {
        registry
            .register_str(mining, ContractClass::LiquidityMining)
            .with_context(|| format!("Invalid liquidity mining address {mining}"))?;
    }
    if registry.is_empty() {
        anyhow::bail!("No contract addresses configured; nothing to index");
    }

    let request_timeout = Duration::from_secs(settings.indexer.request_timeout_seconds);
    let client = RpcChainClient::connect(&settings.indexer.rpc_url, request_timeout)
        .context("Failed to build chain client")?;

    let status = indexer_status(&client, &store)
        .await
        .context("Failed to query chain status; is the node reachable?")?;
    info!(
        "connected to chain {}: latest block {}, indexed to {:?}",
        status.chain_id, status.latest_block, status.indexed_to_block
    );

    let worker = IndexerWorker::new(
        client,
        store.clone(),
        registry,
        Duration::from_secs(settings.indexer.poll_interval_seconds),
        settings.indexer.batch_size,
        settings.indexer.initial_lookback,
    );

    let cancellation_token = CancellationToken::new();
    let worker_token = cancellation_token.child_token();
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker.run(worker_token).await {
            error!("Indexer worker failed: {:#}", e);
        }
    });

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Indexer running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    cancellation_token.cancel();

    info!("Waiting for indexer worker to stop...");
    let _ = worker_handle.await;

    store.flush().context("Failed to flush event store")?;
    info!("Event store flushed, shutdown complete");
    Ok(())
}
