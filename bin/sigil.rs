use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use sigil::{
    chain::RetryPolicy, worker::HealthRegistry, ContractManager, Database, RpcChainClient,
    Settings,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    let cancellation_token = CancellationToken::new();

    let db = Database::new(settings.clone())
        .await
        .context("Failed to initialize database connection")?;

    let retry = RetryPolicy {
        max_attempts: settings.indexer.retry_max_attempts,
        base_delay: Duration::from_millis(settings.indexer.retry_base_delay_ms),
        max_delay: Duration::from_millis(settings.indexer.retry_max_delay_ms),
    };
    let chain = Arc::new(
        RpcChainClient::new(
            &settings.indexer.rpc_url,
            retry,
            Duration::from_secs(settings.indexer.rpc_timeout_secs),
        )
        .context("Failed to create RPC chain client")?,
    );

    let manager = ContractManager::new(
        settings,
        chain,
        db.postgres.clone(),
        db.postgres.clone(),
        HealthRegistry::new(),
    );

    let manager_token = cancellation_token.child_token();
    let manager_handle = tokio::spawn(async move {
        if let Err(e) = manager.run(manager_token).await {
            error!("Contract manager failed: {:#}", e);
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

    info!("Finishing all tasks...");
    cancellation_token.cancel();

    let _ = manager_handle.await;

    if let Err(e) = db.postgres.health_check().await {
        error!("PostgreSQL connection unhealthy at shutdown: {:#}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
