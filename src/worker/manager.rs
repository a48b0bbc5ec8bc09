//! Pipeline supervision.
//!
//! Spawns one task per configured contract and owns their lifecycles:
//! startup validation, a periodic health summary, and graceful shutdown
//! fan-out when the process-level cancellation token fires.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    chain::ChainClient,
    config::Settings,
    db::{CheckpointStore, EventStore},
    worker::{health::HealthRegistry, pipeline::ContractPipeline},
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

struct RunningPipeline {
    name: String,
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

pub struct ContractManager {
    settings: Arc<Settings>,
    chain: Arc<dyn ChainClient>,
    events: Arc<dyn EventStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    health: HealthRegistry,
    running: Vec<RunningPipeline>,
}

impl ContractManager {
    pub fn new(
        settings: Arc<Settings>,
        chain: Arc<dyn ChainClient>,
        events: Arc<dyn EventStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        health: HealthRegistry,
    ) -> Self {
        Self {
            settings,
            chain,
            events,
            checkpoints,
            health,
            running: Vec::new(),
        }
    }

    fn start_all(&mut self) -> Result<()> {
        if self.settings.contracts.is_empty() {
            bail!("No contracts configured, nothing to index");
        }

        let mut names = HashSet::new();
        for contract in &self.settings.contracts {
            if !names.insert(contract.name.as_str()) {
                bail!("Duplicate contract name in config: {}", contract.name);
            }
        }

        for contract in &self.settings.contracts {
            let pipeline = ContractPipeline::new(
                contract,
                &self.settings.indexer,
                self.chain.clone(),
                self.events.clone(),
                self.checkpoints.clone(),
                self.health.clone(),
            )?;

            let cancel_token = CancellationToken::new();
            let pipeline_token = cancel_token.clone();
            let name = contract.name.clone();
            let task_name = name.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = pipeline.run(pipeline_token).await {
                    error!("Pipeline {task_name} failed: {e:#}");
                }
            });

            info!(
                "Started pipeline {} ({:?} at {}, from block {})",
                name, contract.kind, contract.address, contract.start_block
            );

            self.running.push(RunningPipeline {
                name,
                handle,
                cancel_token,
            });
        }

        Ok(())
    }

    async fn stop_all(&mut self) {
        info!("Stopping {} pipeline(s)...", self.running.len());

        for running in &self.running {
            running.cancel_token.cancel();
        }

        for running in self.running.drain(..) {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, running.handle).await {
                Ok(_) => info!("Pipeline {} stopped gracefully", running.name),
                Err(_) => warn!(
                    "Pipeline {} did not stop within {SHUTDOWN_TIMEOUT:?}, continuing...",
                    running.name
                ),
            }
        }
    }

    fn log_health(&self) {
        for (name, status) in self.health.snapshot() {
            info!(
                "  - {name}: {:?} at block {}",
                status.phase, status.last_processed_block
            );
        }
    }

    /// Start every configured pipeline and supervise until cancelled.
    pub async fn run(mut self, cancellation_token: CancellationToken) -> Result<()> {
        self.start_all()?;
        info!("ContractManager: {} pipeline(s) running", self.running.len());

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("ContractManager: received cancellation signal");
                    break;
                }
                _ = tokio::time::sleep(HEALTH_LOG_INTERVAL) => {
                    self.log_health();
                }
            }
        }

        self.stop_all().await;
        info!("ContractManager: shutdown complete");
        Ok(())
    }
}
