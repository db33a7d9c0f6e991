//! PhotonX Coordinator Binary
//!
//! Runs a single coordinator node over the in-memory store; a deployment
//! with a durable backend constructs `Coordinator::new` with its own
//! store, lock, and submitter implementations.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photonx_common::Result;
use photonx_coordinator::{Coordinator, CoordinatorConfig, Submitter};
use photonx_store::{CheckpointRecord, SettlementRecord};

/// Submitter that logs jobs instead of sending transactions. Stands in
/// until the deployment wires a real transaction sender.
struct LoggingSubmitter;

#[async_trait]
impl Submitter for LoggingSubmitter {
    async fn submit_settlement(&self, record: &SettlementRecord) -> Result<()> {
        warn!(
            channel_id = %record.channel_id,
            nonce = record.final_state.nonce,
            "No on-chain submitter configured; settlement logged only"
        );
        Ok(())
    }

    async fn submit_checkpoint_batch(&self, batch: &[CheckpointRecord]) -> Result<()> {
        warn!(
            count = batch.len(),
            "No on-chain submitter configured; checkpoint batch logged only"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting PhotonX coordinator");

    let config = CoordinatorConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("configuration error: {}", e));
    }

    let coordinator = Arc::new(Coordinator::in_memory(config, Arc::new(LoggingSubmitter))?);
    coordinator.start().await?;

    info!(
        domain = ?coordinator.domain(),
        "Coordinator running; press ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    coordinator.stop().await?;

    info!("Coordinator shutdown complete");
    Ok(())
}
