//! Settlement driver.
//!
//! Packages terminal channel states for on-chain delivery and tracks
//! the submission lifecycle. Checkpoints are advisory and batched; a
//! close hands a settlement job to an external submitter and follows it
//! through receipt callbacks. Competing higher-nonce states arriving
//! inside the dispute window are staged for explicit operator
//! resolution.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use photonx_common::{now, ChannelId, ChannelStatus, Deadline, PhotonXError, Result};
use photonx_protocol::SettlementRequest;
use photonx_store::{ChannelStore, CheckpointRecord, SettlementRecord, SubmissionStatus};

use crate::config::CoordinatorConfig;
use crate::metrics::SharedMetrics;
use crate::pipeline::MessagePipeline;

/// Receipt delivered by the external submitter.
#[derive(Debug, Clone)]
pub enum SubmissionReceipt {
    /// The submission confirmed on-chain.
    Confirmed,
    /// The submission failed.
    Failed { reason: String },
}

/// External on-chain submission boundary. Out of the coordinator's
/// scope; implementations wrap whatever transaction plumbing the
/// deployment uses.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Hand off a settlement job.
    async fn submit_settlement(&self, record: &SettlementRecord) -> Result<()>;

    /// Hand off a batch of checkpoint witnesses.
    async fn submit_checkpoint_batch(&self, batch: &[CheckpointRecord]) -> Result<()>;
}

/// Operator decision on a staged dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeResolution {
    /// Keep the originally submitted final state.
    UseOriginal,
    /// Adopt the staged higher-nonce state.
    UseStaged,
}

/// Drives checkpoints and settlements through their on-chain lifecycle.
pub struct SettlementDriver {
    store: Arc<dyn ChannelStore>,
    pipeline: Arc<MessagePipeline>,
    submitter: Arc<dyn Submitter>,
    metrics: SharedMetrics,
    config: CoordinatorConfig,
}

impl SettlementDriver {
    /// Wire up the driver.
    pub fn new(
        store: Arc<dyn ChannelStore>,
        pipeline: Arc<MessagePipeline>,
        submitter: Arc<dyn Submitter>,
        metrics: SharedMetrics,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            submitter,
            metrics,
            config,
        }
    }

    /// Hand a recorded settlement to the submitter, retrying handoff
    /// failures with backoff up to the configured cap.
    #[instrument(skip(self, record), fields(channel_id = %record.channel_id))]
    pub async fn dispatch(&self, mut record: SettlementRecord) -> Result<()> {
        loop {
            record.status = SubmissionStatus::Submitted;
            record.attempts += 1;
            record.updated_at = now();
            self.store.put_settlement(record.clone()).await?;
            self.metrics.settlement_submitted();

            info!(
                channel_id = %record.channel_id,
                nonce = record.final_state.nonce,
                attempt = record.attempts,
                "Settlement handed to submitter"
            );
            match self.submitter.submit_settlement(&record).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    self.metrics.settlement_failed();
                    record.status = SubmissionStatus::Failed;
                    record.updated_at = now();
                    self.store.put_settlement(record.clone()).await?;

                    if record.attempts >= self.config.settlement_retry.max_attempts {
                        return self.escalate(record.channel_id, &err.to_string()).await;
                    }
                    let delay = self.retry_delay_ms(record.attempts);
                    warn!(
                        channel_id = %record.channel_id,
                        attempt = record.attempts,
                        delay_ms = delay,
                        error = %err,
                        "Settlement handoff failed, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
            }
        }
    }

    /// Retries exhausted: freeze the channel and alert operators.
    async fn escalate(&self, channel_id: ChannelId, reason: &str) -> Result<()> {
        error!(
            channel_id = %channel_id,
            reason,
            "Settlement retries exhausted, marking channel disputed"
        );
        self.pipeline
            .transition(channel_id, self.deadline("dispute escalation"), |machine, channel| {
                machine.mark_disputed(channel)
            })
            .await?;
        self.metrics.channel_disputed();
        Ok(())
    }

    /// Process a submission receipt: confirm and close, or retry with
    /// backoff until the cap, then freeze the channel as disputed.
    #[instrument(skip(self), fields(channel_id = %channel_id))]
    pub async fn handle_receipt(
        &self,
        channel_id: ChannelId,
        receipt: SubmissionReceipt,
    ) -> Result<()> {
        let mut record = self
            .store
            .get_settlement(channel_id)
            .await?
            .ok_or(PhotonXError::NotFound { channel_id })?;

        match receipt {
            SubmissionReceipt::Confirmed => {
                record.status = SubmissionStatus::Confirmed;
                record.updated_at = now();
                self.store.put_settlement(record).await?;
                self.metrics.settlement_confirmed();

                self.pipeline
                    .transition(channel_id, self.deadline("settlement confirm"), |_, channel| {
                        let mut next = channel.clone();
                        next.transition_to(ChannelStatus::Closed)?;
                        Ok(next)
                    })
                    .await?;
                self.metrics.channel_closed();
                info!(channel_id = %channel_id, "Settlement confirmed, channel closed");
                Ok(())
            }
            SubmissionReceipt::Failed { reason } => {
                self.metrics.settlement_failed();
                record.status = SubmissionStatus::Failed;
                record.updated_at = now();
                self.store.put_settlement(record.clone()).await?;

                // A competing state is staged: retries are deferred until
                // the operator picks a state.
                if record.staged.is_some() {
                    warn!(
                        channel_id = %channel_id,
                        reason,
                        "Submission failed with a competing state staged; awaiting operator resolution"
                    );
                    return Ok(());
                }

                if record.attempts >= self.config.settlement_retry.max_attempts {
                    return self.escalate(channel_id, &reason).await;
                }

                let delay = self.retry_delay_ms(record.attempts);
                warn!(
                    channel_id = %channel_id,
                    attempt = record.attempts,
                    delay_ms = delay,
                    reason,
                    "Settlement submission failed, retrying"
                );
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                record.status = SubmissionStatus::Pending;
                self.dispatch(record).await
            }
        }
    }

    /// Stage a competing higher-nonce dual-signed state that arrived
    /// after a close was submitted but before confirmation.
    #[instrument(skip(self, request), fields(channel_id = %request.channel_id))]
    pub async fn stage_dispute(&self, request: SettlementRequest) -> Result<()> {
        let channel_id = request.channel_id;
        let mut record = self
            .store
            .get_settlement(channel_id)
            .await?
            .ok_or(PhotonXError::NotFound { channel_id })?;

        if matches!(record.status, SubmissionStatus::Confirmed) {
            return Err(PhotonXError::WrongStatus {
                channel_id,
                status: ChannelStatus::Closed,
            });
        }
        if request.final_state.nonce <= record.final_state.nonce {
            return Err(PhotonXError::StaleNonce {
                channel_id,
                nonce: request.final_state.nonce,
                current: record.final_state.nonce,
            });
        }

        let channel = self.pipeline.read(channel_id).await?;
        self.pipeline.machine().verify_attested_state(
            &channel,
            &request.final_state,
            &request.trader_signature,
            &request.lp_signature,
        )?;

        warn!(
            channel_id = %channel_id,
            submitted_nonce = record.final_state.nonce,
            staged_nonce = request.final_state.nonce,
            "Competing final state staged, awaiting operator resolution"
        );
        record.staged = Some(photonx_store::StagedState {
            state: request.final_state,
            trader_signature: request.trader_signature,
            lp_signature: request.lp_signature,
        });
        record.updated_at = now();
        self.store.put_settlement(record).await
    }

    /// Apply an operator's dispute resolution and resume submission with
    /// the chosen state.
    #[instrument(skip(self), fields(channel_id = %channel_id))]
    pub async fn resolve_dispute(
        &self,
        channel_id: ChannelId,
        resolution: DisputeResolution,
    ) -> Result<()> {
        let mut record = self
            .store
            .get_settlement(channel_id)
            .await?
            .ok_or(PhotonXError::NotFound { channel_id })?;

        let adopted = match resolution {
            DisputeResolution::UseStaged => {
                let staged = record.staged.take().ok_or_else(|| {
                    PhotonXError::InvariantViolation {
                        channel_id,
                        message: "no staged state to adopt".to_string(),
                    }
                })?;
                record.final_state = staged.state;
                record.trader_signature = staged.trader_signature;
                record.lp_signature = staged.lp_signature;
                Some((record.final_state.nonce, record.final_state.struct_hash()))
            }
            DisputeResolution::UseOriginal => {
                record.staged = None;
                None
            }
        };
        record.status = SubmissionStatus::Pending;
        record.attempts = 0;
        record.updated_at = now();
        self.store.put_settlement(record.clone()).await?;

        // The channel record mirrors the chosen state: a disputed channel
        // resumes settling, and an adopted higher-nonce state replaces the
        // superseded nonce and state hash.
        self.pipeline
            .transition(
                channel_id,
                self.deadline("dispute resolution"),
                move |_, channel| {
                    let mut next = channel.clone();
                    if next.status == ChannelStatus::Disputed {
                        next.transition_to(ChannelStatus::Settling)?;
                    }
                    if let Some((nonce, state_hash)) = adopted {
                        next.nonce = nonce;
                        next.last_state_hash = Some(state_hash);
                    }
                    Ok(next)
                },
            )
            .await?;
        self.dispatch(record).await
    }

    /// Flush pending checkpoints when the batch threshold is met by
    /// count or by age.
    pub async fn maybe_flush_checkpoints(&self) -> Result<usize> {
        let pending = self.store.unsubmitted_checkpoints().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let oldest_age_ms = (now() - pending[0].created_at).num_milliseconds().max(0) as u64;
        if pending.len() < self.config.checkpoint.batch_size
            && oldest_age_ms < self.config.checkpoint.batch_max_age_ms
        {
            return Ok(0);
        }

        let batch: Vec<CheckpointRecord> = pending
            .into_iter()
            .take(self.config.checkpoint.batch_size)
            .collect();
        self.submitter.submit_checkpoint_batch(&batch).await?;

        let keys: Vec<(ChannelId, u64)> = batch.iter().map(|c| (c.channel_id, c.nonce)).collect();
        self.store.mark_checkpoints_submitted(&keys).await?;
        self.metrics.checkpoint_batch_submitted();
        info!(count = keys.len(), "Checkpoint batch submitted");
        Ok(keys.len())
    }

    fn retry_delay_ms(&self, attempt: u32) -> u64 {
        let retry = &self.config.settlement_retry;
        retry
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(retry.max_delay_ms)
    }

    fn deadline(&self, operation: &str) -> Deadline {
        Deadline::after_millis(self.config.request_deadline_ms, operation)
    }
}
