//! Coordinator facade.
//!
//! Owns the components, exposes the transport-agnostic operator surface,
//! and runs the background maintenance tasks. One coordinator instance
//! serves many channels; per-channel work is serialized by the pipeline.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{error, info, instrument};

use photonx_common::{
    now, Address, Channel, ChannelId, Deadline, PhotonXError, Result,
};
use photonx_crypto::DomainSeparator;
use photonx_protocol::{CheckpointRequest, Message, SettlementRequest};
use photonx_store::{ChannelStore, LockClient, MemoryLockClient, MemoryStore};

use crate::broadcast::{Broadcaster, ChannelEvent};
use crate::cache::ChannelCache;
use crate::config::CoordinatorConfig;
use crate::machine::{ChannelStateMachine, OpenChannelParams};
use crate::metrics::{Metrics, SharedMetrics};
use crate::pipeline::MessagePipeline;
use crate::settlement::{DisputeResolution, SettlementDriver, SubmissionReceipt, Submitter};
use crate::sweeper::TimeoutSweeper;

/// Coordinator run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Starting up, not yet accepting requests.
    Starting,
    /// Accepting requests.
    Running,
    /// Draining, no new requests accepted.
    ShuttingDown,
    /// Stopped.
    Stopped,
}

/// The coordinator: routes and orders channel traffic, enforces the
/// state machine, and drives settlement.
pub struct Coordinator {
    config: CoordinatorConfig,
    node_id: String,
    run_state: Arc<RwLock<RunState>>,
    machine: Arc<ChannelStateMachine>,
    store: Arc<dyn ChannelStore>,
    pipeline: Arc<MessagePipeline>,
    driver: Arc<SettlementDriver>,
    broadcaster: Arc<Broadcaster>,
    cache: Arc<ChannelCache>,
    sweeper: Arc<TimeoutSweeper>,
    metrics: SharedMetrics,
}

impl Coordinator {
    /// Build a coordinator over explicit store and lock backends.
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn ChannelStore>,
        locks: Arc<dyn LockClient>,
        submitter: Arc<dyn Submitter>,
    ) -> Result<Self> {
        config.validate()?;
        let node_id = config
            .node_id
            .clone()
            .unwrap_or_else(|| format!("photonx-{}", uuid::Uuid::new_v4()));

        let domain = DomainSeparator::photonx(config.chain_id, config.verifying_contract);
        let machine = Arc::new(ChannelStateMachine::new(
            domain,
            config.message_skew_window_ms,
            config.channel_timeout_floor_ms,
        ));
        let metrics: SharedMetrics = Arc::new(Metrics::new());
        let broadcaster = Arc::new(Broadcaster::new(
            config.subscriber_queue_depth,
            metrics.clone(),
        ));
        let cache = Arc::new(ChannelCache::new(config.cache_idle_eviction_ms));
        let pipeline = Arc::new(MessagePipeline::new(
            store.clone(),
            locks,
            machine.clone(),
            broadcaster.clone(),
            cache.clone(),
            metrics.clone(),
            config.clone(),
        ));
        let driver = Arc::new(SettlementDriver::new(
            store.clone(),
            pipeline.clone(),
            submitter,
            metrics.clone(),
            config.clone(),
        ));
        let sweeper = Arc::new(TimeoutSweeper::new(
            store.clone(),
            pipeline.clone(),
            cache.clone(),
            metrics.clone(),
            config.clone(),
        ));

        Ok(Self {
            config,
            node_id,
            run_state: Arc::new(RwLock::new(RunState::Starting)),
            machine,
            store,
            pipeline,
            driver,
            broadcaster,
            cache,
            sweeper,
            metrics,
        })
    }

    /// Build a single-node coordinator backed by the in-memory store and
    /// lock table.
    pub fn in_memory(config: CoordinatorConfig, submitter: Arc<dyn Submitter>) -> Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryLockClient::new()),
            submitter,
        )
    }

    /// Start background maintenance and begin accepting requests.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn start(&self) -> Result<()> {
        info!(node_id = %self.node_id, "Starting coordinator");

        let sweeper = self.sweeper.clone();
        tokio::spawn(async move {
            sweeper.run_loop().await;
        });

        let driver = self.driver.clone();
        let flush_interval =
            std::time::Duration::from_millis(self.config.checkpoint.batch_max_age_ms.max(1_000));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(flush_interval).await;
                if let Err(err) = driver.maybe_flush_checkpoints().await {
                    error!(error = %err, "Checkpoint flush failed");
                }
            }
        });

        *self.run_state.write() = RunState::Running;
        info!(node_id = %self.node_id, "Coordinator running");
        Ok(())
    }

    /// Stop accepting requests and settle down.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn stop(&self) -> Result<()> {
        *self.run_state.write() = RunState::ShuttingDown;
        // In-flight transitions complete under their locks; nothing else
        // to drain beyond that.
        *self.run_state.write() = RunState::Stopped;
        info!(node_id = %self.node_id, "Coordinator stopped");
        Ok(())
    }

    /// Whether requests are currently accepted.
    pub fn is_accepting_requests(&self) -> bool {
        *self.run_state.read() == RunState::Running
    }

    /// Current run state.
    pub fn run_state(&self) -> RunState {
        *self.run_state.read()
    }

    /// The signing domain channels are bound to.
    pub fn domain(&self) -> &DomainSeparator {
        self.machine.domain()
    }

    /// Metrics handle.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn guard_running(&self) -> Result<()> {
        if self.is_accepting_requests() {
            Ok(())
        } else {
            Err(PhotonXError::Unavailable)
        }
    }

    fn deadline(&self, operation: &str) -> Deadline {
        Deadline::after_millis(self.config.request_deadline_ms, operation)
    }

    // --- Operator surface ---

    /// Open a channel and persist its initial state.
    #[instrument(skip(self, params))]
    pub async fn open_channel(&self, params: OpenChannelParams) -> Result<Channel> {
        self.guard_running()?;
        let channel = self.machine.open(params, now())?;
        self.store.put(channel.clone()).await?;
        self.cache.store(&channel);
        self.metrics.channel_opened();
        info!(
            channel_id = %channel.channel_id,
            trader = %channel.trader,
            lp = %channel.lp,
            "Channel opened"
        );
        Ok(channel)
    }

    /// Submit an inbound RFQ message.
    pub async fn submit_message(&self, msg: Message) -> Result<Channel> {
        self.guard_running()?;
        self.pipeline
            .process_message(msg, self.deadline("message"))
            .await
    }

    /// Submit a dual-signed checkpoint.
    pub async fn submit_checkpoint(&self, request: CheckpointRequest) -> Result<Channel> {
        self.guard_running()?;
        let (channel, _record) = self
            .pipeline
            .process_checkpoint(request, self.deadline("checkpoint"))
            .await?;
        // Batch thresholds may already be met.
        self.driver.maybe_flush_checkpoints().await?;
        Ok(channel)
    }

    /// Submit a dual-signed final state. While a close is already in
    /// flight, a higher-nonce state is staged for the dispute window
    /// instead.
    pub async fn submit_close(&self, request: SettlementRequest) -> Result<Channel> {
        self.guard_running()?;
        let current = self.pipeline.read(request.channel_id).await?;
        if matches!(
            current.status,
            photonx_common::ChannelStatus::Settling | photonx_common::ChannelStatus::Disputed
        ) {
            self.driver.stage_dispute(request.clone()).await?;
            return self.pipeline.read(request.channel_id).await;
        }

        let (channel, record) = self
            .pipeline
            .process_close(request, self.deadline("close"))
            .await?;
        self.driver.dispatch(record).await?;
        Ok(channel)
    }

    /// Current state of a channel.
    pub async fn channel_state(&self, channel_id: ChannelId) -> Result<Channel> {
        self.pipeline.read(channel_id).await
    }

    /// Channels a participant is party to.
    pub async fn channels_for_participant(&self, participant: Address) -> Result<Vec<ChannelId>> {
        self.store.channels_for_participant(participant).await
    }

    /// Subscribe to committed transitions for a participant.
    pub fn subscribe(&self, participant: Address) -> mpsc::Receiver<ChannelEvent> {
        self.broadcaster.subscribe(participant)
    }

    /// Receipt callback from the external submitter.
    pub async fn settlement_receipt(
        &self,
        channel_id: ChannelId,
        receipt: SubmissionReceipt,
    ) -> Result<()> {
        self.driver.handle_receipt(channel_id, receipt).await
    }

    /// Operator resolution of a staged dispute.
    pub async fn resolve_dispute(
        &self,
        channel_id: ChannelId,
        resolution: DisputeResolution,
    ) -> Result<()> {
        self.driver.resolve_dispute(channel_id, resolution).await
    }

    /// One sweep pass, for deployments that drive maintenance
    /// externally.
    pub async fn sweep_once(&self) -> Result<()> {
        self.sweeper.sweep_once().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use photonx_common::{
        now_millis, ChannelStatus, QuoteId, Side, Signature, U256,
    };
    use photonx_crypto::Signer;
    use photonx_protocol::{ChannelState, Fill, Quote, QuoteRequest};
    use photonx_store::{CheckpointRecord, SettlementRecord, SubmissionStatus};
    use std::sync::atomic::{AtomicBool, Ordering};

    const USDC: Address = Address([0x01; 20]);
    const WETH: Address = Address([0x02; 20]);

    /// Submitter double that records jobs and can be told to fail.
    #[derive(Default)]
    struct RecordingSubmitter {
        settlements: Mutex<Vec<SettlementRecord>>,
        checkpoint_batches: Mutex<Vec<usize>>,
        fail_settlements: AtomicBool,
    }

    #[async_trait]
    impl Submitter for RecordingSubmitter {
        async fn submit_settlement(&self, record: &SettlementRecord) -> Result<()> {
            if self.fail_settlements.load(Ordering::SeqCst) {
                return Err(PhotonXError::Store("rpc unreachable".to_string()));
            }
            self.settlements.lock().push(record.clone());
            Ok(())
        }

        async fn submit_checkpoint_batch(&self, batch: &[CheckpointRecord]) -> Result<()> {
            self.checkpoint_batches.lock().push(batch.len());
            Ok(())
        }
    }

    struct Setup {
        coordinator: Coordinator,
        submitter: Arc<RecordingSubmitter>,
        trader: Signer,
        lp: Signer,
    }

    async fn setup_with(config: CoordinatorConfig) -> Setup {
        let submitter = Arc::new(RecordingSubmitter::default());
        let coordinator = Coordinator::in_memory(config, submitter.clone()).unwrap();
        *coordinator.run_state.write() = RunState::Running;
        Setup {
            coordinator,
            submitter,
            trader: Signer::from_bytes(&[0x11; 32]).unwrap(),
            lp: Signer::from_bytes(&[0x22; 32]).unwrap(),
        }
    }

    async fn setup() -> Setup {
        setup_with(CoordinatorConfig {
            verifying_contract: Address([0x42; 20]),
            settlement_retry: crate::config::RetryConfig {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 2,
            },
            ..CoordinatorConfig::default()
        })
        .await
    }

    impl Setup {
        async fn open(&self) -> Channel {
            self.coordinator
                .open_channel(OpenChannelParams {
                    trader: self.trader.address(),
                    lp: self.lp.address(),
                    tokens: vec![USDC, WETH],
                    trader_deposits: vec![U256::exp10(6) * U256::from(1_000u64), U256::zero()],
                    lp_deposits: vec![U256::zero(), U256::exp10(18)],
                    timeout_ms: 3_600_000,
                })
                .await
                .unwrap()
        }

        fn domain(&self) -> &DomainSeparator {
            self.coordinator.domain()
        }

        async fn trade(&self, channel: &Channel) -> Channel {
            let ts = now_millis();
            let quote_id = QuoteId::new();

            let mut req = QuoteRequest {
                channel_id: channel.channel_id,
                nonce: 1,
                side: Side::Buy,
                base_token: WETH,
                quote_token: USDC,
                quantity: U256::exp10(17) * U256::from(5u64),
                max_slippage_bps: 50,
                timestamp: ts,
                trader: self.trader.address(),
                signature: Signature::default(),
            };
            req.signature = self
                .trader
                .sign_digest(Message::QuoteRequest(req.clone()).signing_digest(self.domain()))
                .unwrap();
            self.coordinator
                .submit_message(Message::QuoteRequest(req))
                .await
                .unwrap();

            let mut quote = Quote {
                channel_id: channel.channel_id,
                quote_id,
                request_nonce: 1,
                price: U256::exp10(6) * U256::from(2_000u64),
                quantity: U256::exp10(17) * U256::from(5u64),
                side: Side::Buy,
                expiry_timestamp: ts + 30_000,
                lp_fee_bps: 30,
                timestamp: ts + 1,
                lp: self.lp.address(),
                signature: Signature::default(),
            };
            quote.signature = self
                .lp
                .sign_digest(Message::Quote(quote.clone()).signing_digest(self.domain()))
                .unwrap();
            self.coordinator
                .submit_message(Message::Quote(quote))
                .await
                .unwrap();

            let mut fill = Fill {
                channel_id: channel.channel_id,
                quote_id,
                fill_id: photonx_common::FillId::new(),
                nonce: 2,
                quantity: U256::exp10(17) * U256::from(5u64),
                price: U256::exp10(6) * U256::from(2_000u64),
                timestamp: ts + 2,
                trader: self.trader.address(),
                lp: self.lp.address(),
                trader_signature: Signature::default(),
                lp_signature: Signature::default(),
            };
            let digest = Message::Fill(fill.clone()).signing_digest(self.domain());
            fill.trader_signature = self.trader.sign_digest(digest).unwrap();
            fill.lp_signature = self.lp.sign_digest(digest).unwrap();
            self.coordinator
                .submit_message(Message::Fill(fill))
                .await
                .unwrap()
        }

        fn dual_signed(&self, channel: &Channel, nonce: u64, ts: u64) -> (ChannelState, Signature, Signature) {
            let mut state = ChannelState::from_channel(channel, ts);
            state.nonce = nonce;
            let digest = state.signing_digest(self.domain());
            (
                state,
                self.trader.sign_digest(digest).unwrap(),
                self.lp.sign_digest(digest).unwrap(),
            )
        }
    }

    #[tokio::test]
    async fn test_open_trade_close_lifecycle() {
        let s = setup().await;
        let channel = s.open().await;
        let traded = s.trade(&channel).await;

        // Post-fill balances per the seed scenario.
        assert_eq!(traded.nonce, 2);
        assert_eq!(
            traded.trader_balances,
            vec![U256::zero(), U256::exp10(17) * U256::from(5u64)]
        );
        assert_eq!(
            traded.lp_balances,
            vec![
                U256::exp10(6) * U256::from(1_000u64),
                U256::exp10(17) * U256::from(5u64)
            ]
        );

        // Close at nonce 3.
        let (state, trader_sig, lp_sig) = s.dual_signed(&traded, 3, now_millis());
        let settling = s
            .coordinator
            .submit_close(SettlementRequest {
                channel_id: channel.channel_id,
                final_state: state,
                trader_signature: trader_sig,
                lp_signature: lp_sig,
            })
            .await
            .unwrap();
        assert_eq!(settling.status, ChannelStatus::Settling);
        assert_eq!(s.submitter.settlements.lock().len(), 1);

        // Receipt confirms; channel closes.
        s.coordinator
            .settlement_receipt(channel.channel_id, SubmissionReceipt::Confirmed)
            .await
            .unwrap();
        let closed = s.coordinator.channel_state(channel.channel_id).await.unwrap();
        assert_eq!(closed.status, ChannelStatus::Closed);
        assert_eq!(s.coordinator.metrics().snapshot().channels_closed, 1);
    }

    #[tokio::test]
    async fn test_checkpoint_roundtrip_through_api() {
        let s = setup().await;
        let channel = s.open().await;
        let traded = s.trade(&channel).await;

        let (state, trader_sig, lp_sig) = s.dual_signed(&traded, 2, now_millis());
        let expected_hash = state.struct_hash();
        let after = s
            .coordinator
            .submit_checkpoint(CheckpointRequest {
                channel_id: channel.channel_id,
                state,
                trader_signature: trader_sig,
                lp_signature: lp_sig,
            })
            .await
            .unwrap();

        assert_eq!(after.status, ChannelStatus::Active);
        assert!(after.last_checkpoint_at.is_some());
        assert_eq!(after.last_state_hash, Some(expected_hash));
    }

    #[tokio::test]
    async fn test_failed_settlement_escalates_to_disputed() {
        let s = setup().await;
        let channel = s.open().await;
        let traded = s.trade(&channel).await;

        s.submitter.fail_settlements.store(true, Ordering::SeqCst);
        let (state, trader_sig, lp_sig) = s.dual_signed(&traded, 3, now_millis());
        s.coordinator
            .submit_close(SettlementRequest {
                channel_id: channel.channel_id,
                final_state: state,
                trader_signature: trader_sig,
                lp_signature: lp_sig,
            })
            .await
            .unwrap();

        // Retries exhaust against the failing submitter and the channel
        // is frozen.
        let frozen = s.coordinator.channel_state(channel.channel_id).await.unwrap();
        assert_eq!(frozen.status, ChannelStatus::Disputed);
        assert_eq!(s.coordinator.metrics().snapshot().channels_disputed, 1);
    }

    #[tokio::test]
    async fn test_dispute_staging_and_resolution() {
        let s = setup().await;
        let channel = s.open().await;
        let traded = s.trade(&channel).await;

        let (state, trader_sig, lp_sig) = s.dual_signed(&traded, 3, now_millis());
        s.coordinator
            .submit_close(SettlementRequest {
                channel_id: channel.channel_id,
                final_state: state,
                trader_signature: trader_sig,
                lp_signature: lp_sig,
            })
            .await
            .unwrap();

        // A higher-nonce dual-signed state arrives before confirmation:
        // staged, not submitted.
        let (newer, newer_trader_sig, newer_lp_sig) = s.dual_signed(&traded, 4, now_millis() + 1);
        s.coordinator
            .submit_close(SettlementRequest {
                channel_id: channel.channel_id,
                final_state: newer.clone(),
                trader_signature: newer_trader_sig,
                lp_signature: newer_lp_sig,
            })
            .await
            .unwrap();
        assert_eq!(s.submitter.settlements.lock().len(), 1);

        // Operator adopts the staged state; it goes out as a fresh
        // submission.
        s.coordinator
            .resolve_dispute(channel.channel_id, DisputeResolution::UseStaged)
            .await
            .unwrap();
        {
            let submitted = s.submitter.settlements.lock();
            assert_eq!(submitted.len(), 2);
            assert_eq!(submitted[1].final_state.nonce, 4);
            assert_eq!(submitted[1].status, SubmissionStatus::Submitted);
        }

        // The channel record mirrors the adopted state, so after
        // confirmation it reports the settled nonce and hash.
        let current = s.coordinator.channel_state(channel.channel_id).await.unwrap();
        assert_eq!(current.nonce, 4);
        assert_eq!(current.last_state_hash, Some(newer.struct_hash()));

        s.coordinator
            .settlement_receipt(channel.channel_id, SubmissionReceipt::Confirmed)
            .await
            .unwrap();
        let closed = s.coordinator.channel_state(channel.channel_id).await.unwrap();
        assert_eq!(closed.status, ChannelStatus::Closed);
        assert_eq!(closed.nonce, 4);
        assert_eq!(closed.last_state_hash, Some(newer.struct_hash()));
    }

    #[tokio::test]
    async fn test_staged_dispute_defers_failed_retries() {
        let s = setup().await;
        let channel = s.open().await;
        let traded = s.trade(&channel).await;

        let (state, trader_sig, lp_sig) = s.dual_signed(&traded, 3, now_millis());
        s.coordinator
            .submit_close(SettlementRequest {
                channel_id: channel.channel_id,
                final_state: state,
                trader_signature: trader_sig,
                lp_signature: lp_sig,
            })
            .await
            .unwrap();

        let (newer, newer_trader_sig, newer_lp_sig) = s.dual_signed(&traded, 4, now_millis() + 1);
        s.coordinator
            .submit_close(SettlementRequest {
                channel_id: channel.channel_id,
                final_state: newer,
                trader_signature: newer_trader_sig,
                lp_signature: newer_lp_sig,
            })
            .await
            .unwrap();
        assert_eq!(s.submitter.settlements.lock().len(), 1);

        // A failure receipt for the superseded submission must not
        // auto-retry the stale state while the dispute awaits the
        // operator.
        s.coordinator
            .settlement_receipt(
                channel.channel_id,
                SubmissionReceipt::Failed {
                    reason: "reorged out".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(s.submitter.settlements.lock().len(), 1);
        let frozen = s.coordinator.channel_state(channel.channel_id).await.unwrap();
        assert_eq!(frozen.status, ChannelStatus::Settling);

        // Resolution resumes submission with the chosen state.
        s.coordinator
            .resolve_dispute(channel.channel_id, DisputeResolution::UseStaged)
            .await
            .unwrap();
        let submitted = s.submitter.settlements.lock();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[1].final_state.nonce, 4);
    }

    #[tokio::test]
    async fn test_timeout_sweep() {
        // Scenario S5 with the floor lowered so a short timeout is
        // accepted.
        let s = setup_with(CoordinatorConfig {
            verifying_contract: Address([0x42; 20]),
            channel_timeout_floor_ms: 10,
            dispute_window_ms: 40,
            ..CoordinatorConfig::default()
        })
        .await;

        let channel = s
            .coordinator
            .open_channel(OpenChannelParams {
                trader: s.trader.address(),
                lp: s.lp.address(),
                tokens: vec![USDC],
                trader_deposits: vec![U256::from(1u64)],
                lp_deposits: vec![U256::from(1u64)],
                timeout_ms: 20,
            })
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        s.coordinator.sweep_once().await.unwrap();
        let timed_out = s.coordinator.channel_state(channel.channel_id).await.unwrap();
        assert_eq!(timed_out.status, ChannelStatus::TimedOut);

        // Subsequent messages fail with wrong_status.
        let mut req = QuoteRequest {
            channel_id: channel.channel_id,
            nonce: 1,
            side: Side::Buy,
            base_token: USDC,
            quote_token: USDC,
            quantity: U256::from(1u64),
            max_slippage_bps: 1,
            timestamp: now_millis(),
            trader: s.trader.address(),
            signature: Signature::default(),
        };
        req.base_token = Address([0x05; 20]);
        req.signature = s
            .trader
            .sign_digest(Message::QuoteRequest(req.clone()).signing_digest(s.domain()))
            .unwrap();
        let err = s
            .coordinator
            .submit_message(Message::QuoteRequest(req))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "wrong_status");

        // After the grace window the channel expires.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        s.coordinator.sweep_once().await.unwrap();
        let expired = s.coordinator.channel_state(channel.channel_id).await.unwrap();
        assert_eq!(expired.status, ChannelStatus::Expired);
    }

    #[tokio::test]
    async fn test_not_running_rejects_requests() {
        let s = setup().await;
        *s.coordinator.run_state.write() = RunState::Stopped;
        let err = s
            .coordinator
            .open_channel(OpenChannelParams {
                trader: s.trader.address(),
                lp: s.lp.address(),
                tokens: vec![USDC],
                trader_deposits: vec![U256::from(1u64)],
                lp_deposits: vec![U256::from(1u64)],
                timeout_ms: 3_600_000,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[tokio::test]
    async fn test_participant_channel_listing() {
        let s = setup().await;
        let a = s.open().await;
        let b = s.open().await;

        let ids = s
            .coordinator
            .channels_for_participant(s.trader.address())
            .await
            .unwrap();
        assert!(ids.contains(&a.channel_id));
        assert!(ids.contains(&b.channel_id));
    }
}
