//! Message pipeline.
//!
//! Accepts inbound traffic from the transport boundary, validates it in
//! full before any state change, serializes application per channel via
//! the distributed lock, commits transactionally, and hands results to
//! the broadcaster. Messages for different channels proceed in
//! parallel; within one channel exactly one transition is in flight at
//! a time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use photonx_common::{
    now, now_millis, Channel, ChannelId, Deadline, PhotonXError, Result,
};
use photonx_protocol::{ChannelState, CheckpointRequest, Message, SettlementRequest};
use photonx_store::{
    ChannelStore, CheckpointRecord, LockAcquisition, LockClient, MessageLogEntry,
    SettlementRecord, StoreBatch,
};

use crate::broadcast::{Broadcaster, ChannelEvent};
use crate::cache::ChannelCache;
use crate::config::CoordinatorConfig;
use crate::machine::ChannelStateMachine;
use crate::metrics::SharedMetrics;
use crate::retry::with_backoff;

const LOCK_RETRY_SLEEP_MS: u64 = 10;

/// Serialized, validated application of channel operations.
pub struct MessagePipeline {
    store: Arc<dyn ChannelStore>,
    locks: Arc<dyn LockClient>,
    machine: Arc<ChannelStateMachine>,
    broadcaster: Arc<Broadcaster>,
    cache: Arc<ChannelCache>,
    metrics: SharedMetrics,
    config: CoordinatorConfig,
    inflight: DashMap<ChannelId, Arc<AtomicUsize>>,
}

impl MessagePipeline {
    /// Wire up the pipeline.
    pub fn new(
        store: Arc<dyn ChannelStore>,
        locks: Arc<dyn LockClient>,
        machine: Arc<ChannelStateMachine>,
        broadcaster: Arc<Broadcaster>,
        cache: Arc<ChannelCache>,
        metrics: SharedMetrics,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            locks,
            machine,
            broadcaster,
            cache,
            metrics,
            config,
            inflight: DashMap::new(),
        }
    }

    /// Process one inbound message end to end. Returns the committed
    /// successor state.
    #[instrument(skip(self, msg), fields(channel_id = %msg.channel_id(), kind = msg.kind()))]
    pub async fn process_message(&self, msg: Message, deadline: Deadline) -> Result<Channel> {
        let result = self.process_message_inner(&msg, deadline).await;
        match &result {
            Ok(_) => self.metrics.message_accepted(),
            Err(_) => self.metrics.message_rejected(),
        }
        result
    }

    async fn process_message_inner(&self, msg: &Message, deadline: Deadline) -> Result<Channel> {
        // Stage 1 runs before any lock or store traffic.
        msg.validate_shape(&self.config.shape_limits())?;

        let channel_id = msg.channel_id();
        let _slot = self.reserve_slot(channel_id)?;
        let owner = self.acquire_lock(channel_id, &deadline).await?;

        let outcome = self.apply_under_lock(channel_id, msg, &deadline).await;
        self.release_lock(channel_id, &owner).await;

        let (next, state) = outcome?;
        self.broadcaster.publish(
            next.trader,
            next.lp,
            &ChannelEvent {
                channel_id,
                nonce: next.nonce,
                state,
                message: msg.clone(),
            },
        );
        Ok(next)
    }

    async fn apply_under_lock(
        &self,
        channel_id: ChannelId,
        msg: &Message,
        deadline: &Deadline,
    ) -> Result<(Channel, ChannelState)> {
        // The authoritative record is read from the store inside the
        // lock; the cache only serves lock-free reads.
        let channel = self.load(channel_id).await?;
        let next = self.machine.apply_message(&channel, msg, now_millis())?;

        if deadline.is_exceeded() {
            return Err(PhotonXError::Timeout {
                operation: deadline.operation.clone(),
            });
        }

        let commit = if msg.advances_nonce() {
            let entry = MessageLogEntry {
                channel_id,
                nonce: next.nonce,
                message: msg.clone(),
                recorded_at: now(),
            };
            self.commit(StoreBatch::commit(next.clone(), entry)).await
        } else {
            self.commit(StoreBatch::channel(next.clone())).await
        };
        if let Err(err) = commit {
            return Err(self.escalate_store_failure(channel, err).await);
        }

        self.cache.store(&next);
        let state = ChannelState::from_channel(&next, msg.timestamp());
        Ok((next, state))
    }

    /// Accept a dual-signed checkpoint: record it, transition through
    /// `checkpointing`, and return to `active` with the witness hash.
    #[instrument(skip(self, request), fields(channel_id = %request.channel_id))]
    pub async fn process_checkpoint(
        &self,
        request: CheckpointRequest,
        deadline: Deadline,
    ) -> Result<(Channel, CheckpointRecord)> {
        let channel_id = request.channel_id;
        let _slot = self.reserve_slot(channel_id)?;
        let owner = self.acquire_lock(channel_id, &deadline).await?;

        let outcome = async {
            let channel = self.load(channel_id).await?;
            let (checkpointing, record) =
                self.machine.request_checkpoint(&channel, &request, now())?;

            let mut batch = StoreBatch::channel(checkpointing.clone());
            batch.checkpoint = Some(record.clone());
            if let Err(err) = self.commit(batch).await {
                return Err(self.escalate_store_failure(channel, err).await);
            }

            let active = self
                .machine
                .commit_checkpoint(&checkpointing, &record, now())?;
            if let Err(err) = self.commit(StoreBatch::channel(active.clone())).await {
                return Err(self.escalate_store_failure(checkpointing, err).await);
            }

            self.cache.store(&active);
            self.metrics.checkpoint_recorded();
            Ok((active, record))
        }
        .await;

        self.release_lock(channel_id, &owner).await;
        outcome
    }

    /// Accept a dual-signed final state: transition to `settling` and
    /// persist the settlement record for the driver.
    #[instrument(skip(self, request), fields(channel_id = %request.channel_id))]
    pub async fn process_close(
        &self,
        request: SettlementRequest,
        deadline: Deadline,
    ) -> Result<(Channel, SettlementRecord)> {
        let channel_id = request.channel_id;
        let _slot = self.reserve_slot(channel_id)?;
        let owner = self.acquire_lock(channel_id, &deadline).await?;

        let outcome = async {
            let channel = self.load(channel_id).await?;
            let (settling, record) = self.machine.close(&channel, &request, now())?;

            let mut batch = StoreBatch::channel(settling.clone());
            batch.settlement = Some(record.clone());
            if let Err(err) = self.commit(batch).await {
                return Err(self.escalate_store_failure(channel, err).await);
            }

            self.cache.store(&settling);
            Ok((settling, record))
        }
        .await;

        self.release_lock(channel_id, &owner).await;
        outcome
    }

    /// Apply a status-only transition under the channel lock, persist
    /// it, and return the successor record.
    pub async fn transition(
        &self,
        channel_id: ChannelId,
        deadline: Deadline,
        apply: impl FnOnce(&ChannelStateMachine, &Channel) -> Result<Channel>,
    ) -> Result<Channel> {
        let owner = self.acquire_lock(channel_id, &deadline).await?;

        let outcome = async {
            let channel = self.load(channel_id).await?;
            let next = apply(&self.machine, &channel)?;
            if let Err(err) = self.commit(StoreBatch::channel(next.clone())).await {
                return Err(self.escalate_store_failure(channel, err).await);
            }
            self.cache.store(&next);
            Ok(next)
        }
        .await;

        self.release_lock(channel_id, &owner).await;
        outcome
    }

    /// The state machine this pipeline drives.
    pub fn machine(&self) -> &ChannelStateMachine {
        &self.machine
    }

    /// Read a channel without taking the lock, serving cached entries
    /// where possible.
    pub async fn read(&self, channel_id: ChannelId) -> Result<Channel> {
        if let Some(channel) = self.cache.get(channel_id) {
            return Ok(channel);
        }
        let channel = self.load(channel_id).await?;
        self.cache.store(&channel);
        Ok(channel)
    }

    // --- Internal plumbing ---

    fn reserve_slot(&self, channel_id: ChannelId) -> Result<InflightSlot> {
        let counter = self
            .inflight
            .entry(channel_id)
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .clone();
        if counter.fetch_add(1, Ordering::SeqCst) >= self.config.max_pending_per_channel {
            counter.fetch_sub(1, Ordering::SeqCst);
            return Err(PhotonXError::Overloaded { channel_id });
        }
        Ok(InflightSlot { counter })
    }

    async fn acquire_lock(&self, channel_id: ChannelId, deadline: &Deadline) -> Result<String> {
        let owner = Uuid::new_v4().to_string();
        let ttl = std::time::Duration::from_millis(self.config.lock_ttl_ms);
        loop {
            match self.locks.acquire(channel_id, &owner, ttl).await? {
                LockAcquisition::Acquired => return Ok(owner),
                LockAcquisition::HeldByOther => {
                    self.metrics.lock_contended();
                    if deadline.is_exceeded() {
                        return Err(PhotonXError::LockUnavailable { channel_id });
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(LOCK_RETRY_SLEEP_MS))
                        .await;
                }
            }
        }
    }

    async fn release_lock(&self, channel_id: ChannelId, owner: &str) {
        if let Err(err) = self.locks.release(channel_id, owner).await {
            warn!(channel_id = %channel_id, error = %err, "Lock release failed; TTL will expire it");
        }
    }

    async fn load(&self, channel_id: ChannelId) -> Result<Channel> {
        with_backoff(&self.config.store_retry, "channel read", || {
            self.store.get(channel_id)
        })
        .await?
        .ok_or(PhotonXError::NotFound { channel_id })
    }

    async fn commit(&self, batch: StoreBatch) -> Result<()> {
        with_backoff(&self.config.store_retry, "channel commit", || {
            self.store.transactional_put_many(batch.clone())
        })
        .await
    }

    /// Store retries exhausted mid-transition: freeze the channel and
    /// alert operators.
    async fn escalate_store_failure(&self, channel: Channel, err: PhotonXError) -> PhotonXError {
        if !matches!(err, PhotonXError::Store(_)) {
            return err;
        }
        error!(
            channel_id = %channel.channel_id,
            error = %err,
            "Store retries exhausted, marking channel disputed"
        );
        if let Ok(disputed) = self.machine.mark_disputed(&channel) {
            if self.store.put(disputed.clone()).await.is_ok() {
                self.cache.store(&disputed);
            }
            self.metrics.channel_disputed();
        }
        err
    }
}

struct InflightSlot {
    counter: Arc<AtomicUsize>,
}

impl Drop for InflightSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::OpenChannelParams;
    use crate::metrics::Metrics;
    use photonx_common::{Address, QuoteId, Side, Signature, U256};
    use photonx_crypto::{DomainSeparator, Signer};
    use photonx_protocol::{Fill, Quote, QuoteRequest};
    use photonx_store::{MemoryLockClient, MemoryStore};

    const USDC: Address = Address([0x01; 20]);
    const WETH: Address = Address([0x02; 20]);

    struct Fixture {
        pipeline: Arc<MessagePipeline>,
        machine: Arc<ChannelStateMachine>,
        store: Arc<MemoryStore>,
        broadcaster: Arc<Broadcaster>,
        locks: Arc<MemoryLockClient>,
        trader: Signer,
        lp: Signer,
        channel: Channel,
    }

    async fn fixture() -> Fixture {
        let config = CoordinatorConfig {
            verifying_contract: Address([0x42; 20]),
            ..CoordinatorConfig::default()
        };
        let domain = DomainSeparator::photonx(config.chain_id, config.verifying_contract);
        let machine = Arc::new(ChannelStateMachine::new(
            domain,
            config.message_skew_window_ms,
            config.channel_timeout_floor_ms,
        ));
        let store = Arc::new(MemoryStore::new());
        let locks = Arc::new(MemoryLockClient::new());
        let metrics: SharedMetrics = Arc::new(Metrics::new());
        let broadcaster = Arc::new(Broadcaster::new(
            config.subscriber_queue_depth,
            metrics.clone(),
        ));
        let cache = Arc::new(ChannelCache::new(config.cache_idle_eviction_ms));

        let trader = Signer::from_bytes(&[0x11; 32]).unwrap();
        let lp = Signer::from_bytes(&[0x22; 32]).unwrap();
        let channel = machine
            .open(
                OpenChannelParams {
                    trader: trader.address(),
                    lp: lp.address(),
                    tokens: vec![USDC, WETH],
                    trader_deposits: vec![U256::exp10(6) * U256::from(1_000u64), U256::zero()],
                    lp_deposits: vec![U256::zero(), U256::exp10(18)],
                    timeout_ms: 3_600_000,
                },
                now(),
            )
            .unwrap();
        store.put(channel.clone()).await.unwrap();

        let pipeline = Arc::new(MessagePipeline::new(
            store.clone(),
            locks.clone(),
            machine.clone(),
            broadcaster.clone(),
            cache,
            metrics,
            config,
        ));

        Fixture {
            pipeline,
            machine,
            store,
            broadcaster,
            locks,
            trader,
            lp,
            channel,
        }
    }

    fn deadline() -> Deadline {
        Deadline::after_millis(2_000, "test request")
    }

    fn signed_request(f: &Fixture, nonce: u64, timestamp: u64) -> Message {
        let mut req = QuoteRequest {
            channel_id: f.channel.channel_id,
            nonce,
            side: Side::Buy,
            base_token: WETH,
            quote_token: USDC,
            quantity: U256::exp10(17) * U256::from(5u64),
            max_slippage_bps: 50,
            timestamp,
            trader: f.trader.address(),
            signature: Signature::default(),
        };
        req.signature = f
            .trader
            .sign_digest(Message::QuoteRequest(req.clone()).signing_digest(f.machine.domain()))
            .unwrap();
        Message::QuoteRequest(req)
    }

    fn signed_quote(f: &Fixture, quote_id: QuoteId, request_nonce: u64, timestamp: u64) -> Message {
        let mut quote = Quote {
            channel_id: f.channel.channel_id,
            quote_id,
            request_nonce,
            price: U256::exp10(6) * U256::from(2_000u64),
            quantity: U256::exp10(17) * U256::from(5u64),
            side: Side::Buy,
            expiry_timestamp: timestamp + 30_000,
            lp_fee_bps: 30,
            timestamp,
            lp: f.lp.address(),
            signature: Signature::default(),
        };
        quote.signature = f
            .lp
            .sign_digest(Message::Quote(quote.clone()).signing_digest(f.machine.domain()))
            .unwrap();
        Message::Quote(quote)
    }

    fn signed_fill(
        f: &Fixture,
        quote_id: QuoteId,
        nonce: u64,
        timestamp: u64,
        fill_id: photonx_common::FillId,
    ) -> Message {
        let mut fill = Fill {
            channel_id: f.channel.channel_id,
            quote_id,
            fill_id,
            nonce,
            quantity: U256::exp10(17) * U256::from(5u64),
            price: U256::exp10(6) * U256::from(2_000u64),
            timestamp,
            trader: f.trader.address(),
            lp: f.lp.address(),
            trader_signature: Signature::default(),
            lp_signature: Signature::default(),
        };
        let digest = Message::Fill(fill.clone()).signing_digest(f.machine.domain());
        fill.trader_signature = f.trader.sign_digest(digest).unwrap();
        fill.lp_signature = f.lp.sign_digest(digest).unwrap();
        Message::Fill(fill)
    }

    #[tokio::test]
    async fn test_accepts_and_broadcasts() {
        let f = fixture().await;
        let mut trader_rx = f.broadcaster.subscribe(f.trader.address());
        let ts = now_millis();

        let next = f
            .pipeline
            .process_message(signed_request(&f, 1, ts), deadline())
            .await
            .unwrap();
        assert_eq!(next.nonce, 1);

        let event = trader_rx.recv().await.unwrap();
        assert_eq!(event.nonce, 1);
        assert_eq!(event.channel_id, f.channel.channel_id);

        // The accepted message is archived; a durable read agrees.
        assert!(f
            .store
            .get_message(f.channel.channel_id, 1)
            .await
            .unwrap()
            .is_some());
        assert_eq!(f.pipeline.read(f.channel.channel_id).await.unwrap().nonce, 1);
    }

    #[tokio::test]
    async fn test_unknown_channel_not_found() {
        let f = fixture().await;
        let mut msg = signed_request(&f, 1, now_millis());
        if let Message::QuoteRequest(req) = &mut msg {
            req.channel_id = ChannelId::new();
            req.signature = f
                .trader
                .sign_digest(
                    Message::QuoteRequest(req.clone()).signing_digest(f.machine.domain()),
                )
                .unwrap();
        }
        let err = f.pipeline.process_message(msg, deadline()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_concurrent_fills_single_acceptance() {
        let f = fixture().await;
        let ts = now_millis();
        let quote_id = QuoteId::new();

        f.pipeline
            .process_message(signed_request(&f, 1, ts), deadline())
            .await
            .unwrap();
        f.pipeline
            .process_message(signed_quote(&f, quote_id, 1, ts + 1), deadline())
            .await
            .unwrap();

        // Two distinct fills both claiming nonce 2, racing.
        let fill_a = signed_fill(&f, quote_id, 2, ts + 2, photonx_common::FillId::new());
        let fill_b = signed_fill(&f, quote_id, 2, ts + 3, photonx_common::FillId::new());
        let (ra, rb) = tokio::join!(
            f.pipeline.process_message(fill_a, deadline()),
            f.pipeline.process_message(fill_b, deadline()),
        );

        let accepted = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        let rejected = if ra.is_err() { ra } else { rb };
        let kind = rejected.unwrap_err().kind();
        assert!(kind == "stale_nonce" || kind == "already_filled" || kind == "stale_timestamp");

        let committed = f.store.get(f.channel.channel_id).await.unwrap().unwrap();
        assert_eq!(committed.nonce, 2);
        assert!(committed.conservation_holds());
    }

    #[tokio::test]
    async fn test_lock_held_elsewhere_times_out() {
        let f = fixture().await;
        f.locks
            .acquire(
                f.channel.channel_id,
                "foreign-node",
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();

        let err = f
            .pipeline
            .process_message(
                signed_request(&f, 1, now_millis()),
                Deadline::after_millis(50, "short request"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "lock_unavailable");
    }

    #[tokio::test]
    async fn test_other_channels_proceed_while_one_is_locked() {
        let f = fixture().await;

        // Channel A's lock is held by another node.
        f.locks
            .acquire(
                f.channel.channel_id,
                "foreign-node",
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();

        // A second channel between the same parties is unaffected.
        let other = f
            .machine
            .open(
                OpenChannelParams {
                    trader: f.trader.address(),
                    lp: f.lp.address(),
                    tokens: vec![USDC, WETH],
                    trader_deposits: vec![U256::exp10(6) * U256::from(500u64), U256::zero()],
                    lp_deposits: vec![U256::zero(), U256::exp10(18)],
                    timeout_ms: 3_600_000,
                },
                now(),
            )
            .unwrap();
        f.store.put(other.clone()).await.unwrap();

        let mut msg = signed_request(&f, 1, now_millis());
        if let Message::QuoteRequest(req) = &mut msg {
            req.channel_id = other.channel_id;
            req.signature = f
                .trader
                .sign_digest(
                    Message::QuoteRequest(req.clone()).signing_digest(f.machine.domain()),
                )
                .unwrap();
        }
        let next = f.pipeline.process_message(msg, deadline()).await.unwrap();
        assert_eq!(next.channel_id, other.channel_id);
        assert_eq!(next.nonce, 1);
    }

    #[tokio::test]
    async fn test_rejection_leaves_no_log_entry() {
        let f = fixture().await;
        let ts = now_millis();
        f.pipeline
            .process_message(signed_request(&f, 1, ts), deadline())
            .await
            .unwrap();

        // Replay is rejected and nothing new is archived.
        let err = f
            .pipeline
            .process_message(signed_request(&f, 1, ts), deadline())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "stale_nonce");
        assert!(f
            .store
            .get_message(f.channel.channel_id, 2)
            .await
            .unwrap()
            .is_none());
    }
}
