//! PhotonX Channel Store
//!
//! The store is the only shared mutable resource of the coordinator.
//! This crate defines the contract the core consumes — durable channel
//! records, the append-only message log, checkpoint and settlement
//! collections, the participant index, and per-channel distributed
//! locks — plus in-memory implementations for single-node deployments
//! and tests. A durable backend implements the same traits.

pub mod memory;
pub mod records;

pub use memory::{MemoryLockClient, MemoryStore};
pub use records::*;

use std::time::Duration;

use async_trait::async_trait;

use photonx_common::{Address, Channel, ChannelId, Result};

/// Outcome of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquisition {
    /// The caller now holds the lock.
    Acquired,
    /// Another owner holds an unexpired lock.
    HeldByOther,
}

/// Per-channel distributed lock with TTL expiry and owner-checked
/// release.
///
/// A horizontally scaled deployment backs this with a shared lock
/// service; a single node simulates it with a keyed in-memory table.
#[async_trait]
pub trait LockClient: Send + Sync {
    /// Try to acquire the lock for a channel. Re-acquiring with the same
    /// owner refreshes the TTL.
    async fn acquire(
        &self,
        channel_id: ChannelId,
        owner: &str,
        ttl: Duration,
    ) -> Result<LockAcquisition>;

    /// Release the lock if `owner` holds it. Returns whether a release
    /// happened.
    async fn release(&self, channel_id: ChannelId, owner: &str) -> Result<bool>;
}

/// Durable record of channels, messages, checkpoints, and settlements.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Fetch a channel record.
    async fn get(&self, channel_id: ChannelId) -> Result<Option<Channel>>;

    /// Write a channel record, last-write-wins.
    async fn put(&self, channel: Channel) -> Result<()>;

    /// Atomically write a channel record together with associated log,
    /// checkpoint, or settlement entries: either all become durable or
    /// none do.
    async fn transactional_put_many(&self, batch: StoreBatch) -> Result<()>;

    /// Append a message to the log. Rejects duplicates at
    /// `(channel_id, nonce)`.
    async fn append_message(&self, entry: MessageLogEntry) -> Result<()>;

    /// Fetch a logged message.
    async fn get_message(&self, channel_id: ChannelId, nonce: u64)
        -> Result<Option<MessageLogEntry>>;

    /// Record a checkpoint, keyed by `(channel_id, nonce)`.
    async fn put_checkpoint(&self, checkpoint: CheckpointRecord) -> Result<()>;

    /// Fetch a checkpoint.
    async fn get_checkpoint(
        &self,
        channel_id: ChannelId,
        nonce: u64,
    ) -> Result<Option<CheckpointRecord>>;

    /// Checkpoints not yet submitted on-chain, oldest first.
    async fn unsubmitted_checkpoints(&self) -> Result<Vec<CheckpointRecord>>;

    /// Mark a set of checkpoints as submitted.
    async fn mark_checkpoints_submitted(&self, keys: &[(ChannelId, u64)]) -> Result<()>;

    /// Record a settlement, keyed by channel id.
    async fn put_settlement(&self, settlement: SettlementRecord) -> Result<()>;

    /// Fetch a settlement record.
    async fn get_settlement(&self, channel_id: ChannelId) -> Result<Option<SettlementRecord>>;

    /// Channels a participant is party to (secondary index).
    async fn channels_for_participant(&self, participant: Address) -> Result<Vec<ChannelId>>;

    /// Channels not yet in a terminal status, for the timeout sweeper.
    async fn non_terminal_channels(&self) -> Result<Vec<ChannelId>>;
}
