//! In-memory store and lock implementations.
//!
//! Single-node stand-ins for the durable backend and the distributed
//! lock service. The trait surface is identical, so a deployment can
//! swap in a persistent backend without touching the core.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use photonx_common::{Address, Channel, ChannelId, PhotonXError, Result};

use crate::{
    ChannelStore, CheckpointRecord, LockAcquisition, LockClient, MessageLogEntry,
    SettlementRecord, StoreBatch,
};

/// In-memory channel store.
///
/// A commit mutex makes `transactional_put_many` atomic with respect to
/// other transactional writes; individual puts are last-write-wins.
pub struct MemoryStore {
    channels: DashMap<ChannelId, Channel>,
    messages: DashMap<(ChannelId, u64), MessageLogEntry>,
    checkpoints: DashMap<(ChannelId, u64), CheckpointRecord>,
    settlements: DashMap<ChannelId, SettlementRecord>,
    by_participant: DashMap<Address, Vec<ChannelId>>,
    commit_guard: Mutex<()>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            messages: DashMap::new(),
            checkpoints: DashMap::new(),
            settlements: DashMap::new(),
            by_participant: DashMap::new(),
            commit_guard: Mutex::new(()),
        }
    }

    fn index_participants(&self, channel: &Channel) {
        for participant in [channel.trader, channel.lp] {
            let mut ids = self.by_participant.entry(participant).or_default();
            if !ids.contains(&channel.channel_id) {
                ids.push(channel.channel_id);
            }
        }
    }

    fn write_channel(&self, channel: Channel) {
        self.index_participants(&channel);
        self.channels.insert(channel.channel_id, channel);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn get(&self, channel_id: ChannelId) -> Result<Option<Channel>> {
        Ok(self.channels.get(&channel_id).map(|c| c.clone()))
    }

    async fn put(&self, channel: Channel) -> Result<()> {
        self.write_channel(channel);
        Ok(())
    }

    async fn transactional_put_many(&self, batch: StoreBatch) -> Result<()> {
        let _guard = self.commit_guard.lock();

        // Validate the whole batch before writing anything.
        if let Some(entry) = &batch.message {
            if self.messages.contains_key(&(entry.channel_id, entry.nonce)) {
                return Err(PhotonXError::DuplicateEntry {
                    channel_id: entry.channel_id,
                    nonce: entry.nonce,
                });
            }
        }

        if let Some(channel) = batch.channel {
            self.write_channel(channel);
        }
        if let Some(entry) = batch.message {
            self.messages.insert((entry.channel_id, entry.nonce), entry);
        }
        if let Some(checkpoint) = batch.checkpoint {
            self.checkpoints
                .insert((checkpoint.channel_id, checkpoint.nonce), checkpoint);
        }
        if let Some(settlement) = batch.settlement {
            self.settlements.insert(settlement.channel_id, settlement);
        }
        Ok(())
    }

    async fn append_message(&self, entry: MessageLogEntry) -> Result<()> {
        let key = (entry.channel_id, entry.nonce);
        match self.messages.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(PhotonXError::DuplicateEntry {
                channel_id: entry.channel_id,
                nonce: entry.nonce,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    async fn get_message(
        &self,
        channel_id: ChannelId,
        nonce: u64,
    ) -> Result<Option<MessageLogEntry>> {
        Ok(self.messages.get(&(channel_id, nonce)).map(|m| m.clone()))
    }

    async fn put_checkpoint(&self, checkpoint: CheckpointRecord) -> Result<()> {
        self.checkpoints
            .insert((checkpoint.channel_id, checkpoint.nonce), checkpoint);
        Ok(())
    }

    async fn get_checkpoint(
        &self,
        channel_id: ChannelId,
        nonce: u64,
    ) -> Result<Option<CheckpointRecord>> {
        Ok(self
            .checkpoints
            .get(&(channel_id, nonce))
            .map(|c| c.clone()))
    }

    async fn unsubmitted_checkpoints(&self) -> Result<Vec<CheckpointRecord>> {
        let mut pending: Vec<CheckpointRecord> = self
            .checkpoints
            .iter()
            .filter(|c| !c.submitted)
            .map(|c| c.clone())
            .collect();
        pending.sort_by_key(|c| c.created_at);
        Ok(pending)
    }

    async fn mark_checkpoints_submitted(&self, keys: &[(ChannelId, u64)]) -> Result<()> {
        for key in keys {
            if let Some(mut checkpoint) = self.checkpoints.get_mut(key) {
                checkpoint.submitted = true;
            }
        }
        Ok(())
    }

    async fn put_settlement(&self, settlement: SettlementRecord) -> Result<()> {
        self.settlements.insert(settlement.channel_id, settlement);
        Ok(())
    }

    async fn get_settlement(&self, channel_id: ChannelId) -> Result<Option<SettlementRecord>> {
        Ok(self.settlements.get(&channel_id).map(|s| s.clone()))
    }

    async fn channels_for_participant(&self, participant: Address) -> Result<Vec<ChannelId>> {
        Ok(self
            .by_participant
            .get(&participant)
            .map(|ids| ids.clone())
            .unwrap_or_default())
    }

    async fn non_terminal_channels(&self) -> Result<Vec<ChannelId>> {
        Ok(self
            .channels
            .iter()
            .filter(|c| !c.status.is_terminal())
            .map(|c| c.channel_id)
            .collect())
    }
}

struct LockEntry {
    owner: String,
    expires_at: Instant,
}

/// In-memory keyed lock table with TTL expiry.
pub struct MemoryLockClient {
    locks: DashMap<ChannelId, LockEntry>,
}

impl MemoryLockClient {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Count of unexpired locks, for diagnostics.
    pub fn active_locks(&self) -> usize {
        let now = Instant::now();
        self.locks.iter().filter(|l| l.expires_at > now).count()
    }
}

impl Default for MemoryLockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockClient for MemoryLockClient {
    async fn acquire(
        &self,
        channel_id: ChannelId,
        owner: &str,
        ttl: Duration,
    ) -> Result<LockAcquisition> {
        let now = Instant::now();
        match self.locks.entry(channel_id) {
            dashmap::mapref::entry::Entry::Occupied(mut held) => {
                let entry = held.get();
                if entry.expires_at > now && entry.owner != owner {
                    return Ok(LockAcquisition::HeldByOther);
                }
                // Expired or re-entrant: take over and refresh the TTL.
                held.insert(LockEntry {
                    owner: owner.to_string(),
                    expires_at: now + ttl,
                });
                Ok(LockAcquisition::Acquired)
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(LockEntry {
                    owner: owner.to_string(),
                    expires_at: now + ttl,
                });
                Ok(LockAcquisition::Acquired)
            }
        }
    }

    async fn release(&self, channel_id: ChannelId, owner: &str) -> Result<bool> {
        let removed = self
            .locks
            .remove_if(&channel_id, |_, entry| entry.owner == owner)
            .is_some();
        if !removed {
            debug!(channel_id = %channel_id, owner, "Release skipped, lock not held by owner");
        }
        Ok(removed)
    }
}
