//! In-memory channel cache.
//!
//! A read-through/write-through mirror of the store: entries are updated
//! only after a successful store commit, evicted on terminal transitions
//! and after a configured idle period. Coherency across coordinator
//! instances comes from re-reading the authoritative record inside the
//! per-channel lock, so a stale cache entry can serve reads but never
//! seeds a mutation.

use chrono::Duration;
use dashmap::DashMap;

use photonx_common::{now, Channel, ChannelId, Timestamp};

#[derive(Debug, Clone)]
struct CacheEntry {
    channel: Channel,
    last_touched: Timestamp,
}

/// Channel cache with idle eviction.
pub struct ChannelCache {
    entries: DashMap<ChannelId, CacheEntry>,
    idle_eviction: Duration,
}

impl ChannelCache {
    /// Create a cache with the given idle-eviction period.
    pub fn new(idle_eviction_ms: u64) -> Self {
        Self {
            entries: DashMap::new(),
            idle_eviction: Duration::milliseconds(idle_eviction_ms as i64),
        }
    }

    /// Look up a channel, refreshing its idle timer.
    pub fn get(&self, channel_id: ChannelId) -> Option<Channel> {
        self.entries.get_mut(&channel_id).map(|mut entry| {
            entry.last_touched = now();
            entry.channel.clone()
        })
    }

    /// Mirror a committed record. Terminal records are evicted instead
    /// of cached.
    pub fn store(&self, channel: &Channel) {
        if channel.status.is_terminal() {
            self.entries.remove(&channel.channel_id);
            return;
        }
        self.entries.insert(
            channel.channel_id,
            CacheEntry {
                channel: channel.clone(),
                last_touched: now(),
            },
        );
    }

    /// Drop a cache entry.
    pub fn evict(&self, channel_id: ChannelId) {
        self.entries.remove(&channel_id);
    }

    /// Drop entries idle beyond the configured period.
    pub fn evict_idle(&self) {
        let cutoff = now() - self.idle_eviction;
        self.entries.retain(|_, entry| entry.last_touched >= cutoff);
    }

    /// Number of cached channels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photonx_common::{Address, ChannelStatus, U256};

    fn test_channel(status: ChannelStatus) -> Channel {
        Channel {
            channel_id: ChannelId::new(),
            trader: Address([0xAA; 20]),
            lp: Address([0xBB; 20]),
            tokens: vec![Address([0x01; 20])],
            nonce: 0,
            trader_balances: vec![U256::from(1u64)],
            lp_balances: vec![U256::from(1u64)],
            initial_deposits: vec![U256::from(2u64)],
            status,
            chain_id: 1,
            opened_at: now(),
            last_activity_at: now(),
            last_checkpoint_at: None,
            timeout_at: now() + Duration::hours(1),
            timed_out_at: None,
            last_message_timestamp: 0,
            last_state_hash: None,
            open_quotes: Default::default(),
            pending_request: None,
        }
    }

    #[test]
    fn test_store_and_get() {
        let cache = ChannelCache::new(3_600_000);
        let channel = test_channel(ChannelStatus::Active);
        cache.store(&channel);
        assert_eq!(
            cache.get(channel.channel_id).unwrap().channel_id,
            channel.channel_id
        );
        assert!(cache.get(ChannelId::new()).is_none());
    }

    #[test]
    fn test_terminal_records_are_evicted() {
        let cache = ChannelCache::new(3_600_000);
        let mut channel = test_channel(ChannelStatus::Active);
        cache.store(&channel);

        channel.status = ChannelStatus::Closed;
        cache.store(&channel);
        assert!(cache.get(channel.channel_id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_idle_eviction() {
        // Zero idle period: everything is instantly stale.
        let cache = ChannelCache::new(0);
        let channel = test_channel(ChannelStatus::Active);
        cache.store(&channel);
        std::thread::sleep(std::time::Duration::from_millis(5));
        cache.evict_idle();
        assert!(cache.is_empty());
    }
}
