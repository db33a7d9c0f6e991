//! Coordinator configuration.

use photonx_common::{Address, PhotonXError, Result};
use photonx_protocol::ShapeLimits;

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Attempts before escalation.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling on the per-attempt delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
        }
    }
}

/// Checkpoint batching thresholds.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointConfig {
    /// Flush a batch once this many checkpoints are pending.
    pub batch_size: usize,
    /// Flush a batch once its oldest entry reaches this age.
    pub batch_max_age_ms: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            batch_max_age_ms: 60_000,
        }
    }
}

/// Main coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Node ID (must be unique within a cluster).
    pub node_id: Option<String>,
    /// Chain channels settle on.
    pub chain_id: u64,
    /// Settlement contract bound into the signing domain.
    pub verifying_contract: Address,
    /// Quote lifetime.
    pub quote_expiry_ms: u64,
    /// Expected heartbeat cadence.
    pub heartbeat_interval_ms: u64,
    /// Floor on requested channel timeouts.
    pub channel_timeout_floor_ms: u64,
    /// Grace period between timeout and expiry.
    pub dispute_window_ms: u64,
    /// Upper bound on requested slippage.
    pub max_slippage_bps: u16,
    /// Upper bound on LP fees.
    pub max_fee_bps: u16,
    /// Price precision denominator exponent (prices are quote units per
    /// 10^18 base units).
    pub price_precision_exp: u32,
    /// TTL on per-channel locks.
    pub lock_ttl_ms: u64,
    /// Accepted clock skew on message timestamps.
    pub message_skew_window_ms: u64,
    /// Idle period before cache eviction.
    pub cache_idle_eviction_ms: u64,
    /// In-flight bound per channel before `overloaded`.
    pub max_pending_per_channel: usize,
    /// Default deadline for inbound requests.
    pub request_deadline_ms: u64,
    /// Backoff for store operations.
    pub store_retry: RetryConfig,
    /// Backoff for settlement submissions.
    pub settlement_retry: RetryConfig,
    /// Checkpoint batching.
    pub checkpoint: CheckpointConfig,
    /// Cadence of the timeout sweeper.
    pub sweep_interval_ms: u64,
    /// Capacity of each subscriber's notification queue.
    pub subscriber_queue_depth: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            chain_id: 1,
            verifying_contract: Address::ZERO,
            quote_expiry_ms: 30_000,
            heartbeat_interval_ms: 10_000,
            channel_timeout_floor_ms: 3_600_000,
            dispute_window_ms: 86_400_000,
            max_slippage_bps: 1_000,
            max_fee_bps: 500,
            price_precision_exp: 18,
            lock_ttl_ms: 30_000,
            message_skew_window_ms: 30_000,
            cache_idle_eviction_ms: 3_600_000,
            max_pending_per_channel: 64,
            request_deadline_ms: 10_000,
            store_retry: RetryConfig::default(),
            settlement_retry: RetryConfig::default(),
            checkpoint: CheckpointConfig::default(),
            sweep_interval_ms: 1_000,
            subscriber_queue_depth: 256,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(node_id) = std::env::var("PHOTONX_NODE_ID") {
            config.node_id = Some(node_id);
        }
        if let Ok(chain_id) = std::env::var("PHOTONX_CHAIN_ID") {
            if let Ok(chain_id) = chain_id.parse() {
                config.chain_id = chain_id;
            }
        }
        if let Ok(contract) = std::env::var("PHOTONX_VERIFYING_CONTRACT") {
            if let Ok(contract) = contract.parse() {
                config.verifying_contract = contract;
            }
        }
        if let Ok(ttl) = std::env::var("PHOTONX_LOCK_TTL_MS") {
            if let Ok(ttl) = ttl.parse() {
                config.lock_ttl_ms = ttl;
            }
        }
        if let Ok(skew) = std::env::var("PHOTONX_MESSAGE_SKEW_WINDOW_MS") {
            if let Ok(skew) = skew.parse() {
                config.message_skew_window_ms = skew;
            }
        }

        config
    }

    /// Validate the configuration. Fatal at startup on failure.
    pub fn validate(&self) -> Result<()> {
        if self.verifying_contract.is_zero() {
            return Err(PhotonXError::Config(
                "verifying contract must be set".to_string(),
            ));
        }
        if self.price_precision_exp != 18 {
            return Err(PhotonXError::Config(
                "price precision is fixed at 10^18".to_string(),
            ));
        }
        if self.lock_ttl_ms == 0 || self.request_deadline_ms == 0 {
            return Err(PhotonXError::Config(
                "lock TTL and request deadline must be positive".to_string(),
            ));
        }
        if self.max_pending_per_channel == 0 {
            return Err(PhotonXError::Config(
                "per-channel queue bound must be positive".to_string(),
            ));
        }
        if self.checkpoint.batch_size == 0 {
            return Err(PhotonXError::Config(
                "checkpoint batch size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Shape-validation limits derived from this configuration.
    pub fn shape_limits(&self) -> ShapeLimits {
        ShapeLimits {
            max_slippage_bps: self.max_slippage_bps,
            max_fee_bps: self.max_fee_bps,
            quote_expiry_ms: self.quote_expiry_ms,
        }
    }
}
