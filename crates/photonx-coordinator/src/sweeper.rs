//! Timeout sweeper.
//!
//! Background loop that marks channels timed out once their deadline
//! passes, promotes timed-out channels to expired after the dispute
//! window, and evicts idle cache entries.

use std::sync::Arc;

use tracing::{info, warn};

use photonx_common::{now, ChannelStatus, Deadline, Result};
use photonx_store::ChannelStore;

use crate::cache::ChannelCache;
use crate::config::CoordinatorConfig;
use crate::metrics::SharedMetrics;
use crate::pipeline::MessagePipeline;

/// Periodic timeout and eviction maintenance.
pub struct TimeoutSweeper {
    store: Arc<dyn ChannelStore>,
    pipeline: Arc<MessagePipeline>,
    cache: Arc<ChannelCache>,
    metrics: SharedMetrics,
    config: CoordinatorConfig,
}

impl TimeoutSweeper {
    /// Wire up the sweeper.
    pub fn new(
        store: Arc<dyn ChannelStore>,
        pipeline: Arc<MessagePipeline>,
        cache: Arc<ChannelCache>,
        metrics: SharedMetrics,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            cache,
            metrics,
            config,
        }
    }

    /// One maintenance pass over all live channels.
    pub async fn sweep_once(&self) -> Result<()> {
        let at = now();
        for channel_id in self.store.non_terminal_channels().await? {
            let channel = match self.store.get(channel_id).await? {
                Some(channel) => channel,
                None => continue,
            };

            // Flag channels whose heartbeats stopped well before the
            // timeout fires.
            if channel.status.accepts_heartbeat() {
                let silent_ms = (at - channel.last_activity_at).num_milliseconds().max(0) as u64;
                if silent_ms > 3 * self.config.heartbeat_interval_ms {
                    warn!(
                        channel_id = %channel_id,
                        silent_ms,
                        "No activity on channel for several heartbeat intervals"
                    );
                }
            }

            match channel.status {
                ChannelStatus::Active | ChannelStatus::Checkpointing
                    if at >= channel.timeout_at =>
                {
                    let result = self
                        .pipeline
                        .transition(
                            channel_id,
                            Deadline::after_millis(self.config.lock_ttl_ms, "timeout sweep"),
                            |machine, channel| machine.mark_timed_out(channel, at),
                        )
                        .await;
                    match result {
                        Ok(_) => {
                            self.metrics.channel_timed_out();
                            info!(channel_id = %channel_id, "Channel timed out");
                        }
                        Err(err) => {
                            warn!(channel_id = %channel_id, error = %err, "Timeout sweep failed")
                        }
                    }
                }
                ChannelStatus::TimedOut => {
                    let dispute_window_ms = self.config.dispute_window_ms;
                    let result = self
                        .pipeline
                        .transition(
                            channel_id,
                            Deadline::after_millis(self.config.lock_ttl_ms, "expiry sweep"),
                            |machine, channel| {
                                machine.promote_expired(channel, at, dispute_window_ms)
                            },
                        )
                        .await;
                    if let Ok(expired) = result {
                        self.cache.evict(expired.channel_id);
                        info!(channel_id = %channel_id, "Channel expired after grace period");
                    }
                }
                _ => {}
            }
        }

        self.cache.evict_idle();
        Ok(())
    }

    /// Run the maintenance loop until the task is dropped.
    pub async fn run_loop(&self) {
        let interval = std::time::Duration::from_millis(self.config.sweep_interval_ms);
        loop {
            tokio::time::sleep(interval).await;
            if let Err(err) = self.sweep_once().await {
                warn!(error = %err, "Sweep pass failed");
            }
        }
    }
}
