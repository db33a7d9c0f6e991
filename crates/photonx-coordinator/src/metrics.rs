//! Metrics collection for coordinator monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Coordinator metrics.
pub struct Metrics {
    /// Messages accepted and committed.
    pub messages_accepted: AtomicU64,
    /// Messages rejected at any validation stage.
    pub messages_rejected: AtomicU64,
    /// Channels opened.
    pub channels_opened: AtomicU64,
    /// Channels closed (settlement confirmed).
    pub channels_closed: AtomicU64,
    /// Channels marked disputed.
    pub channels_disputed: AtomicU64,
    /// Channels that hit their timeout.
    pub channels_timed_out: AtomicU64,
    /// Checkpoints recorded.
    pub checkpoints_recorded: AtomicU64,
    /// Checkpoint batches handed to the submitter.
    pub checkpoint_batches_submitted: AtomicU64,
    /// Settlement jobs handed to the submitter.
    pub settlements_submitted: AtomicU64,
    /// Settlements confirmed on-chain.
    pub settlements_confirmed: AtomicU64,
    /// Settlement submissions that failed.
    pub settlements_failed: AtomicU64,
    /// Lock acquisitions that lost to another holder.
    pub locks_contended: AtomicU64,
    /// Broadcast events delivered to subscribers.
    pub broadcasts_sent: AtomicU64,
}

impl Metrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            messages_accepted: AtomicU64::new(0),
            messages_rejected: AtomicU64::new(0),
            channels_opened: AtomicU64::new(0),
            channels_closed: AtomicU64::new(0),
            channels_disputed: AtomicU64::new(0),
            channels_timed_out: AtomicU64::new(0),
            checkpoints_recorded: AtomicU64::new(0),
            checkpoint_batches_submitted: AtomicU64::new(0),
            settlements_submitted: AtomicU64::new(0),
            settlements_confirmed: AtomicU64::new(0),
            settlements_failed: AtomicU64::new(0),
            locks_contended: AtomicU64::new(0),
            broadcasts_sent: AtomicU64::new(0),
        }
    }

    /// Record an accepted message.
    pub fn message_accepted(&self) {
        self.messages_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected message.
    pub fn message_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an opened channel.
    pub fn channel_opened(&self) {
        self.channels_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed channel.
    pub fn channel_closed(&self) {
        self.channels_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a disputed channel.
    pub fn channel_disputed(&self) {
        self.channels_disputed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a timed-out channel.
    pub fn channel_timed_out(&self) {
        self.channels_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a checkpoint.
    pub fn checkpoint_recorded(&self) {
        self.checkpoints_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a checkpoint batch handoff.
    pub fn checkpoint_batch_submitted(&self) {
        self.checkpoint_batches_submitted
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a settlement handoff.
    pub fn settlement_submitted(&self) {
        self.settlements_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a confirmed settlement.
    pub fn settlement_confirmed(&self) {
        self.settlements_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed settlement submission.
    pub fn settlement_failed(&self) {
        self.settlements_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record lock contention.
    pub fn lock_contended(&self) {
        self.locks_contended.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a broadcast delivery.
    pub fn broadcast_sent(&self) {
        self.broadcasts_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a consistent snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_accepted: self.messages_accepted.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            channels_opened: self.channels_opened.load(Ordering::Relaxed),
            channels_closed: self.channels_closed.load(Ordering::Relaxed),
            channels_disputed: self.channels_disputed.load(Ordering::Relaxed),
            channels_timed_out: self.channels_timed_out.load(Ordering::Relaxed),
            checkpoints_recorded: self.checkpoints_recorded.load(Ordering::Relaxed),
            checkpoint_batches_submitted: self.checkpoint_batches_submitted.load(Ordering::Relaxed),
            settlements_submitted: self.settlements_submitted.load(Ordering::Relaxed),
            settlements_confirmed: self.settlements_confirmed.load(Ordering::Relaxed),
            settlements_failed: self.settlements_failed.load(Ordering::Relaxed),
            locks_contended: self.locks_contended.load(Ordering::Relaxed),
            broadcasts_sent: self.broadcasts_sent.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::with_capacity(1024);
        for (name, help, value) in [
            (
                "photonx_messages_accepted",
                "Messages accepted and committed",
                s.messages_accepted,
            ),
            (
                "photonx_messages_rejected",
                "Messages rejected during validation",
                s.messages_rejected,
            ),
            ("photonx_channels_opened", "Channels opened", s.channels_opened),
            ("photonx_channels_closed", "Channels closed", s.channels_closed),
            (
                "photonx_channels_disputed",
                "Channels marked disputed",
                s.channels_disputed,
            ),
            (
                "photonx_channels_timed_out",
                "Channels that hit their timeout",
                s.channels_timed_out,
            ),
            (
                "photonx_checkpoints_recorded",
                "Checkpoints recorded",
                s.checkpoints_recorded,
            ),
            (
                "photonx_checkpoint_batches_submitted",
                "Checkpoint batches handed to the submitter",
                s.checkpoint_batches_submitted,
            ),
            (
                "photonx_settlements_submitted",
                "Settlement jobs handed to the submitter",
                s.settlements_submitted,
            ),
            (
                "photonx_settlements_confirmed",
                "Settlements confirmed on-chain",
                s.settlements_confirmed,
            ),
            (
                "photonx_settlements_failed",
                "Settlement submissions that failed",
                s.settlements_failed,
            ),
            (
                "photonx_locks_contended",
                "Lock acquisitions that lost to another holder",
                s.locks_contended,
            ),
            (
                "photonx_broadcasts_sent",
                "Broadcast events delivered to subscribers",
                s.broadcasts_sent,
            ),
        ] {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub messages_accepted: u64,
    pub messages_rejected: u64,
    pub channels_opened: u64,
    pub channels_closed: u64,
    pub channels_disputed: u64,
    pub channels_timed_out: u64,
    pub checkpoints_recorded: u64,
    pub checkpoint_batches_submitted: u64,
    pub settlements_submitted: u64,
    pub settlements_confirmed: u64,
    pub settlements_failed: u64,
    pub locks_contended: u64,
    pub broadcasts_sent: u64,
}
