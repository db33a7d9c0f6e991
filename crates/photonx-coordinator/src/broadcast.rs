//! Outbound notification fan-out.
//!
//! After a commit the pipeline publishes the new state and the accepted
//! message to every subscriber registered for either participant. Each
//! subscriber has its own bounded queue, so delivery is FIFO per channel
//! per subscriber. Delivery is at-least-once; consumers deduplicate by
//! `(channel_id, nonce)`.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;

use photonx_common::{Address, ChannelId};
use photonx_protocol::{ChannelState, Message};

use crate::metrics::SharedMetrics;

/// A committed transition as seen by subscribers.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    /// Channel the transition happened on.
    pub channel_id: ChannelId,
    /// Nonce of the new state.
    pub nonce: u64,
    /// The new state.
    pub state: ChannelState,
    /// The message that produced it.
    pub message: Message,
}

/// Per-participant subscriber registry.
pub struct Broadcaster {
    subscribers: DashMap<Address, Vec<mpsc::Sender<ChannelEvent>>>,
    queue_depth: usize,
    metrics: SharedMetrics,
}

impl Broadcaster {
    /// Create a broadcaster with the given per-subscriber queue depth.
    pub fn new(queue_depth: usize, metrics: SharedMetrics) -> Self {
        Self {
            subscribers: DashMap::new(),
            queue_depth,
            metrics,
        }
    }

    /// Register a subscriber for a participant's channels.
    pub fn subscribe(&self, participant: Address) -> mpsc::Receiver<ChannelEvent> {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        self.subscribers.entry(participant).or_default().push(tx);
        rx
    }

    /// Publish an event to the subscribers of both participants.
    ///
    /// A full subscriber queue drops this delivery for that subscriber;
    /// downstream consumers recover via their idempotency keys.
    pub fn publish(&self, trader: Address, lp: Address, event: &ChannelEvent) {
        for participant in [trader, lp] {
            if let Some(mut senders) = self.subscribers.get_mut(&participant) {
                senders.retain(|tx| !tx.is_closed());
                for tx in senders.iter() {
                    match tx.try_send(event.clone()) {
                        Ok(()) => self.metrics.broadcast_sent(),
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!(
                                channel_id = %event.channel_id,
                                participant = %participant,
                                "Subscriber queue full, dropping delivery"
                            );
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {}
                    }
                }
            }
        }
    }

    /// Count of live subscribers for a participant.
    pub fn subscriber_count(&self, participant: Address) -> usize {
        self.subscribers
            .get(&participant)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use photonx_common::Signature;
    use photonx_protocol::Heartbeat;
    use std::sync::Arc;

    fn event(channel_id: ChannelId, nonce: u64) -> ChannelEvent {
        ChannelEvent {
            channel_id,
            nonce,
            state: ChannelState {
                channel_id,
                nonce,
                trader: Address([0xAA; 20]),
                lp: Address([0xBB; 20]),
                trader_balances: vec![],
                lp_balances: vec![],
                timestamp: 1,
                chain_id: 1,
            },
            message: Message::Heartbeat(Heartbeat {
                channel_id,
                nonce,
                timestamp: 1,
                sender: Address([0xAA; 20]),
                signature: Signature::default(),
            }),
        }
    }

    #[tokio::test]
    async fn test_both_participants_receive() {
        let broadcaster = Broadcaster::new(8, Arc::new(Metrics::new()));
        let trader = Address([0xAA; 20]);
        let lp = Address([0xBB; 20]);
        let mut trader_rx = broadcaster.subscribe(trader);
        let mut lp_rx = broadcaster.subscribe(lp);

        let id = ChannelId::new();
        broadcaster.publish(trader, lp, &event(id, 1));

        assert_eq!(trader_rx.recv().await.unwrap().nonce, 1);
        assert_eq!(lp_rx.recv().await.unwrap().nonce, 1);
    }

    #[tokio::test]
    async fn test_per_channel_order_preserved() {
        let broadcaster = Broadcaster::new(8, Arc::new(Metrics::new()));
        let trader = Address([0xAA; 20]);
        let mut rx = broadcaster.subscribe(trader);

        let id = ChannelId::new();
        for nonce in 1..=3 {
            broadcaster.publish(trader, Address([0xBB; 20]), &event(id, nonce));
        }
        for expected in 1..=3 {
            assert_eq!(rx.recv().await.unwrap().nonce, expected);
        }
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let broadcaster = Broadcaster::new(8, Arc::new(Metrics::new()));
        let trader = Address([0xAA; 20]);
        let rx = broadcaster.subscribe(trader);
        assert_eq!(broadcaster.subscriber_count(trader), 1);

        drop(rx);
        broadcaster.publish(trader, Address([0xBB; 20]), &event(ChannelId::new(), 1));
        assert_eq!(broadcaster.subscriber_count(trader), 0);
    }
}
