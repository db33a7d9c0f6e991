//! PhotonX Coordinator
//!
//! The off-chain state-channel coordinator for a gasless RFQ exchange.
//! Traders and liquidity providers exchange signed quote/fill traffic
//! over bilateral channels; the coordinator routes and orders the
//! messages, enforces the state-machine invariants, detects
//! misbehaviour, and drives checkpointing and settlement. It attests
//! and orders — it is not a custodian and does not price trades.

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod machine;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod settlement;
pub mod sweeper;

pub use broadcast::{Broadcaster, ChannelEvent};
pub use config::{CheckpointConfig, CoordinatorConfig, RetryConfig};
pub use coordinator::{Coordinator, RunState};
pub use machine::{ChannelStateMachine, OpenChannelParams};
pub use metrics::{Metrics, MetricsSnapshot};
pub use pipeline::MessagePipeline;
pub use settlement::{DisputeResolution, SettlementDriver, SubmissionReceipt, Submitter};
pub use sweeper::TimeoutSweeper;
