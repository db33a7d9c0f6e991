//! Durable record types surrounding the channel record itself.

use serde::{Deserialize, Serialize};

use photonx_common::{Channel, ChannelId, Hash, Signature, Timestamp};
use photonx_protocol::{ChannelState, Message};

/// An archived entry of the append-only message log.
///
/// Only nonce-advancing messages enter the log — one entry per accepted
/// state — so `(channel_id, nonce)` is a unique key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLogEntry {
    /// Channel the message was applied to.
    pub channel_id: ChannelId,
    /// Nonce of the state the message produced.
    pub nonce: u64,
    /// The message as accepted.
    pub message: Message,
    /// When the entry was recorded.
    pub recorded_at: Timestamp,
}

/// A recorded dual-signed checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Channel the checkpoint belongs to.
    pub channel_id: ChannelId,
    /// Nonce of the attested state.
    pub nonce: u64,
    /// Typed-data hash of the attested state.
    pub state_hash: Hash,
    /// The attested state.
    pub state: ChannelState,
    /// Trader attestation.
    pub trader_signature: Signature,
    /// LP attestation.
    pub lp_signature: Signature,
    /// When the checkpoint was recorded.
    pub created_at: Timestamp,
    /// Whether the checkpoint went out in an on-chain batch.
    pub submitted: bool,
}

/// On-chain submission lifecycle of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Recorded, not yet handed to the submitter.
    Pending,
    /// Handed to the submitter, awaiting a receipt.
    Submitted,
    /// Confirmed on-chain.
    Confirmed,
    /// Submission failed; subject to retry.
    Failed,
}

/// A competing higher-nonce state staged during the dispute window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedState {
    /// The competing state.
    pub state: ChannelState,
    /// Trader attestation.
    pub trader_signature: Signature,
    /// LP attestation.
    pub lp_signature: Signature,
}

/// A recorded settlement and its submission lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Channel being settled.
    pub channel_id: ChannelId,
    /// The dual-signed final state.
    pub final_state: ChannelState,
    /// Trader attestation.
    pub trader_signature: Signature,
    /// LP attestation.
    pub lp_signature: Signature,
    /// Submission lifecycle status.
    pub status: SubmissionStatus,
    /// Submission attempts so far.
    pub attempts: u32,
    /// Competing state staged during the dispute window, if any.
    pub staged: Option<StagedState>,
    /// When the settlement was recorded.
    pub created_at: Timestamp,
    /// Last status change.
    pub updated_at: Timestamp,
}

/// A write set applied atomically by `transactional_put_many`.
#[derive(Debug, Clone, Default)]
pub struct StoreBatch {
    /// Updated channel record.
    pub channel: Option<Channel>,
    /// Message-log entry appended alongside the record.
    pub message: Option<MessageLogEntry>,
    /// Checkpoint recorded alongside the record.
    pub checkpoint: Option<CheckpointRecord>,
    /// Settlement recorded alongside the record.
    pub settlement: Option<SettlementRecord>,
}

impl StoreBatch {
    /// A batch holding only an updated channel record.
    pub fn channel(channel: Channel) -> Self {
        Self {
            channel: Some(channel),
            ..Self::default()
        }
    }

    /// A batch committing a new state together with the message that
    /// produced it.
    pub fn commit(channel: Channel, message: MessageLogEntry) -> Self {
        Self {
            channel: Some(channel),
            message: Some(message),
            ..Self::default()
        }
    }
}
