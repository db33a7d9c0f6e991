//! Error types for the PhotonX coordinator.

use crate::{Address, ChannelId, ChannelStatus, QuoteId};
use thiserror::Error;

/// Main error type for coordinator operations.
///
/// Every rejection surfaced at the transport boundary carries the channel
/// id and, where applicable, the failing nonce.
#[derive(Error, Debug, Clone)]
pub enum PhotonXError {
    /// Malformed message: required field missing or unparseable.
    #[error("invalid message: {message}")]
    Shape {
        message: String,
        field: Option<String>,
    },

    /// A numeric field is outside its allowed range.
    #[error("{field} out of range: {message}")]
    Range { field: &'static str, message: String },

    /// Nonce claim is not greater than the current channel nonce.
    #[error("channel {channel_id}: stale nonce {nonce}, current is {current}")]
    StaleNonce {
        channel_id: ChannelId,
        nonce: u64,
        current: u64,
    },

    /// Message timestamp is outside the skew window or not monotonic.
    #[error("channel {channel_id}: stale timestamp {timestamp}")]
    StaleTimestamp {
        channel_id: ChannelId,
        timestamp: u64,
    },

    /// Signature recovery failed or the recovered signer does not match
    /// the claimed submitter.
    #[error("channel {channel_id}: bad signature")]
    BadSignature { channel_id: ChannelId },

    /// The signer is not a participant of the channel, or signed for the
    /// wrong role.
    #[error("channel {channel_id}: {address} is not a participant")]
    NotParticipant {
        channel_id: ChannelId,
        address: Address,
    },

    /// The channel status does not accept this operation.
    #[error("channel {channel_id} is {status:?}, operation not accepted")]
    WrongStatus {
        channel_id: ChannelId,
        status: ChannelStatus,
    },

    /// Channel does not exist.
    #[error("channel {channel_id} not found")]
    NotFound { channel_id: ChannelId },

    /// Referenced quote does not exist.
    #[error("channel {channel_id}: quote {quote_id} not found")]
    QuoteNotFound {
        channel_id: ChannelId,
        quote_id: QuoteId,
    },

    /// Referenced quote has expired.
    #[error("channel {channel_id}: quote {quote_id} expired")]
    QuoteExpired {
        channel_id: ChannelId,
        quote_id: QuoteId,
    },

    /// Referenced quote was already filled.
    #[error("channel {channel_id}: quote {quote_id} already filled")]
    AlreadyFilled {
        channel_id: ChannelId,
        quote_id: QuoteId,
    },

    /// A balance debit would underflow.
    #[error("channel {channel_id}: insufficient balance of {token}")]
    InsufficientBalance {
        channel_id: ChannelId,
        token: Address,
    },

    /// Trader and LP must be distinct addresses.
    #[error("trader and lp must be distinct participants")]
    InvalidParticipant,

    /// A channel cannot be opened with a zero deposit.
    #[error("zero deposit for token {token}")]
    InvalidDeposit { token: Address },

    /// Requested channel timeout is below the configured floor.
    #[error("timeout {requested_ms}ms below floor {floor_ms}ms")]
    TimeoutTooShort { requested_ms: u64, floor_ms: u64 },

    /// A state-machine invariant would be violated.
    #[error("channel {channel_id}: invariant violation: {message}")]
    InvariantViolation {
        channel_id: ChannelId,
        message: String,
    },

    /// The per-channel lock could not be acquired before the deadline.
    #[error("channel {channel_id}: lock unavailable")]
    LockUnavailable { channel_id: ChannelId },

    /// The per-channel inbound queue is full.
    #[error("channel {channel_id}: coordinator overloaded")]
    Overloaded { channel_id: ChannelId },

    /// The coordinator is not accepting requests.
    #[error("coordinator is not accepting requests")]
    Unavailable,

    /// An operation exceeded its deadline.
    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(String),

    /// The message log already holds an entry at this (channel, nonce).
    #[error("channel {channel_id}: duplicate log entry at nonce {nonce}")]
    DuplicateEntry { channel_id: ChannelId, nonce: u64 },

    /// Invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unrecoverable per-channel failure: corrupt record, domain mismatch.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl PhotonXError {
    /// Check if this error is transient and the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PhotonXError::LockUnavailable { .. }
                | PhotonXError::Overloaded { .. }
                | PhotonXError::Unavailable
                | PhotonXError::Timeout { .. }
                | PhotonXError::Store(_)
        )
    }

    /// Stable error kind for structured responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PhotonXError::Shape { .. } => "shape",
            PhotonXError::Range { .. } => "range",
            PhotonXError::StaleNonce { .. } => "stale_nonce",
            PhotonXError::StaleTimestamp { .. } => "stale_timestamp",
            PhotonXError::BadSignature { .. } => "bad_signature",
            PhotonXError::NotParticipant { .. } => "not_participant",
            PhotonXError::WrongStatus { .. } => "wrong_status",
            PhotonXError::NotFound { .. } => "not_found",
            PhotonXError::QuoteNotFound { .. } => "quote_not_found",
            PhotonXError::QuoteExpired { .. } => "quote_expired",
            PhotonXError::AlreadyFilled { .. } => "already_filled",
            PhotonXError::InsufficientBalance { .. } => "insufficient_balance",
            PhotonXError::InvalidParticipant => "invalid_participant",
            PhotonXError::InvalidDeposit { .. } => "invalid_deposit",
            PhotonXError::TimeoutTooShort { .. } => "timeout_too_short",
            PhotonXError::InvariantViolation { .. } => "invariant_violation",
            PhotonXError::LockUnavailable { .. } => "lock_unavailable",
            PhotonXError::Overloaded { .. } => "overloaded",
            PhotonXError::Unavailable => "unavailable",
            PhotonXError::Timeout { .. } => "timeout",
            PhotonXError::Store(_) => "store",
            PhotonXError::DuplicateEntry { .. } => "duplicate_entry",
            PhotonXError::Config(_) => "config",
            PhotonXError::Fatal(_) => "fatal",
        }
    }

    /// Check if this error aborts the affected channel rather than a
    /// single request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PhotonXError::Config(_) | PhotonXError::Fatal(_))
    }
}

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, PhotonXError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let id = ChannelId::new();
        let err = PhotonXError::StaleNonce {
            channel_id: id,
            nonce: 1,
            current: 3,
        };
        assert_eq!(err.kind(), "stale_nonce");
        assert!(!err.is_retryable());

        let err = PhotonXError::LockUnavailable { channel_id: id };
        assert_eq!(err.kind(), "lock_unavailable");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_message_carries_channel_id() {
        let id = ChannelId::new();
        let err = PhotonXError::NotFound { channel_id: id };
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(PhotonXError::Fatal("corrupt record".into()).is_fatal());
        assert!(!PhotonXError::Store("io".into()).is_fatal());
    }
}
