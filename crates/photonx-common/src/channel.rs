//! Channel record and status state machine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Address, ChannelId, Hash, PhotonXError, QuoteId, Result, Timestamp, U256};

/// Trade side, from the trader's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Trader buys base token, pays quote token.
    Buy,
    /// Trader sells base token, receives quote token.
    Sell,
}

impl Side {
    /// Wire tag for typed-data encoding.
    pub fn as_u8(&self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }
}

/// Channel lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Channel record created, deposits being recorded.
    Opening,
    /// Accepting trading messages.
    Active,
    /// A dual-signed checkpoint is being recorded.
    Checkpointing,
    /// A dual-signed final state is awaiting on-chain confirmation.
    Settling,
    /// Final state confirmed on-chain.
    Closed,
    /// Frozen pending operator resolution.
    Disputed,
    /// Timeout elapsed without settlement.
    TimedOut,
    /// Grace period after timeout elapsed; channel is immutable.
    Expired,
}

impl ChannelStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelStatus::Closed | ChannelStatus::Expired)
    }

    /// Check if trading messages are accepted in this state.
    pub fn accepts_trading(&self) -> bool {
        matches!(self, ChannelStatus::Active)
    }

    /// Check if heartbeats are accepted in this state.
    pub fn accepts_heartbeat(&self) -> bool {
        matches!(self, ChannelStatus::Active | ChannelStatus::Checkpointing)
    }

    /// Get valid next states from the current state.
    ///
    /// `Checkpointing -> Active` is the only transition that revisits a
    /// prior state.
    pub fn valid_transitions(&self) -> &[ChannelStatus] {
        match self {
            ChannelStatus::Opening => &[ChannelStatus::Active],
            ChannelStatus::Active => &[
                ChannelStatus::Checkpointing,
                ChannelStatus::Settling,
                ChannelStatus::Disputed,
                ChannelStatus::TimedOut,
            ],
            ChannelStatus::Checkpointing => &[
                ChannelStatus::Active,
                ChannelStatus::Settling,
                ChannelStatus::Disputed,
                ChannelStatus::TimedOut,
            ],
            ChannelStatus::Settling => &[ChannelStatus::Closed, ChannelStatus::Disputed],
            ChannelStatus::Disputed => &[ChannelStatus::Settling],
            ChannelStatus::TimedOut => &[ChannelStatus::Expired],
            ChannelStatus::Closed => &[],
            ChannelStatus::Expired => &[],
        }
    }

    /// Check if a transition to the given state is valid.
    pub fn can_transition_to(&self, next: ChannelStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// The quote request awaiting an LP answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Nonce the request advanced the channel to.
    pub nonce: u64,
    /// Requested trade side.
    pub side: Side,
    /// Requested base token.
    pub base_token: Address,
    /// Requested quote token.
    pub quote_token: Address,
    /// Requested quantity of base token.
    pub quantity: U256,
    /// Requested slippage bound.
    pub max_slippage_bps: u16,
}

/// A quote offered by the LP and still actionable by the trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenQuote {
    /// Quote identifier.
    pub quote_id: QuoteId,
    /// Nonce of the quote request this answers.
    pub request_nonce: u64,
    /// Trade side of the originating request.
    pub side: Side,
    /// Base token of the originating request.
    pub base_token: Address,
    /// Quote token of the originating request.
    pub quote_token: Address,
    /// Offered price, in quote units per 10^18 base units.
    pub price: U256,
    /// Offered quantity of base token.
    pub quantity: U256,
    /// Epoch-millisecond expiry.
    pub expiry_timestamp: u64,
    /// LP fee in basis points.
    pub lp_fee_bps: u16,
    /// Set once a fill consumed this quote.
    pub filled: bool,
}

impl OpenQuote {
    /// Check if the quote has expired relative to a wire timestamp.
    pub fn is_expired_at(&self, timestamp_ms: u64) -> bool {
        timestamp_ms > self.expiry_timestamp
    }
}

/// The authoritative per-channel record.
///
/// Exactly one in-memory copy is authoritative while the channel is
/// loaded; the store owns the durable copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Unique channel identifier.
    pub channel_id: ChannelId,
    /// Trader address.
    pub trader: Address,
    /// Liquidity provider address.
    pub lp: Address,
    /// Ordered token list; balance vectors are parallel to it.
    pub tokens: Vec<Address>,
    /// Strictly monotonic state counter.
    pub nonce: u64,
    /// Trader balance per token.
    pub trader_balances: Vec<U256>,
    /// LP balance per token.
    pub lp_balances: Vec<U256>,
    /// Sum of both initial deposits per token, for conservation checks.
    pub initial_deposits: Vec<U256>,
    /// Lifecycle status.
    pub status: ChannelStatus,
    /// Chain the channel settles on.
    pub chain_id: u64,
    /// When the channel was opened.
    pub opened_at: Timestamp,
    /// Last accepted message (including heartbeats).
    pub last_activity_at: Timestamp,
    /// Last committed checkpoint.
    pub last_checkpoint_at: Option<Timestamp>,
    /// Instant past which the channel times out.
    pub timeout_at: Timestamp,
    /// When the timeout was recorded, for grace-period promotion.
    pub timed_out_at: Option<Timestamp>,
    /// Highest wire timestamp accepted so far.
    pub last_message_timestamp: u64,
    /// Hash of the last dual-signed state.
    pub last_state_hash: Option<Hash>,
    /// Quotes offered and not yet filled, cancelled, or expired.
    pub open_quotes: HashMap<QuoteId, OpenQuote>,
    /// The quote request awaiting an answer, if any.
    pub pending_request: Option<PendingRequest>,
}

impl Channel {
    /// Check whether an address is one of the two participants.
    pub fn is_participant(&self, address: Address) -> bool {
        address == self.trader || address == self.lp
    }

    /// Index of a token in the channel's token list.
    pub fn token_index(&self, token: Address) -> Option<usize> {
        self.tokens.iter().position(|t| *t == token)
    }

    /// Transition to a new status, enforcing the transition table.
    pub fn transition_to(&mut self, next: ChannelStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(PhotonXError::WrongStatus {
                channel_id: self.channel_id,
                status: self.status,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Credit a participant's balance for one token.
    pub fn credit(&mut self, trader_side: bool, token_idx: usize, amount: U256) -> Result<()> {
        let channel_id = self.channel_id;
        let token = self.tokens[token_idx];
        let balances = if trader_side {
            &mut self.trader_balances
        } else {
            &mut self.lp_balances
        };
        balances[token_idx] = balances[token_idx].checked_add(amount).ok_or_else(|| {
            PhotonXError::InvariantViolation {
                channel_id,
                message: format!("balance overflow on token {}", token),
            }
        })?;
        Ok(())
    }

    /// Debit a participant's balance for one token. Underflow is an
    /// insufficient-balance rejection, not a state change.
    pub fn debit(&mut self, trader_side: bool, token_idx: usize, amount: U256) -> Result<()> {
        let token = self.tokens[token_idx];
        let balances = if trader_side {
            &mut self.trader_balances
        } else {
            &mut self.lp_balances
        };
        balances[token_idx] =
            balances[token_idx]
                .checked_sub(amount)
                .ok_or(PhotonXError::InsufficientBalance {
                    channel_id: self.channel_id,
                    token,
                })?;
        Ok(())
    }

    /// Check the conservation invariant: per token, trader + lp balances
    /// equal the recorded initial deposits.
    pub fn conservation_holds(&self) -> bool {
        self.tokens.len() == self.trader_balances.len()
            && self.tokens.len() == self.lp_balances.len()
            && self.tokens.len() == self.initial_deposits.len()
            && (0..self.tokens.len()).all(|i| {
                self.trader_balances[i]
                    .checked_add(self.lp_balances[i])
                    .map(|sum| sum == self.initial_deposits[i])
                    .unwrap_or(false)
            })
    }

    /// Drop quotes whose expiry is behind the given wire timestamp.
    pub fn prune_expired_quotes(&mut self, timestamp_ms: u64) {
        self.open_quotes
            .retain(|_, q| !q.is_expired_at(timestamp_ms) && !q.filled);
    }
}
