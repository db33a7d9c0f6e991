//! Channel state machine.
//!
//! Holds the validation and transition logic for a single channel. Every
//! operation takes the current record and returns the successor record;
//! a rejection leaves the input untouched, so callers can surface the
//! error with no rollback. The pipeline guarantees exclusive access per
//! channel while these run.

use tracing::debug;

use photonx_common::{
    now, quote_cost, Address, Channel, ChannelId, ChannelStatus, OpenQuote, PendingRequest,
    PhotonXError, Result, Side, Timestamp, U256,
};
use photonx_crypto::{recover_signer, DomainSeparator};
use photonx_protocol::{
    ChannelState, CheckpointRequest, Fill, Message, Quote, QuoteRequest, SettlementRequest,
};
use photonx_store::{CheckpointRecord, SettlementRecord, SubmissionStatus};

/// Parameters for opening a channel.
#[derive(Debug, Clone)]
pub struct OpenChannelParams {
    /// Trader address.
    pub trader: Address,
    /// Liquidity provider address.
    pub lp: Address,
    /// Tokens held in the channel.
    pub tokens: Vec<Address>,
    /// Trader deposit per token, parallel to `tokens`.
    pub trader_deposits: Vec<U256>,
    /// LP deposit per token, parallel to `tokens`.
    pub lp_deposits: Vec<U256>,
    /// Requested channel timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Per-channel validation and transition logic.
pub struct ChannelStateMachine {
    domain: DomainSeparator,
    skew_window_ms: u64,
    timeout_floor_ms: u64,
}

impl ChannelStateMachine {
    /// Create a state machine bound to a signing domain.
    pub fn new(domain: DomainSeparator, skew_window_ms: u64, timeout_floor_ms: u64) -> Self {
        Self {
            domain,
            skew_window_ms,
            timeout_floor_ms,
        }
    }

    /// The signing domain transitions are verified against.
    pub fn domain(&self) -> &DomainSeparator {
        &self.domain
    }

    /// Open a channel: validate participants, deposits, and timeout, and
    /// produce the initial active record.
    pub fn open(&self, params: OpenChannelParams, opened_at: Timestamp) -> Result<Channel> {
        if params.trader == params.lp {
            return Err(PhotonXError::InvalidParticipant);
        }
        if params.tokens.is_empty()
            || params.tokens.len() != params.trader_deposits.len()
            || params.tokens.len() != params.lp_deposits.len()
        {
            return Err(PhotonXError::Shape {
                message: "deposit vectors must be parallel to the token list".to_string(),
                field: Some("tokens".to_string()),
            });
        }
        if params.timeout_ms < self.timeout_floor_ms {
            return Err(PhotonXError::TimeoutTooShort {
                requested_ms: params.timeout_ms,
                floor_ms: self.timeout_floor_ms,
            });
        }

        let mut initial_deposits = Vec::with_capacity(params.tokens.len());
        for (i, token) in params.tokens.iter().enumerate() {
            let total = params.trader_deposits[i]
                .checked_add(params.lp_deposits[i])
                .ok_or_else(|| PhotonXError::Range {
                    field: "deposits",
                    message: format!("deposit overflow for token {}", token),
                })?;
            if total.is_zero() {
                return Err(PhotonXError::InvalidDeposit { token: *token });
            }
            initial_deposits.push(total);
        }

        let mut channel = Channel {
            channel_id: ChannelId::new(),
            trader: params.trader,
            lp: params.lp,
            tokens: params.tokens,
            nonce: 0,
            trader_balances: params.trader_deposits,
            lp_balances: params.lp_deposits,
            initial_deposits,
            status: ChannelStatus::Opening,
            chain_id: self.domain.chain_id,
            opened_at,
            last_activity_at: opened_at,
            last_checkpoint_at: None,
            timeout_at: opened_at + chrono::Duration::milliseconds(params.timeout_ms as i64),
            timed_out_at: None,
            last_message_timestamp: 0,
            last_state_hash: None,
            open_quotes: Default::default(),
            pending_request: None,
        };
        channel.transition_to(ChannelStatus::Active)?;
        Ok(channel)
    }

    /// Apply a validated message, producing the successor state.
    ///
    /// Runs validation stages 2–6: status, participant role, signature,
    /// ordering, and semantics, in that order. The input record is never
    /// mutated; errors leave no trace.
    pub fn apply_message(&self, channel: &Channel, msg: &Message, now_ms: u64) -> Result<Channel> {
        // Stage 2: status.
        let status_ok = match msg {
            Message::Heartbeat(_) => channel.status.accepts_heartbeat(),
            _ => channel.status.accepts_trading(),
        };
        if !status_ok {
            return Err(PhotonXError::WrongStatus {
                channel_id: channel.channel_id,
                status: channel.status,
            });
        }

        // Stage 3: the claimed submitter must hold the role the variant
        // requires.
        let submitter = msg.submitter();
        let expected_role = match msg {
            Message::Quote(_) => channel.lp,
            Message::Heartbeat(_) => {
                if !channel.is_participant(submitter) {
                    return Err(PhotonXError::NotParticipant {
                        channel_id: channel.channel_id,
                        address: submitter,
                    });
                }
                submitter
            }
            _ => channel.trader,
        };
        if submitter != expected_role {
            return Err(PhotonXError::NotParticipant {
                channel_id: channel.channel_id,
                address: submitter,
            });
        }
        if let Message::Fill(fill) = msg {
            if fill.lp != channel.lp {
                return Err(PhotonXError::NotParticipant {
                    channel_id: channel.channel_id,
                    address: fill.lp,
                });
            }
        }

        // Stage 4: signatures recover to the claimed parties.
        let digest = msg.signing_digest(&self.domain);
        let recovered = recover_signer(digest, msg.signature())
            .map_err(|_| PhotonXError::BadSignature {
                channel_id: channel.channel_id,
            })?;
        if recovered != submitter {
            return Err(PhotonXError::BadSignature {
                channel_id: channel.channel_id,
            });
        }
        if let Message::Fill(fill) = msg {
            let lp_signer = recover_signer(digest, &fill.lp_signature).map_err(|_| {
                PhotonXError::BadSignature {
                    channel_id: channel.channel_id,
                }
            })?;
            if lp_signer != channel.lp {
                return Err(PhotonXError::BadSignature {
                    channel_id: channel.channel_id,
                });
            }
        }

        // Stage 5: ordering. Nonce claims must advance (checked first so
        // replays of accepted messages surface as stale_nonce), then
        // timestamps must be monotonic and inside the skew window.
        match msg.nonce_claim() {
            Some(nonce) if msg.advances_nonce() => {
                if nonce <= channel.nonce {
                    return Err(PhotonXError::StaleNonce {
                        channel_id: channel.channel_id,
                        nonce,
                        current: channel.nonce,
                    });
                }
            }
            Some(nonce) => {
                // Heartbeats attest the submitter's current view.
                if nonce < channel.nonce {
                    return Err(PhotonXError::StaleNonce {
                        channel_id: channel.channel_id,
                        nonce,
                        current: channel.nonce,
                    });
                }
                if nonce > channel.nonce {
                    return Err(PhotonXError::InvariantViolation {
                        channel_id: channel.channel_id,
                        message: format!("heartbeat claims unseen nonce {}", nonce),
                    });
                }
            }
            None => {}
        }
        let timestamp = msg.timestamp();
        if !photonx_common::within_skew(timestamp, now_ms, self.skew_window_ms)
            || timestamp <= channel.last_message_timestamp
        {
            return Err(PhotonXError::StaleTimestamp {
                channel_id: channel.channel_id,
                timestamp,
            });
        }

        // Stage 6: semantics, applied on a working copy so rejections
        // leave the current state untouched.
        let mut next = channel.clone();
        match msg {
            Message::QuoteRequest(req) => self.apply_quote_request(&mut next, req)?,
            Message::Quote(quote) => self.apply_quote(&mut next, quote)?,
            Message::Fill(fill) => self.apply_fill(&mut next, fill)?,
            Message::Cancel(cancel) => {
                Self::take_live_quote(&mut next, cancel.quote_id)?;
                next.nonce = cancel.nonce;
            }
            Message::Replace(replace) => {
                Self::take_live_quote(&mut next, replace.original_quote_id)?;
                self.apply_quote_request(&mut next, &replace.new_quote_request)?;
            }
            Message::Heartbeat(_) => {}
        }

        next.last_activity_at = now();
        next.last_message_timestamp = timestamp;

        if !next.conservation_holds() {
            return Err(PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "balance conservation violated".to_string(),
            });
        }

        debug!(
            channel_id = %channel.channel_id,
            kind = msg.kind(),
            nonce = next.nonce,
            "Message applied"
        );
        Ok(next)
    }

    fn apply_quote_request(&self, channel: &mut Channel, req: &QuoteRequest) -> Result<()> {
        if channel.token_index(req.base_token).is_none()
            || channel.token_index(req.quote_token).is_none()
        {
            return Err(PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "requested token pair not held in channel".to_string(),
            });
        }
        channel.prune_expired_quotes(req.timestamp);
        channel.pending_request = Some(PendingRequest {
            nonce: req.nonce,
            side: req.side,
            base_token: req.base_token,
            quote_token: req.quote_token,
            quantity: req.quantity,
            max_slippage_bps: req.max_slippage_bps,
        });
        channel.nonce = req.nonce;
        Ok(())
    }

    fn apply_quote(&self, channel: &mut Channel, quote: &Quote) -> Result<()> {
        // A quote answers the pending request; it consumes no nonce.
        let pending = match &channel.pending_request {
            Some(pending) if pending.nonce == quote.request_nonce => pending.clone(),
            _ => {
                return Err(PhotonXError::StaleNonce {
                    channel_id: channel.channel_id,
                    nonce: quote.request_nonce,
                    current: channel.nonce,
                });
            }
        };
        if quote.side != pending.side {
            return Err(PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "quote side does not match the request".to_string(),
            });
        }
        if channel.open_quotes.contains_key(&quote.quote_id) {
            return Err(PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: format!("duplicate quote id {}", quote.quote_id),
            });
        }
        channel.open_quotes.insert(
            quote.quote_id,
            OpenQuote {
                quote_id: quote.quote_id,
                request_nonce: quote.request_nonce,
                side: quote.side,
                base_token: pending.base_token,
                quote_token: pending.quote_token,
                price: quote.price,
                quantity: quote.quantity,
                expiry_timestamp: quote.expiry_timestamp,
                lp_fee_bps: quote.lp_fee_bps,
                filled: false,
            },
        );
        Ok(())
    }

    fn apply_fill(&self, channel: &mut Channel, fill: &Fill) -> Result<()> {
        let quote = channel
            .open_quotes
            .get(&fill.quote_id)
            .cloned()
            .ok_or(PhotonXError::QuoteNotFound {
                channel_id: channel.channel_id,
                quote_id: fill.quote_id,
            })?;
        if quote.filled {
            return Err(PhotonXError::AlreadyFilled {
                channel_id: channel.channel_id,
                quote_id: fill.quote_id,
            });
        }
        if quote.is_expired_at(fill.timestamp) {
            return Err(PhotonXError::QuoteExpired {
                channel_id: channel.channel_id,
                quote_id: fill.quote_id,
            });
        }
        if fill.price != quote.price || fill.quantity > quote.quantity {
            return Err(PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "fill terms do not match the quote".to_string(),
            });
        }

        let base_idx = channel.token_index(quote.base_token).ok_or_else(|| {
            PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "quoted base token not held in channel".to_string(),
            }
        })?;
        let quote_idx = channel.token_index(quote.quote_token).ok_or_else(|| {
            PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "quoted quote token not held in channel".to_string(),
            }
        })?;

        let cost = quote_cost(fill.quantity, fill.price).ok_or_else(|| {
            PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "fill cost overflows".to_string(),
            }
        })?;

        // The buyer pays `quantity * price / 10^18` of the quote token
        // and receives `quantity` of the base token; the seller sees the
        // opposite transfer.
        match quote.side {
            Side::Buy => {
                channel.debit(true, quote_idx, cost)?;
                channel.credit(true, base_idx, fill.quantity)?;
                channel.debit(false, base_idx, fill.quantity)?;
                channel.credit(false, quote_idx, cost)?;
            }
            Side::Sell => {
                channel.debit(true, base_idx, fill.quantity)?;
                channel.credit(true, quote_idx, cost)?;
                channel.debit(false, quote_idx, cost)?;
                channel.credit(false, base_idx, fill.quantity)?;
            }
        }

        if let Some(entry) = channel.open_quotes.get_mut(&fill.quote_id) {
            entry.filled = true;
        }
        channel.pending_request = None;
        channel.nonce = fill.nonce;
        Ok(())
    }

    /// Remove a live, unfilled quote or fail without side effects.
    fn take_live_quote(channel: &mut Channel, quote_id: photonx_common::QuoteId) -> Result<()> {
        match channel.open_quotes.get(&quote_id) {
            None => Err(PhotonXError::QuoteNotFound {
                channel_id: channel.channel_id,
                quote_id,
            }),
            Some(quote) if quote.filled => Err(PhotonXError::AlreadyFilled {
                channel_id: channel.channel_id,
                quote_id,
            }),
            Some(_) => {
                channel.open_quotes.remove(&quote_id);
                Ok(())
            }
        }
    }

    /// Validate a dual-signed state against a channel record: identity
    /// fields must match and both signatures must recover to the
    /// recorded participants.
    pub fn verify_attested_state(
        &self,
        channel: &Channel,
        state: &ChannelState,
        trader_signature: &photonx_common::Signature,
        lp_signature: &photonx_common::Signature,
    ) -> Result<()> {
        if state.channel_id != channel.channel_id
            || state.trader != channel.trader
            || state.lp != channel.lp
            || state.chain_id != channel.chain_id
        {
            return Err(PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "state identity fields do not match the channel".to_string(),
            });
        }
        let (trader_signer, lp_signer) = photonx_protocol::recover_dual_signers(
            state,
            trader_signature,
            lp_signature,
            &self.domain,
        )
        .map_err(|_| PhotonXError::BadSignature {
            channel_id: channel.channel_id,
        })?;
        if trader_signer != channel.trader || lp_signer != channel.lp {
            return Err(PhotonXError::BadSignature {
                channel_id: channel.channel_id,
            });
        }
        Ok(())
    }

    /// Accept a dual-signed checkpoint: `active -> checkpointing` plus
    /// the record to store.
    pub fn request_checkpoint(
        &self,
        channel: &Channel,
        request: &CheckpointRequest,
        recorded_at: Timestamp,
    ) -> Result<(Channel, CheckpointRecord)> {
        if channel.status != ChannelStatus::Active {
            return Err(PhotonXError::WrongStatus {
                channel_id: channel.channel_id,
                status: channel.status,
            });
        }
        self.verify_attested_state(
            channel,
            &request.state,
            &request.trader_signature,
            &request.lp_signature,
        )?;
        if request.state.nonce > channel.nonce {
            return Err(PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: format!("checkpoint attests unseen nonce {}", request.state.nonce),
            });
        }

        let mut next = channel.clone();
        next.transition_to(ChannelStatus::Checkpointing)?;

        let record = CheckpointRecord {
            channel_id: channel.channel_id,
            nonce: request.state.nonce,
            state_hash: request.state.struct_hash(),
            state: request.state.clone(),
            trader_signature: request.trader_signature,
            lp_signature: request.lp_signature,
            created_at: recorded_at,
            submitted: false,
        };
        Ok((next, record))
    }

    /// Complete a checkpoint: `checkpointing -> active` with the witness
    /// hash recorded.
    pub fn commit_checkpoint(
        &self,
        channel: &Channel,
        record: &CheckpointRecord,
        committed_at: Timestamp,
    ) -> Result<Channel> {
        let mut next = channel.clone();
        next.transition_to(ChannelStatus::Active)?;
        next.last_checkpoint_at = Some(committed_at);
        next.last_state_hash = Some(record.state_hash);
        Ok(next)
    }

    /// Accept a dual-signed final state: transition to `settling` and
    /// produce the settlement record to hand to the submitter.
    pub fn close(
        &self,
        channel: &Channel,
        request: &SettlementRequest,
        recorded_at: Timestamp,
    ) -> Result<(Channel, SettlementRecord)> {
        if !matches!(
            channel.status,
            ChannelStatus::Active | ChannelStatus::Checkpointing
        ) {
            return Err(PhotonXError::WrongStatus {
                channel_id: channel.channel_id,
                status: channel.status,
            });
        }
        self.verify_attested_state(
            channel,
            &request.final_state,
            &request.trader_signature,
            &request.lp_signature,
        )?;
        if request.final_state.nonce < channel.nonce {
            return Err(PhotonXError::StaleNonce {
                channel_id: channel.channel_id,
                nonce: request.final_state.nonce,
                current: channel.nonce,
            });
        }

        let mut next = channel.clone();
        next.transition_to(ChannelStatus::Settling)?;
        next.nonce = request.final_state.nonce;
        next.last_state_hash = Some(request.final_state.struct_hash());

        let record = SettlementRecord {
            channel_id: channel.channel_id,
            final_state: request.final_state.clone(),
            trader_signature: request.trader_signature,
            lp_signature: request.lp_signature,
            status: SubmissionStatus::Pending,
            attempts: 0,
            staged: None,
            created_at: recorded_at,
            updated_at: recorded_at,
        };
        Ok((next, record))
    }

    /// Mark a channel timed out once `now >= timeout_at`.
    pub fn mark_timed_out(&self, channel: &Channel, at: Timestamp) -> Result<Channel> {
        if at < channel.timeout_at {
            return Err(PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "timeout has not elapsed".to_string(),
            });
        }
        let mut next = channel.clone();
        next.transition_to(ChannelStatus::TimedOut)?;
        next.timed_out_at = Some(at);
        Ok(next)
    }

    /// Promote a timed-out channel to `expired` after the grace window.
    pub fn promote_expired(
        &self,
        channel: &Channel,
        at: Timestamp,
        dispute_window_ms: u64,
    ) -> Result<Channel> {
        let timed_out_at = channel.timed_out_at.ok_or_else(|| {
            PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "channel never timed out".to_string(),
            }
        })?;
        if at < timed_out_at + chrono::Duration::milliseconds(dispute_window_ms as i64) {
            return Err(PhotonXError::InvariantViolation {
                channel_id: channel.channel_id,
                message: "grace period still running".to_string(),
            });
        }
        let mut next = channel.clone();
        next.transition_to(ChannelStatus::Expired)?;
        Ok(next)
    }

    /// Freeze a channel pending operator resolution.
    pub fn mark_disputed(&self, channel: &Channel) -> Result<Channel> {
        let mut next = channel.clone();
        next.transition_to(ChannelStatus::Disputed)?;
        Ok(next)
    }
}
