//! RFQ message types.
//!
//! Each message is a signed directive addressed to a specific channel.
//! Field order follows the canonical wire schema; every integer travels
//! as an unsigned decimal string.

use serde::{Deserialize, Serialize};

use photonx_common::{
    Address, ChannelId, FillId, Hash, PhotonXError, QuoteId, Result, Side, Signature, U256,
};
use photonx_crypto::{keccak256, DomainSeparator, StructHasher};

use crate::codec;

/// Limits applied during shape validation.
#[derive(Debug, Clone, Copy)]
pub struct ShapeLimits {
    /// Upper bound on requested slippage.
    pub max_slippage_bps: u16,
    /// Upper bound on LP fees.
    pub max_fee_bps: u16,
    /// Upper bound on a quote's lifetime.
    pub quote_expiry_ms: u64,
}

/// Trader asks for a price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub channel_id: ChannelId,
    #[serde(with = "codec::dec_string")]
    pub nonce: u64,
    pub side: Side,
    pub base_token: Address,
    pub quote_token: Address,
    pub quantity: U256,
    #[serde(with = "codec::dec_string")]
    pub max_slippage_bps: u16,
    #[serde(with = "codec::dec_string")]
    pub timestamp: u64,
    pub trader: Address,
    pub signature: Signature,
}

impl QuoteRequest {
    fn typehash() -> Hash {
        keccak256(
            b"QuoteRequest(uint128 channelId,uint64 nonce,uint8 side,address baseToken,\
              address quoteToken,uint256 quantity,uint16 maxSlippageBps,uint64 timestamp,\
              address trader)",
        )
    }

    /// Typed-data struct hash over all signed fields.
    pub fn struct_hash(&self) -> Hash {
        let mut hasher = StructHasher::new(Self::typehash());
        hasher.push_channel_id(self.channel_id);
        hasher.push_u64(self.nonce);
        hasher.push_u8(self.side.as_u8());
        hasher.push_address(self.base_token);
        hasher.push_address(self.quote_token);
        hasher.push_u256(self.quantity);
        hasher.push_u16(self.max_slippage_bps);
        hasher.push_u64(self.timestamp);
        hasher.push_address(self.trader);
        hasher.finish()
    }

    /// Stage-1 shape checks; no channel state consulted.
    pub fn validate_shape(&self, limits: &ShapeLimits) -> Result<()> {
        if self.quantity.is_zero() {
            return Err(PhotonXError::Range {
                field: "quantity",
                message: "must be positive".to_string(),
            });
        }
        if self.max_slippage_bps > limits.max_slippage_bps {
            return Err(PhotonXError::Range {
                field: "max_slippage_bps",
                message: format!("exceeds maximum {}", limits.max_slippage_bps),
            });
        }
        if self.base_token == self.quote_token {
            return Err(PhotonXError::Shape {
                message: "base and quote token must differ".to_string(),
                field: Some("quote_token".to_string()),
            });
        }
        Ok(())
    }
}

/// LP answers with a firm price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub channel_id: ChannelId,
    pub quote_id: QuoteId,
    #[serde(with = "codec::dec_string")]
    pub request_nonce: u64,
    pub price: U256,
    pub quantity: U256,
    pub side: Side,
    #[serde(with = "codec::dec_string")]
    pub expiry_timestamp: u64,
    #[serde(with = "codec::dec_string")]
    pub lp_fee_bps: u16,
    #[serde(with = "codec::dec_string")]
    pub timestamp: u64,
    pub lp: Address,
    pub signature: Signature,
}

impl Quote {
    fn typehash() -> Hash {
        keccak256(
            b"Quote(uint128 channelId,string quoteId,uint64 requestNonce,uint256 price,\
              uint256 quantity,uint8 side,uint64 expiryTimestamp,uint16 lpFeeBps,\
              uint64 timestamp,address lp)",
        )
    }

    /// Typed-data struct hash over all signed fields.
    pub fn struct_hash(&self) -> Hash {
        let mut hasher = StructHasher::new(Self::typehash());
        hasher.push_channel_id(self.channel_id);
        hasher.push_string(&self.quote_id.to_string());
        hasher.push_u64(self.request_nonce);
        hasher.push_u256(self.price);
        hasher.push_u256(self.quantity);
        hasher.push_u8(self.side.as_u8());
        hasher.push_u64(self.expiry_timestamp);
        hasher.push_u16(self.lp_fee_bps);
        hasher.push_u64(self.timestamp);
        hasher.push_address(self.lp);
        hasher.finish()
    }

    /// Stage-1 shape checks.
    pub fn validate_shape(&self, limits: &ShapeLimits) -> Result<()> {
        if self.quantity.is_zero() || self.price.is_zero() {
            return Err(PhotonXError::Range {
                field: "quantity",
                message: "quantity and price must be positive".to_string(),
            });
        }
        if self.lp_fee_bps > limits.max_fee_bps {
            return Err(PhotonXError::Range {
                field: "lp_fee_bps",
                message: format!("exceeds maximum {}", limits.max_fee_bps),
            });
        }
        if self.expiry_timestamp <= self.timestamp {
            return Err(PhotonXError::Shape {
                message: "quote expires before it is issued".to_string(),
                field: Some("expiry_timestamp".to_string()),
            });
        }
        if self.expiry_timestamp > self.timestamp + limits.quote_expiry_ms {
            return Err(PhotonXError::Range {
                field: "expiry_timestamp",
                message: format!("quote lifetime exceeds {}ms", limits.quote_expiry_ms),
            });
        }
        Ok(())
    }
}

/// Trader accepts a quote. Dual-signed: the LP countersigns the fill it
/// committed to when quoting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub channel_id: ChannelId,
    pub quote_id: QuoteId,
    pub fill_id: FillId,
    #[serde(with = "codec::dec_string")]
    pub nonce: u64,
    pub quantity: U256,
    pub price: U256,
    #[serde(with = "codec::dec_string")]
    pub timestamp: u64,
    pub trader: Address,
    pub lp: Address,
    pub trader_signature: Signature,
    pub lp_signature: Signature,
}

impl Fill {
    fn typehash() -> Hash {
        keccak256(
            b"Fill(uint128 channelId,string quoteId,string fillId,uint64 nonce,\
              uint256 quantity,uint256 price,uint64 timestamp,address trader,address lp)",
        )
    }

    /// Typed-data struct hash; both signatures are over this one hash.
    pub fn struct_hash(&self) -> Hash {
        let mut hasher = StructHasher::new(Self::typehash());
        hasher.push_channel_id(self.channel_id);
        hasher.push_string(&self.quote_id.to_string());
        hasher.push_string(&self.fill_id.to_string());
        hasher.push_u64(self.nonce);
        hasher.push_u256(self.quantity);
        hasher.push_u256(self.price);
        hasher.push_u64(self.timestamp);
        hasher.push_address(self.trader);
        hasher.push_address(self.lp);
        hasher.finish()
    }

    /// Stage-1 shape checks.
    pub fn validate_shape(&self, _limits: &ShapeLimits) -> Result<()> {
        if self.quantity.is_zero() || self.price.is_zero() {
            return Err(PhotonXError::Range {
                field: "quantity",
                message: "quantity and price must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Trader withdraws a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancel {
    pub channel_id: ChannelId,
    pub quote_id: QuoteId,
    #[serde(with = "codec::dec_string")]
    pub nonce: u64,
    #[serde(with = "codec::dec_string")]
    pub timestamp: u64,
    pub trader: Address,
    pub signature: Signature,
}

impl Cancel {
    fn typehash() -> Hash {
        keccak256(
            b"Cancel(uint128 channelId,string quoteId,uint64 nonce,uint64 timestamp,\
              address trader)",
        )
    }

    /// Typed-data struct hash over all signed fields.
    pub fn struct_hash(&self) -> Hash {
        let mut hasher = StructHasher::new(Self::typehash());
        hasher.push_channel_id(self.channel_id);
        hasher.push_string(&self.quote_id.to_string());
        hasher.push_u64(self.nonce);
        hasher.push_u64(self.timestamp);
        hasher.push_address(self.trader);
        hasher.finish()
    }
}

/// Atomic cancel-and-re-request at a single advanced nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replace {
    pub channel_id: ChannelId,
    pub original_quote_id: QuoteId,
    pub new_quote_request: QuoteRequest,
    #[serde(with = "codec::dec_string")]
    pub nonce: u64,
    #[serde(with = "codec::dec_string")]
    pub timestamp: u64,
    pub trader: Address,
    pub signature: Signature,
}

impl Replace {
    fn typehash() -> Hash {
        keccak256(
            b"Replace(uint128 channelId,string originalQuoteId,bytes32 newQuoteRequest,\
              uint64 nonce,uint64 timestamp,address trader)",
        )
    }

    /// Typed-data struct hash; the embedded request contributes its own
    /// struct hash as a nested word.
    pub fn struct_hash(&self) -> Hash {
        let mut hasher = StructHasher::new(Self::typehash());
        hasher.push_channel_id(self.channel_id);
        hasher.push_string(&self.original_quote_id.to_string());
        hasher.push_hash(self.new_quote_request.struct_hash());
        hasher.push_u64(self.nonce);
        hasher.push_u64(self.timestamp);
        hasher.push_address(self.trader);
        hasher.finish()
    }

    /// Stage-1 shape checks; the embedded request must be self-consistent
    /// and carry the same channel, nonce, and trader as the wrapper.
    pub fn validate_shape(&self, limits: &ShapeLimits) -> Result<()> {
        self.new_quote_request.validate_shape(limits)?;
        if self.new_quote_request.channel_id != self.channel_id
            || self.new_quote_request.nonce != self.nonce
            || self.new_quote_request.trader != self.trader
        {
            return Err(PhotonXError::Shape {
                message: "embedded request does not match replace envelope".to_string(),
                field: Some("new_quote_request".to_string()),
            });
        }
        Ok(())
    }
}

/// Liveness signal; refreshes activity without advancing the nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub channel_id: ChannelId,
    #[serde(with = "codec::dec_string")]
    pub nonce: u64,
    #[serde(with = "codec::dec_string")]
    pub timestamp: u64,
    pub sender: Address,
    pub signature: Signature,
}

impl Heartbeat {
    fn typehash() -> Hash {
        keccak256(b"Heartbeat(uint128 channelId,uint64 nonce,uint64 timestamp,address sender)")
    }

    /// Typed-data struct hash over all signed fields.
    pub fn struct_hash(&self) -> Hash {
        let mut hasher = StructHasher::new(Self::typehash());
        hasher.push_channel_id(self.channel_id);
        hasher.push_u64(self.nonce);
        hasher.push_u64(self.timestamp);
        hasher.push_address(self.sender);
        hasher.finish()
    }
}

/// Inbound message union; validation matches exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    QuoteRequest(QuoteRequest),
    Quote(Quote),
    Fill(Fill),
    Cancel(Cancel),
    Replace(Replace),
    Heartbeat(Heartbeat),
}

impl Message {
    /// The channel this message addresses.
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Message::QuoteRequest(m) => m.channel_id,
            Message::Quote(m) => m.channel_id,
            Message::Fill(m) => m.channel_id,
            Message::Cancel(m) => m.channel_id,
            Message::Replace(m) => m.channel_id,
            Message::Heartbeat(m) => m.channel_id,
        }
    }

    /// The submitter's nonce claim. Quotes reference a request nonce
    /// instead of claiming a new one.
    pub fn nonce_claim(&self) -> Option<u64> {
        match self {
            Message::QuoteRequest(m) => Some(m.nonce),
            Message::Quote(_) => None,
            Message::Fill(m) => Some(m.nonce),
            Message::Cancel(m) => Some(m.nonce),
            Message::Replace(m) => Some(m.nonce),
            Message::Heartbeat(m) => Some(m.nonce),
        }
    }

    /// Whether an accepted message of this kind advances the nonce.
    pub fn advances_nonce(&self) -> bool {
        matches!(
            self,
            Message::QuoteRequest(_) | Message::Fill(_) | Message::Cancel(_) | Message::Replace(_)
        )
    }

    /// The wire timestamp.
    pub fn timestamp(&self) -> u64 {
        match self {
            Message::QuoteRequest(m) => m.timestamp,
            Message::Quote(m) => m.timestamp,
            Message::Fill(m) => m.timestamp,
            Message::Cancel(m) => m.timestamp,
            Message::Replace(m) => m.timestamp,
            Message::Heartbeat(m) => m.timestamp,
        }
    }

    /// The claimed submitter address.
    pub fn submitter(&self) -> Address {
        match self {
            Message::QuoteRequest(m) => m.trader,
            Message::Quote(m) => m.lp,
            Message::Fill(m) => m.trader,
            Message::Cancel(m) => m.trader,
            Message::Replace(m) => m.trader,
            Message::Heartbeat(m) => m.sender,
        }
    }

    /// Message kind for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::QuoteRequest(_) => "quote_request",
            Message::Quote(_) => "quote",
            Message::Fill(_) => "fill",
            Message::Cancel(_) => "cancel",
            Message::Replace(_) => "replace",
            Message::Heartbeat(_) => "heartbeat",
        }
    }

    /// Typed-data struct hash of the signed payload.
    pub fn struct_hash(&self) -> Hash {
        match self {
            Message::QuoteRequest(m) => m.struct_hash(),
            Message::Quote(m) => m.struct_hash(),
            Message::Fill(m) => m.struct_hash(),
            Message::Cancel(m) => m.struct_hash(),
            Message::Replace(m) => m.struct_hash(),
            Message::Heartbeat(m) => m.struct_hash(),
        }
    }

    /// The digest each signature must verify against.
    pub fn signing_digest(&self, domain: &DomainSeparator) -> Hash {
        domain.signing_digest(self.struct_hash())
    }

    /// The submitter's signature (trader signature for fills; the LP
    /// countersignature is checked separately).
    pub fn signature(&self) -> &Signature {
        match self {
            Message::QuoteRequest(m) => &m.signature,
            Message::Quote(m) => &m.signature,
            Message::Fill(m) => &m.trader_signature,
            Message::Cancel(m) => &m.signature,
            Message::Replace(m) => &m.signature,
            Message::Heartbeat(m) => &m.signature,
        }
    }

    /// Stage-1 shape validation.
    pub fn validate_shape(&self, limits: &ShapeLimits) -> Result<()> {
        match self {
            Message::QuoteRequest(m) => m.validate_shape(limits),
            Message::Quote(m) => m.validate_shape(limits),
            Message::Fill(m) => m.validate_shape(limits),
            Message::Cancel(_) => Ok(()),
            Message::Replace(m) => m.validate_shape(limits),
            Message::Heartbeat(_) => Ok(()),
        }
    }
}
