//! Dual-signed channel state payloads.

use serde::{Deserialize, Serialize};

use photonx_common::{Address, Channel, ChannelId, Hash, Signature, U256};
use photonx_crypto::{keccak256, recover_signer, CryptoError, DomainSeparator, StructHasher};

use crate::codec;

/// A full channel state as attested by both participants.
///
/// Balance vectors are parallel to the channel's token list; nested
/// arrays are hashed as the keccak of their concatenated element words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub channel_id: ChannelId,
    #[serde(with = "codec::dec_string")]
    pub nonce: u64,
    pub trader: Address,
    pub lp: Address,
    pub trader_balances: Vec<U256>,
    pub lp_balances: Vec<U256>,
    #[serde(with = "codec::dec_string")]
    pub timestamp: u64,
    #[serde(with = "codec::dec_string")]
    pub chain_id: u64,
}

impl ChannelState {
    fn typehash() -> Hash {
        keccak256(
            b"ChannelState(uint128 channelId,uint64 nonce,address trader,address lp,\
              uint256[] traderBalances,uint256[] lpBalances,uint64 timestamp,uint64 chainId)",
        )
    }

    /// Snapshot the authoritative record at a wire timestamp.
    pub fn from_channel(channel: &Channel, timestamp: u64) -> Self {
        Self {
            channel_id: channel.channel_id,
            nonce: channel.nonce,
            trader: channel.trader,
            lp: channel.lp,
            trader_balances: channel.trader_balances.clone(),
            lp_balances: channel.lp_balances.clone(),
            timestamp,
            chain_id: channel.chain_id,
        }
    }

    /// Typed-data struct hash of the state record.
    pub fn struct_hash(&self) -> Hash {
        let mut hasher = StructHasher::new(Self::typehash());
        hasher.push_channel_id(self.channel_id);
        hasher.push_u64(self.nonce);
        hasher.push_address(self.trader);
        hasher.push_address(self.lp);
        hasher.push_amount_array(&self.trader_balances);
        hasher.push_amount_array(&self.lp_balances);
        hasher.push_u64(self.timestamp);
        hasher.push_u64(self.chain_id);
        hasher.finish()
    }

    /// The digest both participants sign.
    pub fn signing_digest(&self, domain: &DomainSeparator) -> Hash {
        domain.signing_digest(self.struct_hash())
    }
}

/// A dual-signed state attesting an intermediate nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRequest {
    pub channel_id: ChannelId,
    pub state: ChannelState,
    pub trader_signature: Signature,
    pub lp_signature: Signature,
}

/// A dual-signed final state releasing net balances on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub channel_id: ChannelId,
    pub final_state: ChannelState,
    pub trader_signature: Signature,
    pub lp_signature: Signature,
}

/// Recover the two signer addresses of a dual-signed state.
///
/// Returns `(trader_signer, lp_signer)`; the caller compares them with
/// the channel's recorded participants.
pub fn recover_dual_signers(
    state: &ChannelState,
    trader_signature: &Signature,
    lp_signature: &Signature,
    domain: &DomainSeparator,
) -> Result<(Address, Address), CryptoError> {
    let digest = state.signing_digest(domain);
    let trader_signer = recover_signer(digest, trader_signature)?;
    let lp_signer = recover_signer(digest, lp_signature)?;
    Ok((trader_signer, lp_signer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use photonx_crypto::Signer;
    use rand::rngs::OsRng;

    fn state() -> ChannelState {
        ChannelState {
            channel_id: ChannelId::new(),
            nonce: 2,
            trader: Address([0xAA; 20]),
            lp: Address([0xBB; 20]),
            trader_balances: vec![U256::zero(), U256::from(5u64)],
            lp_balances: vec![U256::from(1_000u64), U256::from(5u64)],
            timestamp: 1_700_000_000_000,
            chain_id: 1,
        }
    }

    #[test]
    fn test_struct_hash_binds_balances() {
        let base = state();
        let mut other = base.clone();
        other.lp_balances[0] = U256::from(999u64);
        assert_ne!(base.struct_hash(), other.struct_hash());
    }

    #[test]
    fn test_struct_hash_binds_nonce_and_chain() {
        let base = state();
        let mut other = base.clone();
        other.nonce = 3;
        assert_ne!(base.struct_hash(), other.struct_hash());

        let mut other = base.clone();
        other.chain_id = 10;
        assert_ne!(base.struct_hash(), other.struct_hash());
    }

    #[test]
    fn test_recover_dual_signers() {
        let domain = DomainSeparator::photonx(1, Address([0x42; 20]));
        let trader = Signer::random(&mut OsRng);
        let lp = Signer::random(&mut OsRng);

        let mut state = state();
        state.trader = trader.address();
        state.lp = lp.address();

        let digest = state.signing_digest(&domain);
        let trader_sig = trader.sign_digest(digest).unwrap();
        let lp_sig = lp.sign_digest(digest).unwrap();

        let (t, l) = recover_dual_signers(&state, &trader_sig, &lp_sig, &domain).unwrap();
        assert_eq!(t, trader.address());
        assert_eq!(l, lp.address());
    }

    #[test]
    fn test_serde_balances_are_decimal_strings() {
        let original = state();
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains(r#""lp_balances":["1000","5"]"#));
        let back: ChannelState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
