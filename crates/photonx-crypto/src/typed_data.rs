//! Domain-separated typed-data hashing.
//!
//! Every signable payload is reduced to a struct hash: the type hash
//! followed by one 32-byte word per field, keccak-hashed. Dynamic values
//! (strings, arrays) contribute the hash of their contents. The signing
//! digest prefixes the domain separator per the typed-data standard.

use photonx_common::{Address, ChannelId, Hash, U256};

use crate::keccak::{keccak256, keccak256_concat};

const DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// The typed-data domain binding signatures to this protocol, version,
/// chain, and settlement contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSeparator {
    /// Protocol name.
    pub name: String,
    /// Protocol version.
    pub version: String,
    /// Chain the channel settles on.
    pub chain_id: u64,
    /// Settlement contract address.
    pub verifying_contract: Address,
}

impl DomainSeparator {
    /// The PhotonX domain for a given chain and settlement contract.
    pub fn photonx(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: "PhotonX".to_string(),
            version: "1".to_string(),
            chain_id,
            verifying_contract,
        }
    }

    /// Compute the 32-byte domain separator.
    pub fn separator(&self) -> Hash {
        let mut hasher = StructHasher::new(keccak256(DOMAIN_TYPE));
        hasher.push_hash(keccak256(self.name.as_bytes()));
        hasher.push_hash(keccak256(self.version.as_bytes()));
        hasher.push_u64(self.chain_id);
        hasher.push_address(self.verifying_contract);
        hasher.finish()
    }

    /// Compute the signing digest for a struct hash:
    /// `keccak(0x19 ‖ 0x01 ‖ separator ‖ struct_hash)`.
    pub fn signing_digest(&self, struct_hash: Hash) -> Hash {
        let separator = self.separator();
        keccak256_concat([&[0x19u8, 0x01][..], &separator.0, &struct_hash.0])
    }
}

/// Incremental struct-hash builder: a type hash followed by one 32-byte
/// word per field.
pub struct StructHasher {
    encoded: Vec<u8>,
}

impl StructHasher {
    /// Start a struct hash with its type hash.
    pub fn new(typehash: Hash) -> Self {
        let mut encoded = Vec::with_capacity(32 * 8);
        encoded.extend_from_slice(&typehash.0);
        Self { encoded }
    }

    /// Push a precomputed 32-byte word (hash of a dynamic value or a
    /// nested struct hash).
    pub fn push_hash(&mut self, hash: Hash) {
        self.encoded.extend_from_slice(&hash.0);
    }

    /// Push an address, right-aligned in its word.
    pub fn push_address(&mut self, address: Address) {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&address.0);
        self.encoded.extend_from_slice(&word);
    }

    /// Push a channel id, right-aligned in its word.
    pub fn push_channel_id(&mut self, channel_id: ChannelId) {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(channel_id.as_bytes());
        self.encoded.extend_from_slice(&word);
    }

    /// Push an unsigned integer, right-aligned in its word.
    pub fn push_u64(&mut self, value: u64) {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&value.to_be_bytes());
        self.encoded.extend_from_slice(&word);
    }

    /// Push a small unsigned integer, right-aligned in its word.
    pub fn push_u16(&mut self, value: u16) {
        self.push_u64(value as u64);
    }

    /// Push a one-byte tag, right-aligned in its word.
    pub fn push_u8(&mut self, value: u8) {
        self.push_u64(value as u64);
    }

    /// Push a 256-bit integer as a big-endian word.
    pub fn push_u256(&mut self, value: U256) {
        let mut word = [0u8; 32];
        value.to_big_endian(&mut word);
        self.encoded.extend_from_slice(&word);
    }

    /// Push a string as the hash of its bytes.
    pub fn push_string(&mut self, value: &str) {
        self.push_hash(keccak256(value.as_bytes()));
    }

    /// Push an amount array as `keccak(concat(element_words))`.
    pub fn push_amount_array(&mut self, amounts: &[U256]) {
        let mut buf = Vec::with_capacity(32 * amounts.len());
        for amount in amounts {
            let mut word = [0u8; 32];
            amount.to_big_endian(&mut word);
            buf.extend_from_slice(&word);
        }
        self.push_hash(keccak256(&buf));
    }

    /// Push an address array as `keccak(concat(element_words))`.
    pub fn push_address_array(&mut self, addresses: &[Address]) {
        let mut buf = Vec::with_capacity(32 * addresses.len());
        for address in addresses {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(&address.0);
            buf.extend_from_slice(&word);
        }
        self.push_hash(keccak256(&buf));
    }

    /// Finalize the struct hash.
    pub fn finish(self) -> Hash {
        keccak256(&self.encoded)
    }
}
