//! PhotonX Crypto
//!
//! Domain-separated typed-data hashing and secp256k1 signature
//! creation/recovery. The hashing scheme follows the standard
//! typed-structured-data rules: 32-byte word encoding per field, nested
//! arrays hashed as the keccak of their concatenated element hashes, and
//! a `0x19 0x01 ‖ domain ‖ struct_hash` signing digest.

pub mod keccak;
pub mod signer;
pub mod typed_data;

pub use keccak::{keccak256, keccak256_concat};
pub use signer::{recover_signer, Signer};
pub use typed_data::{DomainSeparator, StructHasher};

use thiserror::Error;

/// Errors from signature handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature bytes are not a valid secp256k1 signature.
    #[error("malformed signature")]
    MalformedSignature,

    /// The recovery byte is not 27 or 28.
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),

    /// Public key recovery failed.
    #[error("signature recovery failed")]
    RecoveryFailed,

    /// Key bytes are not a valid secp256k1 scalar.
    #[error("invalid private key")]
    InvalidKey,
}

/// Result type alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
