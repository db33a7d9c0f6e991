//! secp256k1 signing and recovery over typed-data digests.

use k256::ecdsa::{RecoveryId, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use photonx_common::{Address, Hash, Signature};

use crate::keccak::keccak256;
use crate::{CryptoError, Result};

/// Derive the 20-byte address from a verifying key: keccak-256 of the
/// uncompressed point without its encoding tag, tail 20 bytes.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut addr = Address([0; 20]);
    addr.0.copy_from_slice(&hash.0[12..]);
    addr
}

/// A secp256k1 signer producing 65-byte `r ‖ s ‖ v` signatures over
/// precomputed digests.
#[derive(Debug, Clone)]
pub struct Signer {
    key: SigningKey,
    address: Address,
}

impl Signer {
    /// Generate a signer from fresh randomness.
    pub fn random<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        let key = SigningKey::random(rng);
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// Create a signer from raw private-key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let key = SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidKey)?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    /// The signer's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest, returning `r ‖ s ‖ v` with `v ∈ {27, 28}`.
    pub fn sign_digest(&self, digest: Hash) -> Result<Signature> {
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest.0)
            .map_err(|_| CryptoError::RecoveryFailed)?;

        let rs: [u8; 64] = sig.to_bytes().into();
        Ok(Signature::new(&rs, 27 + recovery_id.to_byte()))
    }
}

/// Recover the signing address from a digest and a 65-byte signature.
pub fn recover_signer(digest: Hash, signature: &Signature) -> Result<Address> {
    let v = signature.v();
    if v != 27 && v != 28 {
        return Err(CryptoError::InvalidRecoveryId(v));
    }
    let recovery_id =
        RecoveryId::from_byte(v - 27).ok_or(CryptoError::InvalidRecoveryId(v))?;

    let sig = k256::ecdsa::Signature::from_slice(signature.rs())
        .map_err(|_| CryptoError::MalformedSignature)?;

    let key = VerifyingKey::recover_from_prehash(&digest.0, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(address_of(&key))
}
