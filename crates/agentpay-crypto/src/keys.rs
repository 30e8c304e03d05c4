//! Key management for AgentPay
//!
//! The gateway holds exactly one Ed25519 signing key, loaded from
//! configuration at process start and never persisted or logged. The public
//! key is derived on demand.

use crate::{CryptoError, CryptoResult};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// A keypair for signing operations
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Create from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create from a 64-character hex seed, as carried in `SIGNING_KEY`
    pub fn from_seed_hex(seed_hex: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(seed_hex)
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("signing key hex: {}", e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyFormat("signing key must be 32 bytes".into()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Generate a random keypair (tests and tooling only)
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// The public key as a hex string
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    /// Sign a message, returning a lower-case hex signature
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }

    /// The verifying key for verification
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

/// Verify a hex signature over a message against a hex public key
pub fn verify_signature(
    public_key_hex: &str,
    message: &[u8],
    signature_hex: &str,
) -> CryptoResult<()> {
    let public_key_bytes: [u8; 32] = hex::decode(public_key_hex)
        .map_err(|e| CryptoError::VerificationFailed(format!("public key hex: {}", e)))?
        .try_into()
        .map_err(|_| CryptoError::VerificationFailed("public key must be 32 bytes".into()))?;

    let verifying_key = VerifyingKey::from_bytes(&public_key_bytes)
        .map_err(|e| CryptoError::VerificationFailed(format!("public key: {}", e)))?;

    let signature_bytes: [u8; 64] = hex::decode(signature_hex)
        .map_err(|e| CryptoError::VerificationFailed(format!("signature hex: {}", e)))?
        .try_into()
        .map_err(|_| CryptoError::VerificationFailed("signature must be 64 bytes".into()))?;

    let signature = Signature::from_bytes(&signature_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|e| CryptoError::VerificationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_hex_roundtrip() {
        let kp = KeyPair::generate();
        let seed_hex = hex::encode(kp.signing_key.to_bytes());
        let restored = KeyPair::from_seed_hex(&seed_hex).unwrap();
        assert_eq!(kp.public_key_hex(), restored.public_key_hex());
    }

    #[test]
    fn test_bad_seed_rejected() {
        assert!(KeyPair::from_seed_hex("deadbeef").is_err());
        assert!(KeyPair::from_seed_hex("zz").is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"message");
        assert!(verify_signature(&kp.public_key_hex(), b"message", &sig).is_ok());
        assert!(verify_signature(&kp.public_key_hex(), b"other", &sig).is_err());
    }

    #[test]
    fn test_debug_does_not_leak_seed() {
        let kp = KeyPair::generate();
        let seed_hex = hex::encode(kp.signing_key.to_bytes());
        let debug = format!("{:?}", kp);
        assert!(!debug.contains(&seed_hex));
        assert!(debug.contains(&kp.public_key_hex()));
    }
}
