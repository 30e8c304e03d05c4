//! The mandate signer
//!
//! Issuing a mandate means attesting, with the gateway's Ed25519 key, to a
//! canonical description of exactly what was authorized. The signature is
//! made over the raw digest bytes of the canonical body's hash, so any
//! holder of the mandate fields plus the public key can re-verify without
//! talking to the gateway.

use crate::canonical::{canonical_json, iso8601_millis};
use crate::hash::{decode_prefixed, sha256_prefixed};
use crate::keys::{verify_signature, KeyPair};
use crate::{CryptoError, CryptoResult};
use chrono::{DateTime, Utc};
use serde_json::json;

/// The fields a mandate attests to. Kept as plain strings so the signer has
/// no opinion about where the ids come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MandateClaims {
    pub agent_id: String,
    pub amount: i64,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub intent_id: String,
    pub policy_id: String,
    pub vendor: String,
}

impl MandateClaims {
    /// The canonical mandate body: lexicographically-ordered JSON with no
    /// whitespace.
    pub fn canonical_body(&self) -> String {
        canonical_json(&json!({
            "agent_id": self.agent_id,
            "amount": self.amount,
            "currency": self.currency,
            "expires_at": iso8601_millis(&self.expires_at),
            "intent_id": self.intent_id,
            "policy_id": self.policy_id,
            "vendor": self.vendor,
        }))
    }
}

/// Output of signing a mandate body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMandate {
    /// Lower-case hex Ed25519 signature
    pub signature: String,
    /// `sha256:`-prefixed hash of the canonical body
    pub hash: String,
    /// Hex public key the signature verifies against
    pub public_key: String,
}

/// Holds the gateway signing key and produces mandate attestations
#[derive(Clone)]
pub struct MandateSigner {
    keypair: KeyPair,
}

impl MandateSigner {
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// Load from the 64-hex-char seed carried in configuration
    pub fn from_seed_hex(seed_hex: &str) -> CryptoResult<Self> {
        Ok(Self::new(KeyPair::from_seed_hex(seed_hex)?))
    }

    /// The public key mandates issued by this signer verify against
    pub fn public_key_hex(&self) -> String {
        self.keypair.public_key_hex()
    }

    /// Sign the canonical mandate body. Deterministic per key + body.
    pub fn sign(&self, claims: &MandateClaims) -> CryptoResult<SignedMandate> {
        let hash = sha256_prefixed(claims.canonical_body().as_bytes());
        let digest = decode_prefixed(&hash)
            .ok_or_else(|| CryptoError::SigningFailed("undecodable mandate hash".into()))?;

        Ok(SignedMandate {
            signature: self.keypair.sign(&digest),
            hash,
            public_key: self.keypair.public_key_hex(),
        })
    }
}

/// Verify a mandate signature against a public key.
///
/// Returns `false` on any parse or crypto failure; callers get a verdict,
/// not a reason.
pub fn verify(claims: &MandateClaims, signature_hex: &str, public_key_hex: &str) -> bool {
    let hash = sha256_prefixed(claims.canonical_body().as_bytes());
    let Some(digest) = decode_prefixed(&hash) else {
        return false;
    };
    verify_signature(public_key_hex, &digest, signature_hex).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> MandateClaims {
        MandateClaims {
            agent_id: "5f1b3a52-2cf0-4f0a-9a90-6bfa24c1a1bb".to_string(),
            amount: 199,
            currency: "USD".to_string(),
            expires_at: chrono::DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            intent_id: "9e107d9d-372b-4eac-a2a1-98fbe1c9f6bb".to_string(),
            policy_id: "1c2a3b4c-5d6e-4f70-8a9b-0c1d2e3f4a5b".to_string(),
            vendor: "v1".to_string(),
        }
    }

    #[test]
    fn test_canonical_body_key_order() {
        let body = claims().canonical_body();
        let keys: Vec<usize> = [
            "\"agent_id\"",
            "\"amount\"",
            "\"currency\"",
            "\"expires_at\"",
            "\"intent_id\"",
            "\"policy_id\"",
            "\"vendor\"",
        ]
        .iter()
        .map(|k| body.find(k).unwrap())
        .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted, "canonical keys must appear in lexicographic order");
        assert!(body.contains("\"expires_at\":\"2025-06-01T00:00:00.000Z\""));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = MandateSigner::new(KeyPair::from_seed(&[7u8; 32]));
        let a = signer.sign(&claims()).unwrap();
        let b = signer.sign(&claims()).unwrap();
        assert_eq!(a, b);
        assert!(a.hash.starts_with("sha256:"));
        assert_eq!(a.signature.len(), 128);
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = MandateSigner::new(KeyPair::from_seed(&[7u8; 32]));
        let signed = signer.sign(&claims()).unwrap();
        assert!(verify(&claims(), &signed.signature, &signed.public_key));
    }

    #[test]
    fn test_verify_rejects_tampered_claims() {
        let signer = MandateSigner::new(KeyPair::from_seed(&[7u8; 32]));
        let signed = signer.sign(&claims()).unwrap();

        let mut tampered = claims();
        tampered.amount = 200;
        assert!(!verify(&tampered, &signed.signature, &signed.public_key));
    }

    #[test]
    fn test_verify_swallows_garbage_without_panicking() {
        assert!(!verify(&claims(), "not-hex", "also-not-hex"));
        assert!(!verify(&claims(), "", ""));
        let signer = MandateSigner::new(KeyPair::from_seed(&[7u8; 32]));
        let signed = signer.sign(&claims()).unwrap();
        // Wrong key, valid formats.
        let other = KeyPair::from_seed(&[8u8; 32]);
        assert!(!verify(&claims(), &signed.signature, &other.public_key_hex()));
    }

    #[test]
    fn test_different_keys_differ() {
        let a = MandateSigner::new(KeyPair::from_seed(&[1u8; 32]));
        let b = MandateSigner::new(KeyPair::from_seed(&[2u8; 32]));
        assert_ne!(
            a.sign(&claims()).unwrap().signature,
            b.sign(&claims()).unwrap().signature
        );
    }
}
