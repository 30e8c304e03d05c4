//! AgentPay Crypto - attestation primitives for the payment gateway
//!
//! Everything the gateway signs or verifies goes through this crate:
//!
//! - Ed25519 key handling (one process-wide signing key, loaded from config)
//! - SHA-256 hashing with the `sha256:` prefix convention
//! - Canonical JSON (lexicographic keys, no whitespace) for every body that
//!   gets hashed or signed
//! - The mandate signer
//! - Webhook HMAC verification
//!
//! The crate has no persistence or transport dependencies; callers hand it
//! bytes and get bytes (or a verdict) back.

pub mod canonical;
pub mod hash;
pub mod keys;
pub mod signer;
pub mod webhook;

pub use canonical::{canonical_json, fingerprint, iso8601_millis};
pub use hash::{sha256_hex, sha256_prefixed, HASH_PREFIX};
pub use keys::KeyPair;
pub use signer::{MandateClaims, MandateSigner, SignedMandate};
pub use webhook::{verify_webhook_signature, WebhookSignatureError, SIGNATURE_TOLERANCE_SECS};

use thiserror::Error;

/// Errors from key handling and signing
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
