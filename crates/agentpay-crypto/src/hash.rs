//! Hashing utilities for AgentPay

use sha2::{Digest, Sha256};

/// Prefix carried by every hash the gateway stores or signs
pub const HASH_PREFIX: &str = "sha256:";

/// Compute SHA-256 hash of data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Compute SHA-256 and return with the `sha256:` prefix
pub fn sha256_prefixed(data: &[u8]) -> String {
    format!("{}{}", HASH_PREFIX, sha256_hex(data))
}

/// Strip the `sha256:` prefix and decode the digest bytes
pub fn decode_prefixed(hash: &str) -> Option<[u8; 32]> {
    let hex_part = hash.strip_prefix(HASH_PREFIX)?;
    let bytes = hex::decode(hex_part).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_length() {
        assert_eq!(sha256_hex(b"agentpay").len(), 64);
    }

    #[test]
    fn test_prefixed_roundtrip() {
        let h = sha256_prefixed(b"agentpay");
        assert!(h.starts_with("sha256:"));
        assert_eq!(decode_prefixed(&h).unwrap(), sha256(b"agentpay"));
    }

    #[test]
    fn test_decode_rejects_unprefixed() {
        assert!(decode_prefixed(&sha256_hex(b"x")).is_none());
        assert!(decode_prefixed("sha256:nothex").is_none());
    }

    #[test]
    fn test_known_vector() {
        // SHA-256("") is a fixed vector.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
