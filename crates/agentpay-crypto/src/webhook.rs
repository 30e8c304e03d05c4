//! Webhook signature verification
//!
//! Providers sign notifications with `HMAC-SHA256(secret, t || "." || body)`
//! and send the result as `t=<unix-seconds>,v1=<hex>`. Verification checks
//! the header shape, the timestamp window, and the MAC in constant time.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted clock skew between provider and gateway
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Why a webhook signature was rejected. Logged, never sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookSignatureError {
    #[error("malformed signature header")]
    MalformedHeader,

    #[error("timestamp outside the {SIGNATURE_TOLERANCE_SECS}s tolerance window")]
    TimestampSkew,

    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Compute the signature a provider sharing `secret` would send
pub fn compute_signature(secret: &str, timestamp: i64, raw_body: &[u8]) -> String {
    // new_from_slice only fails on zero-length keys for HMAC; a webhook
    // secret is validated non-empty at config load.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Parse a `t=<unix-seconds>,v1=<hex>` header
fn parse_header(header: &str) -> Result<(i64, String), WebhookSignatureError> {
    let mut timestamp = None;
    let mut v1 = None;

    for field in header.split(',') {
        match field.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| WebhookSignatureError::MalformedHeader)?,
                )
            }
            Some(("v1", value)) => v1 = Some(value.to_string()),
            _ => {}
        }
    }

    match (timestamp, v1) {
        (Some(t), Some(sig)) => Ok((t, sig)),
        _ => Err(WebhookSignatureError::MalformedHeader),
    }
}

/// Verify a webhook signature header against the raw request body
pub fn verify_webhook_signature(
    secret: &str,
    header: &str,
    raw_body: &[u8],
    now: DateTime<Utc>,
) -> Result<(), WebhookSignatureError> {
    let (timestamp, provided) = parse_header(header)?;

    if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(WebhookSignatureError::TimestampSkew);
    }

    let expected = compute_signature(secret, timestamp, raw_body);
    let matches: bool = expected.as_bytes().ct_eq(provided.as_bytes()).into();
    if matches {
        Ok(())
    } else {
        Err(WebhookSignatureError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn header_for(body: &[u8], now: DateTime<Utc>) -> String {
        let t = now.timestamp();
        format!("t={},v1={}", t, compute_signature(SECRET, t, body))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let now = Utc::now();
        let body = br#"{"event_type":"PAYMENT_SUCCEEDED"}"#;
        let header = header_for(body, now);
        assert!(verify_webhook_signature(SECRET, &header, body, now).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = Utc::now();
        let header = header_for(b"original", now);
        assert_eq!(
            verify_webhook_signature(SECRET, &header, b"tampered", now),
            Err(WebhookSignatureError::SignatureMismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let body = b"payload";
        let header = header_for(body, now);
        assert_eq!(
            verify_webhook_signature("other-secret", &header, body, now),
            Err(WebhookSignatureError::SignatureMismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let now = Utc::now();
        let stale = now - chrono::Duration::seconds(SIGNATURE_TOLERANCE_SECS + 1);
        let body = b"payload";
        let header = header_for(body, stale);
        assert_eq!(
            verify_webhook_signature(SECRET, &header, body, now),
            Err(WebhookSignatureError::TimestampSkew)
        );
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let now = Utc::now();
        let future = now + chrono::Duration::seconds(SIGNATURE_TOLERANCE_SECS + 60);
        let body = b"payload";
        let header = header_for(body, future);
        assert_eq!(
            verify_webhook_signature(SECRET, &header, body, now),
            Err(WebhookSignatureError::TimestampSkew)
        );
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let now = Utc::now();
        for header in ["", "t=123", "v1=abc", "t=notanumber,v1=abc", "nonsense"] {
            assert_eq!(
                verify_webhook_signature(SECRET, header, b"x", now),
                Err(WebhookSignatureError::MalformedHeader),
                "header {:?} should be malformed",
                header
            );
        }
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let now = Utc::now();
        let body = b"payload";
        let t = now.timestamp();
        let header = format!(
            "t={},v0=legacy,v1={}",
            t,
            compute_signature(SECRET, t, body)
        );
        assert!(verify_webhook_signature(SECRET, &header, body, now).is_ok());
    }
}
