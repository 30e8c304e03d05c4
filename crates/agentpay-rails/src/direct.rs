//! Direct-rail adapter
//!
//! Settlement by POSTing a canonical JSON body, signed with the gateway's
//! Ed25519 key, straight to the vendor's configured endpoint. The mandate
//! id is echoed to the vendor as its idempotency key, so a retried call
//! cannot double-settle on the vendor side either.

use crate::retry::{send_with_retry, RetryPolicy};
use crate::{PaymentRequest, PaymentResult, RailAdapter, RailError};
use agentpay_crypto::{canonical_json, iso8601_millis, KeyPair};
use agentpay_types::Rail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Default per-call deadline for vendor endpoints
pub const DIRECT_TIMEOUT_MS: u64 = 5_000;

/// Direct-rail tuning
#[derive(Debug, Clone)]
pub struct DirectRailConfig {
    pub timeout_ms: u64,
}

impl Default for DirectRailConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DIRECT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectResponse {
    status: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// The direct vendor settlement backend
pub struct DirectRailAdapter {
    client: reqwest::Client,
    keypair: KeyPair,
    config: DirectRailConfig,
    retry: RetryPolicy,
}

impl DirectRailAdapter {
    pub fn new(config: DirectRailConfig, keypair: KeyPair) -> Result<Self, RailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RailError::Provider {
                message: format!("direct client init: {}", e),
            })?;
        Ok(Self {
            client,
            keypair,
            config,
            retry: RetryPolicy::default(),
        })
    }

    /// The canonical payload the signature covers
    fn canonical_payload(request: &PaymentRequest, now: DateTime<Utc>) -> String {
        canonical_json(&json!({
            "amount": request.amount.minor(),
            "currency": request.currency.code(),
            "mandate_id": request.mandate_id.to_string(),
            "payment_id": request.payment_id.to_string(),
            "timestamp": iso8601_millis(&now),
            "vendor": request.vendor,
        }))
    }
}

#[async_trait]
impl RailAdapter for DirectRailAdapter {
    fn rail(&self) -> Rail {
        Rail::Direct
    }

    async fn execute(&self, request: &PaymentRequest) -> Result<PaymentResult, RailError> {
        let endpoint = request
            .vendor_endpoint
            .as_ref()
            .ok_or_else(|| RailError::NoEndpoint {
                vendor: request.vendor.clone(),
            })?;

        let canonical = Self::canonical_payload(request, Utc::now());
        let signature = self.keypair.sign(canonical.as_bytes());

        // The payload travels exactly as signed; the envelope adds the
        // attestation alongside it.
        let payload: serde_json::Value =
            serde_json::from_str(&canonical).map_err(|e| RailError::Provider {
                message: format!("direct payload: {}", e),
            })?;
        let body = json!({
            "payload": payload,
            "signature": signature,
            "public_key": self.keypair.public_key_hex(),
        });

        let mandate_key = request.mandate_id.to_string();
        let response = send_with_retry(&self.retry, self.config.timeout_ms, |attempt| {
            debug!(
                vendor = %endpoint.vendor,
                payment_id = %request.payment_id,
                attempt,
                "posting direct settlement"
            );
            self.client
                .post(&endpoint.endpoint_url)
                .header("Idempotency-Key", mandate_key.as_str())
                .json(&body)
                .send()
        })
        .await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = response
                .text()
                .await
                .unwrap_or_else(|_| format!("vendor returned {}", status));
            return if status.is_client_error() {
                Err(RailError::Declined { reason })
            } else {
                Err(RailError::Provider { message: reason })
            };
        }

        let answer: DirectResponse = response.json().await.map_err(|e| RailError::Provider {
            message: format!("direct response: {}", e),
        })?;

        let provider_ref = answer
            .reference
            .unwrap_or_else(|| format!("direct_{}", request.payment_id.simple()));

        info!(
            vendor = %endpoint.vendor,
            provider_ref = %provider_ref,
            status = %answer.status,
            "direct rail answered"
        );

        Ok(match answer.status.as_str() {
            "settled" => PaymentResult::settled(provider_ref),
            "pending" => PaymentResult::pending(provider_ref),
            other => PaymentResult::failed(
                Some(provider_ref),
                answer
                    .error
                    .unwrap_or_else(|| format!("vendor status {}", other)),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VendorEndpoint;
    use agentpay_crypto::keys::verify_signature;
    use agentpay_types::{Amount, Currency};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn request() -> PaymentRequest {
        PaymentRequest {
            payment_id: Uuid::new_v4(),
            mandate_id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            vendor: "v1".to_string(),
            amount: Amount::from_minor(199).unwrap(),
            currency: Currency::usd(),
            metadata: serde_json::json!({}),
            vendor_endpoint: Some(VendorEndpoint {
                vendor: "v1".to_string(),
                endpoint_url: "https://vendor.example/settle".to_string(),
                vendor_public_key: String::new(),
            }),
        }
    }

    #[test]
    fn test_canonical_payload_shape() {
        let req = request();
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        let canonical = DirectRailAdapter::canonical_payload(&req, now);
        assert_eq!(
            canonical,
            format!(
                r#"{{"amount":199,"currency":"USD","mandate_id":"{}","payment_id":"{}","timestamp":"2025-03-14T10:00:00.000Z","vendor":"v1"}}"#,
                req.mandate_id, req.payment_id
            )
        );
    }

    #[test]
    fn test_payload_signature_verifies() {
        let keypair = KeyPair::from_seed(&[3u8; 32]);
        let canonical = DirectRailAdapter::canonical_payload(&request(), Utc::now());
        let signature = keypair.sign(canonical.as_bytes());
        assert!(verify_signature(
            &keypair.public_key_hex(),
            canonical.as_bytes(),
            &signature
        )
        .is_ok());
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_terminal() {
        let adapter =
            DirectRailAdapter::new(DirectRailConfig::default(), KeyPair::from_seed(&[3u8; 32]))
                .unwrap();
        let mut req = request();
        req.vendor_endpoint = None;
        let err = adapter.execute(&req).await.unwrap_err();
        assert!(matches!(err, RailError::NoEndpoint { .. }));
    }
}
