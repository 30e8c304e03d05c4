//! Card-rail adapter
//!
//! A two-phase interaction with the card processor: create an order, then
//! execute against the returned session id. The processor wants major-unit
//! amounts and customer contact details; internally the gateway never
//! leaves minor-unit integers.

use crate::retry::{send_with_retry, RetryPolicy};
use crate::{PaymentRequest, PaymentResult, RailAdapter, RailError};
use agentpay_types::Rail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const SANDBOX_BASE_URL: &str = "https://sandbox.api.cardrail.io/v1";
const PRODUCTION_BASE_URL: &str = "https://api.cardrail.io/v1";

/// Default per-call deadline for the card processor
pub const CARD_TIMEOUT_MS: u64 = 10_000;

/// Card processor credentials and endpoint
#[derive(Debug, Clone)]
pub struct CardRailConfig {
    pub app_id: String,
    pub secret: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl CardRailConfig {
    /// Build from credentials; sandbox vs production is inferred from the
    /// app-id prefix (`TEST…` / `PROD…`).
    pub fn new(app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        let app_id = app_id.into();
        let base_url = if app_id.starts_with("TEST") {
            SANDBOX_BASE_URL
        } else {
            PRODUCTION_BASE_URL
        };
        Self {
            app_id,
            secret: secret.into(),
            base_url: base_url.to_string(),
            timeout: Duration::from_millis(CARD_TIMEOUT_MS),
        }
    }

    pub fn is_sandbox(&self) -> bool {
        self.base_url == SANDBOX_BASE_URL
    }
}

#[derive(Debug, Serialize)]
struct CustomerDetails {
    customer_id: String,
    customer_email: String,
    customer_phone: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    order_id: String,
    /// Major units as a decimal string; the processor refuses integers
    order_amount: String,
    order_currency: String,
    customer_details: CustomerDetails,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    order_id: String,
    payment_session_id: String,
}

#[derive(Debug, Serialize)]
struct ExecuteOrderRequest {
    payment_session_id: String,
}

#[derive(Debug, Deserialize)]
struct ExecuteOrderResponse {
    payment_status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// The card settlement backend
pub struct CardRailAdapter {
    client: reqwest::Client,
    config: CardRailConfig,
    retry: RetryPolicy,
}

impl CardRailAdapter {
    pub fn new(config: CardRailConfig) -> Result<Self, RailError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RailError::Provider {
                message: format!("card client init: {}", e),
            })?;
        Ok(Self {
            client,
            config,
            retry: RetryPolicy::default(),
        })
    }

    async fn read_error(response: reqwest::Response) -> String {
        let status = response.status();
        let body: Option<ProviderErrorBody> = response.json().await.ok();
        body.and_then(|b| b.message)
            .unwrap_or_else(|| format!("card processor returned {}", status))
    }
}

/// Pull the customer contact the processor requires out of the request
/// metadata
fn extract_contact(metadata: &serde_json::Value) -> Result<(String, String), RailError> {
    let email = metadata
        .get("customer_email")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let phone = metadata
        .get("customer_phone")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    match (email, phone) {
        (Some(e), Some(p)) => Ok((e, p)),
        (None, Some(_)) => Err(RailError::MissingContact {
            missing: "customer_email".to_string(),
        }),
        (Some(_), None) => Err(RailError::MissingContact {
            missing: "customer_phone".to_string(),
        }),
        (None, None) => Err(RailError::MissingContact {
            missing: "customer_email, customer_phone".to_string(),
        }),
    }
}

#[async_trait]
impl RailAdapter for CardRailAdapter {
    fn rail(&self) -> Rail {
        Rail::Card
    }

    async fn execute(&self, request: &PaymentRequest) -> Result<PaymentResult, RailError> {
        let (customer_email, customer_phone) = extract_contact(&request.metadata)?;
        let order_id = format!("order_{}", request.payment_id.simple());

        // Phase 1: create the order.
        let create_body = CreateOrderRequest {
            order_id: order_id.clone(),
            order_amount: request.amount.to_major_string(),
            order_currency: request.currency.code().to_string(),
            customer_details: CustomerDetails {
                customer_id: request.agent_id.to_string(),
                customer_email,
                customer_phone,
            },
        };

        let url = format!("{}/orders", self.config.base_url);
        let timeout_ms = self.config.timeout.as_millis() as u64;
        let response = send_with_retry(&self.retry, timeout_ms, |attempt| {
            debug!(order_id = %order_id, attempt, "creating card order");
            self.client
                .post(&url)
                .header("x-client-id", self.config.app_id.as_str())
                .header("x-client-secret", self.config.secret.as_str())
                .json(&create_body)
                .send()
        })
        .await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = Self::read_error(response).await;
            return if status.is_client_error() {
                Err(RailError::Declined { reason })
            } else {
                Err(RailError::Provider { message: reason })
            };
        }

        let order: CreateOrderResponse = response.json().await.map_err(|e| RailError::Provider {
            message: format!("card order response: {}", e),
        })?;

        // Phase 2: execute on the session.
        let pay_url = format!("{}/orders/{}/pay", self.config.base_url, order.order_id);
        let pay_body = ExecuteOrderRequest {
            payment_session_id: order.payment_session_id,
        };
        let response = send_with_retry(&self.retry, timeout_ms, |attempt| {
            debug!(order_id = %order.order_id, attempt, "executing card order");
            self.client
                .post(&pay_url)
                .header("x-client-id", self.config.app_id.as_str())
                .header("x-client-secret", self.config.secret.as_str())
                .json(&pay_body)
                .send()
        })
        .await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = Self::read_error(response).await;
            return if status.is_client_error() {
                Err(RailError::Declined { reason })
            } else {
                Err(RailError::Provider { message: reason })
            };
        }

        let executed: ExecuteOrderResponse =
            response.json().await.map_err(|e| RailError::Provider {
                message: format!("card execute response: {}", e),
            })?;

        info!(
            order_id = %order.order_id,
            status = %executed.payment_status,
            "card rail answered"
        );

        Ok(match executed.payment_status.as_str() {
            "SUCCESS" => PaymentResult::settled(order.order_id),
            "PENDING" => PaymentResult::pending(order.order_id),
            other => PaymentResult::failed(
                Some(order.order_id),
                executed
                    .message
                    .unwrap_or_else(|| format!("card payment status {}", other)),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sandbox_inferred_from_app_id() {
        assert!(CardRailConfig::new("TEST12345", "s").is_sandbox());
        assert!(!CardRailConfig::new("PROD12345", "s").is_sandbox());
        // Anything that is not explicitly TEST is treated as production.
        assert!(!CardRailConfig::new("12345", "s").is_sandbox());
    }

    #[test]
    fn test_contact_extraction() {
        let full = json!({"customer_email": "a@b.c", "customer_phone": "+100"});
        assert_eq!(
            extract_contact(&full).unwrap(),
            ("a@b.c".to_string(), "+100".to_string())
        );
    }

    #[test]
    fn test_contact_missing_pieces_reported() {
        let err = extract_contact(&json!({})).unwrap_err();
        assert!(matches!(err, RailError::MissingContact { ref missing }
            if missing.contains("customer_email") && missing.contains("customer_phone")));

        let err = extract_contact(&json!({"customer_email": "a@b.c"})).unwrap_err();
        assert!(matches!(err, RailError::MissingContact { ref missing }
            if missing == "customer_phone"));
    }

    #[test]
    fn test_contact_must_be_strings() {
        let err = extract_contact(&json!({"customer_email": 5, "customer_phone": "+1"}));
        assert!(err.is_err());
    }
}
