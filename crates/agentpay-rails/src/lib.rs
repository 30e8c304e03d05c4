//! AgentPay Rails - settlement backends
//!
//! A rail is where money actually moves: either a card processor (two-phase
//! order/session flow) or a signed POST straight to the vendor. The router
//! picks one per payment from deterministic rules; adapters translate the
//! provider's answer into one `PaymentResult` shape and own their timeouts
//! and retry behavior.

pub mod card;
pub mod direct;
pub mod retry;
pub mod router;

pub use card::{CardRailAdapter, CardRailConfig};
pub use direct::{DirectRailAdapter, DirectRailConfig};
pub use retry::RetryPolicy;
pub use router::{select_rail, RouteContext, RouteDecision};

use agentpay_types::{Amount, Currency, GatewayError, Rail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Everything an adapter needs to run one payment
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub payment_id: Uuid,
    pub mandate_id: Uuid,
    pub agent_id: Uuid,
    pub vendor: String,
    pub amount: Amount,
    pub currency: Currency,
    /// Caller metadata; the card rail reads customer contact out of this
    pub metadata: serde_json::Value,
    /// The vendor's direct endpoint, when one is configured and enabled
    pub vendor_endpoint: Option<VendorEndpoint>,
}

/// A vendor's direct settlement endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorEndpoint {
    pub vendor: String,
    pub endpoint_url: String,
    pub vendor_public_key: String,
}

/// Provider-side terminal-or-not status for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    /// Settled synchronously
    Settled,
    /// Accepted; the webhook will settle it
    Pending,
    /// Declined or failed terminally
    Failed,
}

/// What an adapter hands back for one execution
#[derive(Debug, Clone)]
pub struct PaymentResult {
    pub success: bool,
    pub status: ProviderStatus,
    pub provider_ref: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl PaymentResult {
    pub fn settled(provider_ref: String) -> Self {
        Self {
            success: true,
            status: ProviderStatus::Settled,
            provider_ref: Some(provider_ref),
            error: None,
            metadata: None,
        }
    }

    pub fn pending(provider_ref: String) -> Self {
        Self {
            success: true,
            status: ProviderStatus::Pending,
            provider_ref: Some(provider_ref),
            error: None,
            metadata: None,
        }
    }

    pub fn failed(provider_ref: Option<String>, error: String) -> Self {
        Self {
            success: false,
            status: ProviderStatus::Failed,
            provider_ref,
            error: Some(error),
            metadata: None,
        }
    }
}

/// Adapter-level failures, before translation into the gateway taxonomy
#[derive(Debug, Error)]
pub enum RailError {
    /// Provider said no (4xx); terminal, never retried
    #[error("provider declined: {reason}")]
    Declined { reason: String },

    /// The card rail cannot create an order without customer contact
    #[error("missing customer contact metadata: {missing}")]
    MissingContact { missing: String },

    /// The call exceeded its deadline
    #[error("provider call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Retries exhausted or the response was unusable
    #[error("provider error: {message}")]
    Provider { message: String },

    /// A direct payment has no configured endpoint to go to
    #[error("vendor {vendor} has no enabled direct endpoint")]
    NoEndpoint { vendor: String },
}

impl From<RailError> for GatewayError {
    fn from(err: RailError) -> Self {
        match err {
            RailError::Declined { reason } => GatewayError::PaymentDeclined { reason },
            RailError::MissingContact { missing } => GatewayError::PaymentRequired {
                message: format!("customer contact metadata required: {}", missing),
            },
            RailError::Timeout { timeout_ms } => GatewayError::Timeout {
                message: format!("provider call exceeded {}ms", timeout_ms),
            },
            RailError::Provider { message } => GatewayError::Provider { message },
            RailError::NoEndpoint { vendor } => GatewayError::Provider {
                message: format!("no direct endpoint for vendor {}", vendor),
            },
        }
    }
}

/// One settlement backend
#[async_trait]
pub trait RailAdapter: Send + Sync {
    /// Which rail this adapter settles on
    fn rail(&self) -> Rail;

    /// Run one payment end to end at the provider
    async fn execute(&self, request: &PaymentRequest) -> Result<PaymentResult, RailError>;
}

/// Registry of configured adapters, one per rail
#[derive(Clone, Default)]
pub struct RailRegistry {
    adapters: HashMap<Rail, Arc<dyn RailAdapter>>,
}

impl RailRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn RailAdapter>) {
        self.adapters.insert(adapter.rail(), adapter);
    }

    pub fn get(&self, rail: Rail) -> Option<Arc<dyn RailAdapter>> {
        self.adapters.get(&rail).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rail_error_translation() {
        let declined: GatewayError = RailError::Declined {
            reason: "insufficient funds".into(),
        }
        .into();
        assert_eq!(declined.error_code(), "PAYMENT_DECLINED");
        assert_eq!(declined.http_status(), 402);

        let timeout: GatewayError = RailError::Timeout { timeout_ms: 5000 }.into();
        assert_eq!(timeout.error_code(), "TIMEOUT_ERROR");
        assert_eq!(timeout.http_status(), 504);

        let missing: GatewayError = RailError::MissingContact {
            missing: "customer_email".into(),
        }
        .into();
        assert_eq!(missing.error_code(), "PAYMENT_REQUIRED");
    }

    #[test]
    fn test_result_constructors() {
        let r = PaymentResult::pending("order_1".into());
        assert!(r.success);
        assert_eq!(r.status, ProviderStatus::Pending);

        let f = PaymentResult::failed(None, "declined".into());
        assert!(!f.success);
        assert_eq!(f.status, ProviderStatus::Failed);
    }
}
